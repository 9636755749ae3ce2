use asset_finance_core::time_value::{try_xirr, xirr, xnpv, DEFAULT_XIRR_GUESS};
use asset_finance_core::AssetFinanceError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

// ===========================================================================
// XIRR
// ===========================================================================

#[test]
fn test_xirr_round_trip() {
    let flows = vec![(d(2025, 1, 1), dec!(-1000)), (d(2026, 1, 1), dec!(1100))];
    let rate = xirr(&flows, DEFAULT_XIRR_GUESS).unwrap();
    assert!(
        (rate - dec!(0.10)).abs() < dec!(0.001),
        "XIRR should be ~10%, got {rate}"
    );
    let npv = xnpv(rate, &flows).unwrap();
    assert!(npv.abs() < dec!(0.0001), "NPV at the solved rate was {npv}");
}

#[test]
fn test_xirr_undefined_without_sign_change() {
    let positive = vec![(d(2025, 1, 1), dec!(100)), (d(2026, 1, 1), dec!(100))];
    let negative = vec![(d(2025, 1, 1), dec!(-100)), (d(2026, 1, 1), dec!(-100))];
    let zero = vec![(d(2025, 1, 1), Decimal::ZERO), (d(2026, 1, 1), Decimal::ZERO)];

    assert_eq!(xirr(&positive, DEFAULT_XIRR_GUESS), None);
    assert_eq!(xirr(&negative, DEFAULT_XIRR_GUESS), None);
    assert_eq!(xirr(&zero, DEFAULT_XIRR_GUESS), None);
    assert!(matches!(
        try_xirr(&zero, DEFAULT_XIRR_GUESS),
        Err(AssetFinanceError::InsufficientData(_))
    ));
}

#[test]
fn test_xirr_single_flow_undefined() {
    let flows = vec![(d(2025, 1, 1), dec!(-100))];
    assert_eq!(xirr(&flows, DEFAULT_XIRR_GUESS), None);
}

#[test]
fn test_xirr_irregular_monthly_project() {
    // Two years of construction spend, then 10 years of monthly distributions
    let mut flows = vec![
        (d(2024, 3, 15), dec!(-600_000)),
        (d(2024, 11, 2), dec!(-400_000)),
    ];
    let mut date = d(2025, 1, 1);
    for _ in 0..120 {
        flows.push((date, dec!(14_000)));
        date = date.checked_add_months(chrono::Months::new(1)).unwrap();
    }
    let rate = xirr(&flows, DEFAULT_XIRR_GUESS).unwrap();
    assert!(rate > dec!(0.05) && rate < dec!(0.15), "rate {rate}");
    assert!(xnpv(rate, &flows).unwrap().abs() < dec!(1));
}

#[test]
fn test_xirr_far_from_guess() {
    // 300% return in one year
    let flows = vec![(d(2025, 1, 1), dec!(-100)), (d(2026, 1, 1), dec!(400))];
    let rate = xirr(&flows, dec!(0.05)).unwrap();
    assert!((rate - dec!(3.0)).abs() < dec!(0.01), "rate {rate}");
}

#[test]
fn test_xnpv_undefined_below_minus_one() {
    let flows = vec![(d(2025, 1, 1), dec!(-100)), (d(2026, 1, 1), dec!(110))];
    assert_eq!(xnpv(dec!(-1.01), &flows), None);
    assert_eq!(xnpv(dec!(0.1), &[]), Some(Decimal::ZERO));
}
