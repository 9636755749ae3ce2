use asset_finance_core::asset::CapexScheduleEntry;
use asset_finance_core::debt::amortization::{self, AmortizationRequest};
use asset_finance_core::debt::sizing::{
    self, simulate_sculpted, SizingRequest, MAX_SIZING_ITERATIONS, SIZING_TOLERANCE,
};
use asset_finance_core::debt::{DebtStructure, GracePeriod, InterestRate, RepaymentFrequency};
use asset_finance_core::AssetFinanceError;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn d(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

fn sculpted_request(capex: Decimal, cash_flows: Vec<Decimal>, target: Decimal) -> SizingRequest {
    let n = cash_flows.len();
    SizingRequest {
        capex,
        cash_flows,
        dscr_targets: vec![target; n],
        max_gearing: dec!(0.7),
        period_rate: dec!(0.05),
        tenor_periods: n as u32,
        structure: DebtStructure::Sculpting,
    }
}

// ===========================================================================
// Sizing
// ===========================================================================

#[test]
fn test_single_period_sculpting_example() {
    let sim = simulate_sculpted(dec!(1_000_000), &[dec!(1_200_000)], &[dec!(1.0)], dec!(0.05), 1);
    let period = &sim.periods[0];
    assert_eq!(period.interest, dec!(50_000));
    assert_eq!(period.principal, dec!(1_000_000));
    assert_eq!(period.closing_balance, Decimal::ZERO);
    assert_eq!(sim.final_balance, Decimal::ZERO);
    let dscr = period.dscr.unwrap();
    assert!(
        (dscr - dec!(1.1429)).abs() < dec!(0.0001),
        "DSCR should be ~1.1429, got {dscr}"
    );
}

#[test]
fn test_search_boundary_is_tight() {
    let request = sculpted_request(dec!(2_000_000), vec![dec!(1_200_000)], dec!(1.0));
    let result = sizing::size(&request).unwrap();

    assert!(result.iterations <= MAX_SIZING_ITERATIONS);
    let feasible = |debt: Decimal| {
        simulate_sculpted(debt, &request.cash_flows, &request.dscr_targets, request.period_rate, 1)
            .final_balance
            <= SIZING_TOLERANCE
    };
    assert!(feasible(result.debt_amount));
    assert!(!feasible(result.debt_amount + SIZING_TOLERANCE));
    assert!(
        (result.debt_amount - dec!(1_142_857.14)).abs() < SIZING_TOLERANCE,
        "debt {}",
        result.debt_amount
    );
}

#[test]
fn test_every_amount_below_sized_debt_is_feasible() {
    let cash_flows = vec![
        dec!(450_000),
        dec!(520_000),
        dec!(610_000),
        dec!(580_000),
        dec!(400_000),
    ];
    let request = sculpted_request(dec!(10_000_000), cash_flows, dec!(1.3));
    let result = sizing::size(&request).unwrap();
    assert!(result.debt_amount > Decimal::ZERO);
    assert!(result.debt_amount < dec!(7_000_000), "gearing cap should not bind");

    let feasible = |debt: Decimal| {
        simulate_sculpted(debt, &request.cash_flows, &request.dscr_targets, request.period_rate, 5)
            .final_balance
            <= SIZING_TOLERANCE
    };
    for step in 0..=20u32 {
        let amount = result.debt_amount * Decimal::from(step) / dec!(20);
        assert!(feasible(amount), "{amount} below {} should be feasible", result.debt_amount);
    }
    assert!(!feasible(result.debt_amount + SIZING_TOLERANCE));
}

#[test]
fn test_search_reports_non_convergence_at_iteration_cap() {
    // A 7e17 bracket needs ~60 halvings to reach one unit
    let request = sculpted_request(
        dec!(1_000_000_000_000_000_000),
        vec![dec!(1_000_000); 3],
        dec!(1.3),
    );
    let err = sizing::size(&request).unwrap_err();
    match err {
        AssetFinanceError::ConvergenceFailure {
            iterations,
            last_delta,
            ..
        } => {
            assert_eq!(iterations, MAX_SIZING_ITERATIONS);
            assert!(last_delta >= SIZING_TOLERANCE, "delta {last_delta}");
        }
        other => panic!("expected ConvergenceFailure, got {other:?}"),
    }
}

#[test]
fn test_more_cash_never_sizes_less_debt() {
    let small = sizing::size(&sculpted_request(
        dec!(10_000_000),
        vec![dec!(500_000); 5],
        dec!(1.3),
    ))
    .unwrap();
    let large = sizing::size(&sculpted_request(
        dec!(10_000_000),
        vec![dec!(600_000); 5],
        dec!(1.3),
    ))
    .unwrap();
    assert!(large.debt_amount >= small.debt_amount);
    assert!(small.min_dscr.unwrap() >= dec!(1.3) - dec!(0.0001));
}

#[test]
fn test_zero_cash_flow_sizes_no_debt() {
    let mut request = sculpted_request(dec!(1_000_000), vec![], dec!(1.3));
    request.tenor_periods = 15;
    let result = sizing::size(&request).unwrap();
    assert_eq!(result.debt_amount, Decimal::ZERO);
    assert!(result.schedule.is_empty());
}

#[test]
fn test_invalid_gearing_rejected() {
    let mut request = sculpted_request(dec!(1_000), vec![dec!(100)], dec!(1.3));
    request.max_gearing = dec!(1.01);
    assert!(matches!(
        sizing::size(&request),
        Err(AssetFinanceError::InvalidInput { .. })
    ));
}

// ===========================================================================
// Amortization
// ===========================================================================

#[test]
fn test_schedule_invariants_every_month() {
    let capex = vec![
        CapexScheduleEntry {
            asset_id: 3,
            date: d(2025, 6),
            capex: dec!(1_000_000),
            debt_capex: dec!(700_000),
            equity_capex: dec!(300_000),
        },
        CapexScheduleEntry {
            asset_id: 3,
            date: d(2025, 9),
            capex: dec!(500_000),
            debt_capex: dec!(350_000),
            equity_capex: dec!(150_000),
        },
    ];
    let rate = InterestRate::Fixed(dec!(0.055));
    let principal = [dec!(400_000), dec!(350_000), dec!(300_000)];

    for frequency in [RepaymentFrequency::Monthly, RepaymentFrequency::Quarterly] {
        for grace in [GracePeriod::None, GracePeriod::FullPeriod] {
            let schedule = amortization::generate(&AmortizationRequest {
                asset_id: 3,
                debt_amount: dec!(1_050_000),
                operating_start: d(2026, 2),
                horizon_start: d(2025, 6),
                horizon_end: d(2029, 12),
                capex_schedule: &capex,
                interest_rate: &rate,
                structure: DebtStructure::Sculpting,
                repayment_frequency: frequency,
                grace_period: grace,
                tenor_years: 3,
                sized_principal: &principal,
                months_per_bucket: 12,
            })
            .unwrap();

            for e in &schedule.entries {
                assert_eq!(e.ending_balance, e.beginning_balance + e.drawdown - e.principal);
                assert!(e.principal <= e.beginning_balance + e.drawdown);
                assert!(e.ending_balance >= Decimal::ZERO);
            }
            let drawn: Decimal = schedule.entries.iter().map(|e| e.drawdown).sum();
            assert_eq!(drawn, dec!(1_050_000));
            assert!(
                schedule.residual_balance.abs() < dec!(0.01),
                "{frequency}/{grace}: residual {}",
                schedule.residual_balance
            );
        }
    }
}

#[test]
fn test_full_period_grace_delays_first_payment() {
    let capex = vec![CapexScheduleEntry {
        asset_id: 1,
        date: d(2025, 12),
        capex: dec!(100),
        debt_capex: dec!(100),
        equity_capex: Decimal::ZERO,
    }];
    let rate = InterestRate::Fixed(dec!(0.12));
    let schedule = amortization::generate(&AmortizationRequest {
        asset_id: 1,
        debt_amount: dec!(100),
        operating_start: NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
        horizon_start: d(2025, 12),
        horizon_end: d(2027, 12),
        capex_schedule: &capex,
        interest_rate: &rate,
        structure: DebtStructure::Annuity,
        repayment_frequency: RepaymentFrequency::Quarterly,
        grace_period: GracePeriod::FullPeriod,
        tenor_years: 1,
        sized_principal: &[],
        months_per_bucket: 12,
    })
    .unwrap();

    assert_eq!(schedule.service_start, d(2026, 4));
    let first_paid = schedule
        .entries
        .iter()
        .find(|e| !e.debt_service().is_zero())
        .unwrap();
    assert_eq!(first_paid.date, d(2026, 6));
    assert!(schedule.residual_balance.abs() < dec!(0.0001));
}
