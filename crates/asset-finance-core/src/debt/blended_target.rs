use rust_decimal::Decimal;

use crate::asset::PeriodCashFlow;
use crate::types::{Money, Multiple};

/// Revenue-mix-weighted minimum DSCR.
///
/// `contracted / total × target_contract + merchant / total × target_merchant`
/// with `total = contracted + merchant`. A period with no (or negative) total
/// revenue falls back to the merchant target.
pub fn blended_target(
    contracted_revenue: Money,
    merchant_revenue: Money,
    target_contract: Multiple,
    target_merchant: Multiple,
) -> Multiple {
    let total = contracted_revenue + merchant_revenue;
    if total <= Decimal::ZERO {
        return target_merchant;
    }
    let contracted_share = contracted_revenue / total;
    let merchant_share = merchant_revenue / total;
    contracted_share * target_contract + merchant_share * target_merchant
}

/// One blended target per period, in input order.
pub fn blended_targets(
    periods: &[PeriodCashFlow],
    target_contract: Multiple,
    target_merchant: Multiple,
) -> Vec<Multiple> {
    periods
        .iter()
        .map(|p| {
            blended_target(
                p.contracted_revenue,
                p.merchant_revenue,
                target_contract,
                target_merchant,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fully_contracted_uses_contract_target() {
        assert_eq!(
            blended_target(dec!(1000), dec!(0), dec!(1.35), dec!(1.80)),
            dec!(1.35)
        );
    }

    #[test]
    fn test_mixed_revenue_is_weighted() {
        // 75% contracted, 25% merchant → 0.75 × 1.4 + 0.25 × 2.0 = 1.55
        assert_eq!(
            blended_target(dec!(750), dec!(250), dec!(1.4), dec!(2.0)),
            dec!(1.55)
        );
    }

    #[test]
    fn test_zero_revenue_defaults_to_merchant() {
        assert_eq!(
            blended_target(dec!(0), dec!(0), dec!(1.35), dec!(1.80)),
            dec!(1.80)
        );
    }

    #[test]
    fn test_series_follows_period_mix() {
        let date = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        let periods = vec![
            PeriodCashFlow {
                asset_id: 1,
                date,
                revenue: dec!(100),
                opex: dec!(10),
                contracted_revenue: dec!(100),
                merchant_revenue: dec!(0),
            },
            PeriodCashFlow {
                asset_id: 1,
                date,
                revenue: dec!(100),
                opex: dec!(10),
                contracted_revenue: dec!(0),
                merchant_revenue: dec!(100),
            },
        ];
        assert_eq!(
            blended_targets(&periods, dec!(1.3), dec!(1.7)),
            vec![dec!(1.3), dec!(1.7)]
        );
    }
}
