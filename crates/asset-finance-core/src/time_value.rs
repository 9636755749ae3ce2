use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::AssetFinanceError;
use crate::solvers::{brent, find_bracket, SolverConfig};
use crate::types::{Money, Rate};
use crate::AssetFinanceResult;

/// Day-count basis for XNPV/XIRR year fractions.
pub const DAYS_PER_YEAR: Decimal = dec!(365.25);

/// Lowest rate the XIRR bracket search will probe (just above -100%).
pub const XIRR_LOWER_BOUND: Rate = dec!(-0.999999);

/// Highest acceptable XIRR (+10,000%).
pub const XIRR_UPPER_BOUND: Rate = dec!(100);

/// Residual NPV accepted at the root, relative to gross cash flow volume.
const XNPV_RELATIVE_TOLERANCE: Decimal = dec!(0.0000001);

/// Default seed for XIRR.
pub const DEFAULT_XIRR_GUESS: Rate = dec!(0.10);

const MAX_XIRR_ITERATIONS: u32 = 100;

/// Net present value of dated cash flows, discounted to the earliest date
/// with `(1 + rate)^(days / 365.25)`.
///
/// At `rate = -1` flows after the earliest date are worth zero. Returns `None`
/// when `rate < -1` or the discounting overflows.
pub fn xnpv(rate: Rate, dated_flows: &[(NaiveDate, Money)]) -> Option<Money> {
    if rate < dec!(-1) {
        return None;
    }
    let Some(base_date) = dated_flows.iter().map(|(d, _)| *d).min() else {
        return Some(Decimal::ZERO);
    };

    let one_plus_r = Decimal::ONE + rate;
    let mut total = Decimal::ZERO;

    for (date, amount) in dated_flows {
        let days = (*date - base_date).num_days();
        let pv = if days == 0 {
            *amount
        } else if one_plus_r.is_zero() {
            Decimal::ZERO
        } else {
            let years = Decimal::from(days) / DAYS_PER_YEAR;
            let discount = one_plus_r.checked_powd(years)?;
            if discount.is_zero() {
                return None;
            }
            amount.checked_div(discount)?
        };
        total = total.checked_add(pv)?;
    }

    Some(total)
}

/// Extended IRR for irregular cash flow dates.
///
/// Same-date flows are summed and zero flows dropped. Requires at least two
/// nonzero flows with a sign change. The root is bracketed outward from
/// `guess` and refined with Brent's method; it is accepted only if the
/// residual NPV is within tolerance and the rate lies in (-100%, +10,000%].
pub fn try_xirr(dated_flows: &[(NaiveDate, Money)], guess: Rate) -> AssetFinanceResult<Rate> {
    let mut by_date: BTreeMap<NaiveDate, Money> = BTreeMap::new();
    for (date, amount) in dated_flows {
        *by_date.entry(*date).or_insert(Decimal::ZERO) += *amount;
    }
    let flows: Vec<(NaiveDate, Money)> = by_date
        .into_iter()
        .filter(|(_, amount)| !amount.is_zero())
        .collect();

    if flows.len() < 2 {
        return Err(AssetFinanceError::InsufficientData(
            "XIRR requires at least 2 nonzero cash flows".into(),
        ));
    }

    let has_inflow = flows.iter().any(|(_, a)| a.is_sign_positive());
    let has_outflow = flows.iter().any(|(_, a)| a.is_sign_negative());
    if !(has_inflow && has_outflow) {
        return Err(AssetFinanceError::FinancialImpossibility(
            "XIRR requires at least one sign change in the cash flows".into(),
        ));
    }

    let objective = |rate: Rate| xnpv(rate, &flows);

    let (lo, hi) = find_bracket(objective, guess, XIRR_LOWER_BOUND, XIRR_UPPER_BOUND)
        .ok_or_else(|| AssetFinanceError::ConvergenceFailure {
            function: "XIRR bracket".into(),
            iterations: 0,
            last_delta: objective(guess).unwrap_or(Decimal::ZERO),
        })?;

    let config = SolverConfig::new(crate::solvers::DEFAULT_TOLERANCE, MAX_XIRR_ITERATIONS);
    let solved = brent(objective, lo, hi, &config)?;

    let gross: Money = flows.iter().map(|(_, a)| a.abs()).sum();
    let tolerance = gross * XNPV_RELATIVE_TOLERANCE;
    let residual = objective(solved.root).ok_or_else(|| AssetFinanceError::DivisionByZero {
        context: "XNPV at solved rate".into(),
    })?;

    tracing::debug!(
        rate = %solved.root,
        iterations = solved.iterations,
        residual = %residual,
        "XIRR solved"
    );

    if residual.abs() > tolerance {
        return Err(AssetFinanceError::ConvergenceFailure {
            function: "XIRR".into(),
            iterations: solved.iterations,
            last_delta: residual,
        });
    }
    if solved.root <= dec!(-1) || solved.root > XIRR_UPPER_BOUND {
        return Err(AssetFinanceError::FinancialImpossibility(format!(
            "XIRR of {} is outside the accepted range",
            solved.root
        )));
    }

    Ok(solved.root)
}

/// XIRR as an optional value: `None` whenever no acceptable root exists.
pub fn xirr(dated_flows: &[(NaiveDate, Money)], guess: Rate) -> Option<Rate> {
    match try_xirr(dated_flows, guess) {
        Ok(rate) => Some(rate),
        Err(e) => {
            tracing::debug!(error = %e, "XIRR undefined");
            None
        }
    }
}

/// Level payment that fully repays `principal` over `nper` periods at
/// `rate` per period (annuity formula). Returned as a positive amount.
pub fn level_payment(rate: Rate, nper: u32, principal: Money) -> AssetFinanceResult<Money> {
    if nper == 0 {
        return Err(AssetFinanceError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    if rate.is_zero() {
        return Ok(principal / Decimal::from(nper));
    }

    let factor = (Decimal::ONE + rate)
        .checked_powd(Decimal::from(nper))
        .ok_or_else(|| AssetFinanceError::InvalidInput {
            field: "rate".into(),
            reason: format!("(1 + {rate})^{nper} overflows"),
        })?;
    let annuity_factor = factor - Decimal::ONE;

    if annuity_factor.is_zero() {
        return Err(AssetFinanceError::DivisionByZero {
            context: "annuity factor".into(),
        });
    }

    Ok(principal * rate * factor / annuity_factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_xnpv_zero_rate_is_plain_sum() {
        let flows = vec![(d(2024, 1, 1), dec!(-100)), (d(2025, 7, 1), dec!(130))];
        assert_eq!(xnpv(dec!(0), &flows), Some(dec!(30)));
    }

    #[test]
    fn test_xnpv_minus_one_drops_future_flows() {
        let flows = vec![(d(2024, 1, 1), dec!(-100)), (d(2025, 1, 1), dec!(500))];
        assert_eq!(xnpv(dec!(-1), &flows), Some(dec!(-100)));
        assert_eq!(xnpv(dec!(-1.5), &flows), None);
    }

    #[test]
    fn test_xirr_one_year_ten_percent() {
        let flows = vec![(d(2023, 1, 1), dec!(-1000)), (d(2024, 1, 1), dec!(1100))];
        let rate = xirr(&flows, DEFAULT_XIRR_GUESS).unwrap();
        // 365 days / 365.25 → slightly above 10%
        assert!((rate - dec!(0.10)).abs() < dec!(0.001), "rate {rate}");
    }

    #[test]
    fn test_xirr_merges_same_date_flows() {
        let flows = vec![
            (d(2023, 1, 1), dec!(-600)),
            (d(2023, 1, 1), dec!(-400)),
            (d(2024, 1, 1), dec!(0)),
            (d(2024, 1, 1), dec!(1100)),
        ];
        let rate = xirr(&flows, DEFAULT_XIRR_GUESS).unwrap();
        assert!((rate - dec!(0.10)).abs() < dec!(0.001));
    }

    #[test]
    fn test_xirr_negative_return() {
        let flows = vec![(d(2023, 1, 1), dec!(-1000)), (d(2025, 1, 1), dec!(810))];
        let rate = xirr(&flows, DEFAULT_XIRR_GUESS).unwrap();
        assert!((rate - dec!(-0.10)).abs() < dec!(0.001), "rate {rate}");
    }

    #[test]
    fn test_try_xirr_reports_reason() {
        let flows = vec![(d(2023, 1, 1), dec!(100)), (d(2024, 1, 1), dec!(100))];
        assert!(matches!(
            try_xirr(&flows, DEFAULT_XIRR_GUESS),
            Err(AssetFinanceError::FinancialImpossibility(_))
        ));
    }

    #[test]
    fn test_level_payment() {
        // 100,000 over 12 months at 0.5% per month ≈ 8,606.64
        let payment = level_payment(dec!(0.005), 12, dec!(100_000)).unwrap();
        assert!((payment - dec!(8606.64)).abs() < dec!(0.01), "payment {payment}");
    }

    #[test]
    fn test_level_payment_zero_rate() {
        assert_eq!(level_payment(dec!(0), 4, dec!(1000)).unwrap(), dec!(250));
        assert!(level_payment(dec!(0.01), 0, dec!(1000)).is_err());
    }
}
