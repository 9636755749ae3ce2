//! Monthly debt schedule: construction drawdowns, interest accrual and
//! sculpted or annuity principal repayment.
//!
//! The schedule runs over the whole model horizon, one entry per month.
//! Interest accrues monthly from the debt-service start; with quarterly
//! repayment it is paid on calendar quarter-end months. Any accrual still
//! unpaid in the last month of the horizon is settled there.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::asset::CapexScheduleEntry;
use crate::dates;
use crate::debt::assumptions::{DebtStructure, GracePeriod, InterestRate, RepaymentFrequency};
use crate::debt::sizing::SIZING_TOLERANCE;
use crate::time_value::level_payment;
use crate::{types::*, AssetFinanceResult};

const MONTHS_PER_YEAR: Decimal = dec!(12);

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

/// One month of an asset's debt schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtScheduleEntry {
    pub asset_id: u32,
    pub date: NaiveDate,
    pub beginning_balance: Money,
    pub drawdown: Money,
    /// Interest paid in the month
    pub interest: Money,
    pub principal: Money,
    pub ending_balance: Money,
}

impl DebtScheduleEntry {
    pub fn debt_service(&self) -> Money {
        self.interest + self.principal
    }
}

#[derive(Debug, Clone)]
pub struct AmortizationRequest<'a> {
    pub asset_id: u32,
    pub debt_amount: Money,
    pub operating_start: NaiveDate,
    pub horizon_start: NaiveDate,
    pub horizon_end: NaiveDate,
    /// Capex schedule with the final debt/equity split applied
    pub capex_schedule: &'a [CapexScheduleEntry],
    pub interest_rate: &'a InterestRate,
    pub structure: DebtStructure,
    pub repayment_frequency: RepaymentFrequency,
    pub grace_period: GracePeriod,
    pub tenor_years: u32,
    /// Principal per sizing bucket (sculpting only)
    pub sized_principal: &'a [Money],
    pub months_per_bucket: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub entries: Vec<DebtScheduleEntry>,
    pub service_start: NaiveDate,
    /// Balance still outstanding after the last month
    pub residual_balance: Money,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// First month in which interest and principal are due.
///
/// `none` starts service in the operating-start month; `full_period` waits
/// for the next month (monthly) or calendar-quarter (quarterly) boundary
/// strictly after the operating start.
pub fn debt_service_start(
    operating_start: NaiveDate,
    frequency: RepaymentFrequency,
    grace: GracePeriod,
) -> AssetFinanceResult<NaiveDate> {
    match (grace, frequency) {
        (GracePeriod::None, _) => Ok(dates::month_start(operating_start)),
        (GracePeriod::FullPeriod, RepaymentFrequency::Monthly) => {
            dates::next_month_start_after(operating_start)
        }
        (GracePeriod::FullPeriod, RepaymentFrequency::Quarterly) => {
            dates::next_quarter_start_after(operating_start)
        }
    }
}

/// Running state of the monthly fold.
struct ScheduleState {
    balance: Money,
    undrawn: Money,
    accrued_interest: Money,
    accrued_principal: Money,
    level_payment: Option<Money>,
}

pub fn generate(request: &AmortizationRequest<'_>) -> AssetFinanceResult<AmortizationSchedule> {
    let months = dates::monthly_range(request.horizon_start, request.horizon_end)?;
    let service_start = debt_service_start(
        request.operating_start,
        request.repayment_frequency,
        request.grace_period,
    )?;
    let mut warnings: Vec<String> = Vec::new();

    let mut debt_capex_by_month: BTreeMap<NaiveDate, Money> = BTreeMap::new();
    for entry in request
        .capex_schedule
        .iter()
        .filter(|e| e.date < request.operating_start)
    {
        *debt_capex_by_month
            .entry(dates::month_start(entry.date))
            .or_insert(Decimal::ZERO) += entry.debt_capex;
    }

    let tenor_months = request.tenor_years as i32 * 12;
    let bucket_width = request.months_per_bucket.max(1) as i32;
    let last_month = months.last().copied();

    let mut state = ScheduleState {
        balance: Decimal::ZERO,
        undrawn: request.debt_amount.max(Decimal::ZERO),
        accrued_interest: Decimal::ZERO,
        accrued_principal: Decimal::ZERO,
        level_payment: None,
    };
    let mut entries = Vec::with_capacity(months.len());

    for month in months {
        let beginning = state.balance;

        let drawdown = debt_capex_by_month
            .get(&month)
            .copied()
            .unwrap_or(Decimal::ZERO)
            .max(Decimal::ZERO)
            .min(state.undrawn);
        state.undrawn -= drawdown;
        let outstanding = beginning + drawdown;

        let months_in_service = dates::months_between(service_start, month);
        let in_service = months_in_service >= 0 && !outstanding.is_zero();

        let mut interest = Decimal::ZERO;
        let mut principal = Decimal::ZERO;

        if in_service {
            let monthly_rate = request.interest_rate.rate_at(month) / MONTHS_PER_YEAR;
            state.accrued_interest += outstanding * monthly_rate;

            if request.structure == DebtStructure::Sculpting {
                let bucket = (months_in_service / bucket_width) as usize;
                if let Some(bucket_principal) = request.sized_principal.get(bucket) {
                    state.accrued_principal +=
                        *bucket_principal / Decimal::from(bucket_width);
                }
            }

            let payment_due = match request.repayment_frequency {
                RepaymentFrequency::Monthly => true,
                RepaymentFrequency::Quarterly => dates::is_quarter_end(month),
            };
            let final_month = Some(month) == last_month;

            if payment_due || final_month {
                interest = state.accrued_interest;
                state.accrued_interest = Decimal::ZERO;

                principal = match request.structure {
                    DebtStructure::Sculpting => {
                        let due = state.accrued_principal;
                        state.accrued_principal = Decimal::ZERO;
                        due
                    }
                    DebtStructure::Annuity if payment_due && months_in_service < tenor_months => {
                        let payment = match state.level_payment {
                            Some(p) => p,
                            None => {
                                let p = annuity_payment(request, service_start, outstanding)?;
                                state.level_payment = Some(p);
                                p
                            }
                        };
                        (payment - interest).max(Decimal::ZERO)
                    }
                    DebtStructure::Annuity => Decimal::ZERO,
                }
                .min(outstanding);
            }
        }

        let ending = outstanding - principal;
        state.balance = ending;

        entries.push(DebtScheduleEntry {
            asset_id: request.asset_id,
            date: month,
            beginning_balance: beginning,
            drawdown,
            interest,
            principal,
            ending_balance: ending,
        });
    }

    if state.undrawn > SIZING_TOLERANCE {
        let msg = format!(
            "Asset {}: {} of sized debt was never drawn (no debt-funded capex before operations)",
            request.asset_id,
            state.undrawn.round_dp(2)
        );
        tracing::warn!("{msg}");
        warnings.push(msg);
    }

    let residual_balance = state.balance;
    if residual_balance > SIZING_TOLERANCE {
        let msg = format!(
            "Asset {}: debt balance of {} remains outstanding at the end of the model horizon",
            request.asset_id,
            residual_balance.round_dp(2)
        );
        tracing::warn!("{msg}");
        warnings.push(msg);
    }

    Ok(AmortizationSchedule {
        entries,
        service_start,
        residual_balance,
        warnings,
    })
}

/// Level payment per repayment period on the balance outstanding when
/// service starts.
fn annuity_payment(
    request: &AmortizationRequest<'_>,
    service_start: NaiveDate,
    balance: Money,
) -> AssetFinanceResult<Money> {
    let periods_per_year = request.repayment_frequency.periods_per_year();
    let period_rate =
        request.interest_rate.rate_at(service_start) / Decimal::from(periods_per_year);
    level_payment(period_rate, request.tenor_years * periods_per_year, balance)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debt::assumptions::RatePoint;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn capex() -> Vec<CapexScheduleEntry> {
        vec![
            CapexScheduleEntry {
                asset_id: 1,
                date: d(2025, 10),
                capex: dec!(600),
                debt_capex: dec!(420),
                equity_capex: dec!(180),
            },
            CapexScheduleEntry {
                asset_id: 1,
                date: d(2025, 12),
                capex: dec!(400),
                debt_capex: dec!(280),
                equity_capex: dec!(120),
            },
        ]
    }

    fn base_request<'a>(
        capex: &'a [CapexScheduleEntry],
        rate: &'a InterestRate,
        principal: &'a [Money],
    ) -> AmortizationRequest<'a> {
        AmortizationRequest {
            asset_id: 1,
            debt_amount: dec!(700),
            operating_start: d(2026, 1),
            horizon_start: d(2025, 10),
            horizon_end: d(2027, 12),
            capex_schedule: capex,
            interest_rate: rate,
            structure: DebtStructure::Sculpting,
            repayment_frequency: RepaymentFrequency::Monthly,
            grace_period: GracePeriod::None,
            tenor_years: 2,
            sized_principal: principal,
            months_per_bucket: 12,
        }
    }

    fn assert_invariants(schedule: &AmortizationSchedule) {
        for e in &schedule.entries {
            assert_eq!(e.ending_balance, e.beginning_balance + e.drawdown - e.principal);
            assert!(e.principal <= e.beginning_balance + e.drawdown);
            assert!(e.ending_balance >= Decimal::ZERO);
        }
    }

    #[test]
    fn test_service_start_policies() {
        let cod = NaiveDate::from_ymd_opt(2026, 5, 15).unwrap();
        assert_eq!(
            debt_service_start(cod, RepaymentFrequency::Monthly, GracePeriod::None).unwrap(),
            d(2026, 5)
        );
        assert_eq!(
            debt_service_start(cod, RepaymentFrequency::Monthly, GracePeriod::FullPeriod).unwrap(),
            d(2026, 6)
        );
        assert_eq!(
            debt_service_start(cod, RepaymentFrequency::Quarterly, GracePeriod::FullPeriod)
                .unwrap(),
            d(2026, 7)
        );
    }

    #[test]
    fn test_monthly_sculpted_schedule_repays() {
        let capex = capex();
        let rate = InterestRate::Fixed(dec!(0.06));
        let principal = [dec!(400), dec!(300)];
        let schedule = generate(&base_request(&capex, &rate, &principal)).unwrap();

        assert_eq!(schedule.entries.len(), 27);
        assert_invariants(&schedule);

        // Drawdowns follow debt-funded capex, no construction interest
        assert_eq!(schedule.entries[0].drawdown, dec!(420));
        assert_eq!(schedule.entries[2].drawdown, dec!(280));
        assert!(schedule.entries[..3].iter().all(|e| e.interest.is_zero()));

        // First operating month: 700 × 0.5% interest, 400 / 12 principal
        let jan = &schedule.entries[3];
        assert_eq!(jan.interest, dec!(3.5));
        assert!((jan.principal - dec!(33.3333)).abs() < dec!(0.001));

        assert!(schedule.residual_balance.abs() < dec!(0.0001));
        assert!(schedule.warnings.is_empty());
    }

    #[test]
    fn test_quarterly_pays_on_quarter_ends() {
        let capex = capex();
        let rate = InterestRate::Fixed(dec!(0.06));
        let principal = [dec!(400), dec!(300)];
        let mut request = base_request(&capex, &rate, &principal);
        request.repayment_frequency = RepaymentFrequency::Quarterly;
        let schedule = generate(&request).unwrap();

        assert_invariants(&schedule);
        for e in &schedule.entries {
            if !dates::is_quarter_end(e.date) && e.date != d(2027, 12) {
                assert!(e.interest.is_zero() && e.principal.is_zero(), "{e:?}");
            }
        }
        let march = schedule.entries.iter().find(|e| e.date == d(2026, 3)).unwrap();
        assert!((march.principal - dec!(100)).abs() < dec!(0.0001));
        assert!(march.interest > Decimal::ZERO);
    }

    #[test]
    fn test_annuity_level_service() {
        let capex = capex();
        let rate = InterestRate::Fixed(dec!(0.06));
        let mut request = base_request(&capex, &rate, &[]);
        request.structure = DebtStructure::Annuity;
        let schedule = generate(&request).unwrap();

        assert_invariants(&schedule);
        let service: Vec<Money> = schedule
            .entries
            .iter()
            .filter(|e| e.date >= d(2026, 1))
            .map(|e| e.debt_service())
            .collect();
        assert_eq!(service.len(), 24);
        assert!((service[0] - service[23]).abs() < dec!(0.0001));
        assert!(schedule.residual_balance.abs() < dec!(0.0001));
    }

    #[test]
    fn test_residual_balance_warns() {
        let capex = capex();
        let rate = InterestRate::Fixed(dec!(0.06));
        let principal = [dec!(100)];
        let schedule = generate(&base_request(&capex, &rate, &principal)).unwrap();
        assert!((schedule.residual_balance - dec!(600)).abs() < dec!(0.0001));
        assert_eq!(schedule.warnings.len(), 1);
    }

    #[test]
    fn test_rate_step_leaves_annuity_residual() {
        let capex = capex();
        let rate = InterestRate::Series(vec![
            RatePoint { date: d(2025, 1), rate: dec!(0.06) },
            RatePoint { date: d(2027, 1), rate: dec!(0.18) },
        ]);
        let mut request = base_request(&capex, &rate, &[]);
        request.structure = DebtStructure::Annuity;
        let schedule = generate(&request).unwrap();
        assert_invariants(&schedule);

        // Level service while the sizing rate holds
        let first_year: Vec<Money> = schedule
            .entries
            .iter()
            .filter(|e| e.date >= d(2026, 1) && e.date < d(2027, 1))
            .map(|e| e.debt_service())
            .collect();
        assert!(first_year.iter().all(|s| (*s - first_year[0]).abs() < dec!(0.0001)));

        // The step-up is charged from its month, eating into principal
        let jan = schedule.entries.iter().find(|e| e.date == d(2027, 1)).unwrap();
        assert_eq!(jan.interest, jan.beginning_balance * dec!(0.015));
        assert!((jan.debt_service() - first_year[0]).abs() < dec!(0.0001));

        assert!(schedule.residual_balance > SIZING_TOLERANCE);
        assert!(schedule
            .warnings
            .iter()
            .any(|w| w.contains("remains outstanding")));
    }
}
