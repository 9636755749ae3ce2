use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::asset::CapexScheduleEntry;
use crate::types::Money;

/// Order in which debt and equity fund construction capex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapexFunding {
    /// Every month is funded at the realised gearing
    #[default]
    PariPassu,
    /// Equity funds capex until its share is used up, then debt
    EquityFirst,
}

/// Positive capex dated before `operating_start`: the only spend debt can
/// fund, since drawdowns stop once operations begin.
pub fn construction_capex(schedule: &[CapexScheduleEntry], operating_start: NaiveDate) -> Money {
    schedule
        .iter()
        .filter(|e| e.date < operating_start)
        .map(|e| e.capex.max(Decimal::ZERO))
        .sum()
}

/// Overwrite the debt/equity split of a capex schedule once the debt amount
/// is known. `debt_amount` is capped at construction capex; entries dated on
/// or after `operating_start`, and entries with no positive capex, stay fully
/// equity funded.
pub fn apply_debt_split(
    schedule: &[CapexScheduleEntry],
    operating_start: NaiveDate,
    debt_amount: Money,
    funding: CapexFunding,
) -> Vec<CapexScheduleEntry> {
    let total = construction_capex(schedule, operating_start);
    let debt = debt_amount.max(Decimal::ZERO).min(total);

    let mut out: Vec<CapexScheduleEntry> = schedule.to_vec();
    for entry in out.iter_mut() {
        entry.debt_capex = Decimal::ZERO;
        entry.equity_capex = entry.capex;
    }
    if total.is_zero() {
        return out;
    }

    let mut order: Vec<usize> = (0..out.len())
        .filter(|&i| out[i].date < operating_start)
        .collect();
    order.sort_by_key(|&i| out[i].date);

    match funding {
        CapexFunding::PariPassu => {
            let gearing = debt / total;
            for i in order {
                let entry = &mut out[i];
                entry.debt_capex = entry.capex.max(Decimal::ZERO) * gearing;
                entry.equity_capex = entry.capex - entry.debt_capex;
            }
        }
        CapexFunding::EquityFirst => {
            let mut equity_remaining = total - debt;
            for i in order {
                let entry = &mut out[i];
                let capex = entry.capex.max(Decimal::ZERO);
                let equity = capex.min(equity_remaining);
                equity_remaining -= equity;
                entry.debt_capex = capex - equity;
                entry.equity_capex = entry.capex - entry.debt_capex;
            }
        }
    }
    out
}
