//! Period roll-ups of the consolidated cash-flow statement.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::cashflow::aggregation::ConsolidatedCashFlow;
use crate::dates;
use crate::types::*;

/// Summed numeric columns of a group of consolidated rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CashFlowTotals {
    pub revenue: Money,
    pub contracted_revenue: Money,
    pub merchant_revenue: Money,
    pub opex: Money,
    pub capex: Money,
    pub debt_capex: Money,
    pub equity_capex: Money,
    pub drawdown: Money,
    pub interest: Money,
    pub principal: Money,
    pub debt_service: Money,
    pub cfads: Money,
    pub terminal_value: Money,
    pub equity_cash_flow: Money,
}

impl CashFlowTotals {
    pub fn add(&mut self, row: &ConsolidatedCashFlow) {
        self.revenue += row.revenue;
        self.contracted_revenue += row.contracted_revenue;
        self.merchant_revenue += row.merchant_revenue;
        self.opex += row.opex;
        self.capex += row.capex;
        self.debt_capex += row.debt_capex;
        self.equity_capex += row.equity_capex;
        self.drawdown += row.drawdown;
        self.interest += row.interest;
        self.principal += row.principal;
        self.debt_service += row.debt_service;
        self.cfads += row.cfads;
        self.terminal_value += row.terminal_value;
        self.equity_cash_flow += row.equity_cash_flow;
    }

    /// Summed CFADS over summed debt service.
    pub fn dscr(&self) -> Option<Multiple> {
        if self.debt_service.is_zero() {
            None
        } else {
            Some(self.cfads / self.debt_service)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryFrequency {
    CalendarYear,
    Quarterly,
    FiscalYear,
}

/// One asset's totals over a calendar year, quarter or fiscal year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub asset_id: u32,
    /// `2027`, `2027-Q3` or `FY2027`
    pub period: String,
    #[serde(flatten)]
    pub totals: CashFlowTotals,
    pub dscr: Option<Multiple>,
}

/// All-asset totals for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformCashFlow {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub totals: CashFlowTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodSummaries {
    pub calendar_year: Vec<PeriodSummary>,
    pub quarterly: Vec<PeriodSummary>,
    pub fiscal_year: Vec<PeriodSummary>,
}

/// Sort key and label for the period a month falls in.
fn period_key(date: NaiveDate, frequency: SummaryFrequency, fy_start: u32) -> (i32, u32, String) {
    match frequency {
        SummaryFrequency::CalendarYear => (date.year(), 0, date.year().to_string()),
        SummaryFrequency::Quarterly => {
            let q = dates::quarter_of(date);
            (date.year(), q, format!("{}-Q{q}", date.year()))
        }
        SummaryFrequency::FiscalYear => {
            let fy = dates::fiscal_year(date, fy_start);
            (fy, 0, format!("FY{fy}"))
        }
    }
}

/// Group rows by asset and period. Output is ordered by asset, then period.
pub fn summarise(
    rows: &[ConsolidatedCashFlow],
    frequency: SummaryFrequency,
    fiscal_year_start_month: u32,
) -> Vec<PeriodSummary> {
    let mut groups: BTreeMap<(u32, i32, u32), (String, CashFlowTotals)> = BTreeMap::new();
    for row in rows {
        let (year, sub, label) = period_key(row.date, frequency, fiscal_year_start_month);
        groups
            .entry((row.asset_id, year, sub))
            .or_insert_with(|| (label, CashFlowTotals::default()))
            .1
            .add(row);
    }

    groups
        .into_iter()
        .map(|((asset_id, _, _), (period, totals))| PeriodSummary {
            asset_id,
            period,
            dscr: totals.dscr(),
            totals,
        })
        .collect()
}

pub fn summarise_all(
    rows: &[ConsolidatedCashFlow],
    fiscal_year_start_month: u32,
) -> PeriodSummaries {
    PeriodSummaries {
        calendar_year: summarise(rows, SummaryFrequency::CalendarYear, fiscal_year_start_month),
        quarterly: summarise(rows, SummaryFrequency::Quarterly, fiscal_year_start_month),
        fiscal_year: summarise(rows, SummaryFrequency::FiscalYear, fiscal_year_start_month),
    }
}

/// Per-date sums across every asset.
pub fn platform_totals(rows: &[ConsolidatedCashFlow]) -> Vec<PlatformCashFlow> {
    let mut by_date: BTreeMap<NaiveDate, CashFlowTotals> = BTreeMap::new();
    for row in rows {
        by_date.entry(row.date).or_default().add(row);
    }
    by_date
        .into_iter()
        .map(|(date, totals)| PlatformCashFlow { date, totals })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn row(asset_id: u32, y: i32, m: u32, cfads: Money, service: Money) -> ConsolidatedCashFlow {
        ConsolidatedCashFlow {
            asset_id,
            date: NaiveDate::from_ymd_opt(y, m, 1).unwrap(),
            revenue: cfads,
            contracted_revenue: cfads,
            merchant_revenue: Decimal::ZERO,
            opex: Decimal::ZERO,
            capex: Decimal::ZERO,
            debt_capex: Decimal::ZERO,
            equity_capex: Decimal::ZERO,
            beginning_balance: Decimal::ZERO,
            drawdown: Decimal::ZERO,
            interest: service,
            principal: Decimal::ZERO,
            ending_balance: Decimal::ZERO,
            debt_service: service,
            cfads,
            dscr: None,
            terminal_value: Decimal::ZERO,
            is_terminal_period: false,
            equity_cash_flow: cfads - service,
            period_type: None,
        }
    }

    fn rows() -> Vec<ConsolidatedCashFlow> {
        vec![
            row(1, 2026, 5, dec!(100), dec!(50)),
            row(1, 2026, 6, dec!(100), dec!(50)),
            row(1, 2026, 7, dec!(120), dec!(0)),
            row(2, 2026, 7, dec!(80), dec!(40)),
        ]
    }

    #[test]
    fn test_calendar_year_summary() {
        let summary = summarise(&rows(), SummaryFrequency::CalendarYear, 7);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].period, "2026");
        assert_eq!(summary[0].totals.cfads, dec!(320));
        assert_eq!(summary[0].dscr, Some(dec!(3.2)));
    }

    #[test]
    fn test_fiscal_year_labelled_by_end_year() {
        let summary = summarise(&rows(), SummaryFrequency::FiscalYear, 7);
        let labels: Vec<&str> = summary.iter().map(|s| s.period.as_str()).collect();
        assert_eq!(labels, vec!["FY2026", "FY2027", "FY2027"]);
        // July 2026 has no debt service
        assert_eq!(summary[1].dscr, None);
    }

    #[test]
    fn test_quarterly_labels() {
        let summary = summarise(&rows(), SummaryFrequency::Quarterly, 7);
        assert_eq!(summary[0].period, "2026-Q2");
        assert_eq!(summary[1].period, "2026-Q3");
    }

    #[test]
    fn test_platform_totals_sum_assets() {
        let platform = platform_totals(&rows());
        assert_eq!(platform.len(), 3);
        assert_eq!(platform[2].totals.cfads, dec!(200));
        assert_eq!(platform[2].totals.debt_service, dec!(40));
    }
}
