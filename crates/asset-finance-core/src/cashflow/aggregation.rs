use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::asset::{Asset, CapexScheduleEntry, PeriodCashFlow};
use crate::dates;
use crate::debt::amortization::DebtScheduleEntry;
use crate::{types::*, AssetFinanceResult};

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Construction,
    Operations,
}

impl PeriodType {
    /// Construction from construction start up to the operating start,
    /// operations from the operating start on, `None` before construction.
    pub fn classify(asset: &Asset, date: NaiveDate) -> Option<PeriodType> {
        let construction = dates::month_start(asset.construction_start);
        let operations = dates::month_start(asset.operating_start);
        if date >= operations {
            Some(PeriodType::Operations)
        } else if date >= construction {
            Some(PeriodType::Construction)
        } else {
            None
        }
    }
}

/// Month in which the terminal value lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalValuePlacement {
    /// Last operating month: `operating_start + life - 1 month`
    #[default]
    FinalOperatingPeriod,
    /// Month of `operating_start + life`
    AssetLifeEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalValueConfig {
    pub enabled: bool,
    pub placement: TerminalValuePlacement,
}

impl Default for TerminalValueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            placement: TerminalValuePlacement::default(),
        }
    }
}

/// One asset-month of the consolidated cash-flow statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedCashFlow {
    pub asset_id: u32,
    pub date: NaiveDate,
    pub revenue: Money,
    pub contracted_revenue: Money,
    pub merchant_revenue: Money,
    pub opex: Money,
    pub capex: Money,
    pub debt_capex: Money,
    pub equity_capex: Money,
    pub beginning_balance: Money,
    pub drawdown: Money,
    pub interest: Money,
    pub principal: Money,
    pub ending_balance: Money,
    pub debt_service: Money,
    pub cfads: Money,
    /// `None` when there is no debt service in the month
    pub dscr: Option<Multiple>,
    pub terminal_value: Money,
    pub is_terminal_period: bool,
    pub equity_cash_flow: Money,
    pub period_type: Option<PeriodType>,
}

impl ConsolidatedCashFlow {
    fn empty(asset_id: u32, date: NaiveDate) -> Self {
        Self {
            asset_id,
            date,
            revenue: Decimal::ZERO,
            contracted_revenue: Decimal::ZERO,
            merchant_revenue: Decimal::ZERO,
            opex: Decimal::ZERO,
            capex: Decimal::ZERO,
            debt_capex: Decimal::ZERO,
            equity_capex: Decimal::ZERO,
            beginning_balance: Decimal::ZERO,
            drawdown: Decimal::ZERO,
            interest: Decimal::ZERO,
            principal: Decimal::ZERO,
            ending_balance: Decimal::ZERO,
            debt_service: Decimal::ZERO,
            cfads: Decimal::ZERO,
            dscr: None,
            terminal_value: Decimal::ZERO,
            is_terminal_period: false,
            equity_cash_flow: Decimal::ZERO,
            period_type: None,
        }
    }

    /// Equity cash flow without the terminal value.
    pub fn operating_equity_cash_flow(&self) -> Money {
        self.cfads - self.interest - self.principal - self.equity_capex
    }
}

#[derive(Debug, Clone)]
pub struct AggregationRequest<'a> {
    pub asset: &'a Asset,
    pub cash_flows: &'a [PeriodCashFlow],
    pub capex_schedule: &'a [CapexScheduleEntry],
    pub debt_schedule: &'a [DebtScheduleEntry],
    pub terminal_value: Option<Money>,
    pub terminal: TerminalValueConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationOutput {
    pub rows: Vec<ConsolidatedCashFlow>,
    pub terminal_date: Option<NaiveDate>,
    pub terminal_value_applied: bool,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Month the terminal value is placed in for `asset`.
pub fn terminal_period(
    asset: &Asset,
    placement: TerminalValuePlacement,
) -> AssetFinanceResult<NaiveDate> {
    let life_end = dates::month_start(asset.operations_end()?);
    match placement {
        TerminalValuePlacement::AssetLifeEnd => Ok(life_end),
        TerminalValuePlacement::FinalOperatingPeriod => dates::add_months(life_end, -1),
    }
}

/// Merge revenue/opex, capex and debt rows for one asset on date.
///
/// Dates missing from an input contribute zeros. The terminal value is
/// added to equity cash flow in exactly one month, or not at all if that
/// month lies outside the rows produced.
pub fn aggregate(request: &AggregationRequest<'_>) -> AssetFinanceResult<AggregationOutput> {
    let asset = request.asset;
    let mut warnings: Vec<String> = Vec::new();
    let mut rows: BTreeMap<NaiveDate, ConsolidatedCashFlow> = BTreeMap::new();

    for cf in request.cash_flows {
        let row = row_for(&mut rows, asset.id, cf.date);
        row.revenue += cf.revenue;
        row.contracted_revenue += cf.contracted_revenue;
        row.merchant_revenue += cf.merchant_revenue;
        row.opex += cf.opex;
    }
    for entry in request.capex_schedule {
        let row = row_for(&mut rows, asset.id, entry.date);
        row.capex += entry.capex;
        row.debt_capex += entry.debt_capex;
        row.equity_capex += entry.equity_capex;
    }
    for entry in request.debt_schedule {
        let row = row_for(&mut rows, asset.id, entry.date);
        row.beginning_balance += entry.beginning_balance;
        row.drawdown += entry.drawdown;
        row.interest += entry.interest;
        row.principal += entry.principal;
        row.ending_balance += entry.ending_balance;
    }

    for row in rows.values_mut() {
        row.cfads = row.revenue - row.opex;
        row.debt_service = row.interest + row.principal;
        row.dscr = if row.debt_service.is_zero() {
            None
        } else {
            Some(row.cfads / row.debt_service)
        };
        row.equity_cash_flow = row.operating_equity_cash_flow();
        row.period_type = PeriodType::classify(asset, row.date);
    }

    let terminal_value = request
        .terminal_value
        .filter(|tv| *tv > Decimal::ZERO && request.terminal.enabled);

    let mut terminal_date = None;
    let mut terminal_value_applied = false;
    if let Some(tv) = terminal_value {
        let date = terminal_period(asset, request.terminal.placement)?;
        terminal_date = Some(date);
        match rows.get_mut(&date) {
            Some(row) => {
                row.terminal_value = tv;
                row.is_terminal_period = true;
                row.equity_cash_flow += tv;
                terminal_value_applied = true;
            }
            None => {
                let msg = format!(
                    "{}: terminal period {date} is outside the modelled range; terminal value of {tv} not applied",
                    asset.name
                );
                tracing::warn!("{msg}");
                warnings.push(msg);
            }
        }
    }

    Ok(AggregationOutput {
        rows: rows.into_values().collect(),
        terminal_date,
        terminal_value_applied,
        warnings,
    })
}

fn row_for(
    rows: &mut BTreeMap<NaiveDate, ConsolidatedCashFlow>,
    asset_id: u32,
    date: NaiveDate,
) -> &mut ConsolidatedCashFlow {
    let key = dates::month_start(date);
    rows.entry(key)
        .or_insert_with(|| ConsolidatedCashFlow::empty(asset_id, key))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
