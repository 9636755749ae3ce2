use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::error::AssetFinanceError;
use crate::types::Money;
use crate::AssetFinanceResult;

/// Generation or storage technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    Solar,
    Wind,
    Storage,
    Other,
}

/// A physical asset in the portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: u32,
    pub name: String,
    pub technology: Technology,
    /// Commercial operation date
    pub operating_start: NaiveDate,
    pub construction_start: NaiveDate,
    /// Operating life in years from `operating_start`
    pub asset_life_years: u32,
    /// Nameplate capacity (MW)
    pub capacity_mw: Decimal,
}

impl Asset {
    /// End of operations: `operating_start + asset_life_years`.
    pub fn operations_end(&self) -> AssetFinanceResult<NaiveDate> {
        dates::add_years(self.operating_start, self.asset_life_years)
    }

    pub fn validate(&self) -> AssetFinanceResult<()> {
        if self.construction_start > self.operating_start {
            return Err(AssetFinanceError::InvalidInput {
                field: format!("{}.construction_start", self.name),
                reason: "Construction must start on or before the operating start date".into(),
            });
        }
        if self.asset_life_years == 0 {
            return Err(AssetFinanceError::InvalidInput {
                field: format!("{}.asset_life_years", self.name),
                reason: "Asset life must be at least 1 year".into(),
            });
        }
        Ok(())
    }
}

/// Per-asset cost assumptions consumed by this layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CostAssumptions {
    /// Residual value injected into equity cash flow at the terminal period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_value: Option<Money>,
}

/// Revenue and opex for one asset-month, produced by the revenue/opex layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodCashFlow {
    pub asset_id: u32,
    pub date: NaiveDate,
    pub revenue: Money,
    pub opex: Money,
    #[serde(default)]
    pub contracted_revenue: Money,
    #[serde(default)]
    pub merchant_revenue: Money,
}

impl PeriodCashFlow {
    /// Cash flow available for debt service.
    pub fn cfads(&self) -> Money {
        self.revenue - self.opex
    }
}

/// Capex for one asset-month with its debt/equity funding split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapexScheduleEntry {
    pub asset_id: u32,
    pub date: NaiveDate,
    pub capex: Money,
    #[serde(default)]
    pub debt_capex: Money,
    #[serde(default)]
    pub equity_capex: Money,
}

impl CapexScheduleEntry {
    pub fn new(asset_id: u32, date: NaiveDate, capex: Money) -> Self {
        Self {
            asset_id,
            date,
            capex,
            debt_capex: Decimal::ZERO,
            equity_capex: capex,
        }
    }
}
