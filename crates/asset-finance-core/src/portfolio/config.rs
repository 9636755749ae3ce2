use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cashflow::aggregation::TerminalValueConfig;
use crate::debt::assumptions::{DebtStructure, GracePeriod, RepaymentFrequency};
use crate::debt::capex::CapexFunding;
use crate::debt::sizing::DscrFrequency;
use crate::time_value::DEFAULT_XIRR_GUESS;
use crate::{types::*, AssetFinanceError, AssetFinanceResult};

/// Model-wide settings. Every field has a default, so an empty object is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub default_repayment_frequency: RepaymentFrequency,
    pub default_grace_period: GracePeriod,
    pub default_debt_structure: DebtStructure,
    /// Sizing period over which the DSCR constraint is tested
    pub dscr_calculation_frequency: DscrFrequency,
    pub capex_funding: CapexFunding,
    pub terminal_value: TerminalValueConfig,
    /// First month of the fiscal year (1-12)
    pub fiscal_year_start_month: u32,
    /// Horizon override; only used when both ends are set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_end: Option<NaiveDate>,
    pub xirr_guess: Rate,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_repayment_frequency: RepaymentFrequency::Monthly,
            default_grace_period: GracePeriod::None,
            default_debt_structure: DebtStructure::Sculpting,
            dscr_calculation_frequency: DscrFrequency::Annual,
            capex_funding: CapexFunding::PariPassu,
            terminal_value: TerminalValueConfig::default(),
            fiscal_year_start_month: 7,
            model_start: None,
            model_end: None,
            xirr_guess: DEFAULT_XIRR_GUESS,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> AssetFinanceResult<()> {
        if !(1..=12).contains(&self.fiscal_year_start_month) {
            return Err(AssetFinanceError::invalid(
                "fiscal_year_start_month",
                format!("Must be 1-12, got {}", self.fiscal_year_start_month),
            ));
        }
        if let (Some(start), Some(end)) = (self.model_start, self.model_end) {
            if end < start {
                return Err(AssetFinanceError::invalid(
                    "model_end",
                    format!("Model end {end} is before model start {start}"),
                ));
            }
        }
        if self.xirr_guess <= -Decimal::ONE {
            return Err(AssetFinanceError::invalid(
                "xirr_guess",
                "Initial guess must be above -100%",
            ));
        }
        Ok(())
    }
}
