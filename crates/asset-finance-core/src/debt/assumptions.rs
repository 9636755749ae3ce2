use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AssetFinanceError;
use crate::types::{Multiple, Rate};
use crate::AssetFinanceResult;

/// How principal is repaid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtStructure {
    /// Principal sized each period to hold CFADS / debt service at the target DSCR
    Sculpting,
    /// Level payment over the tenor
    Annuity,
}

/// How often debt service is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentFrequency {
    Monthly,
    Quarterly,
}

impl RepaymentFrequency {
    pub fn periods_per_year(self) -> u32 {
        match self {
            RepaymentFrequency::Monthly => 12,
            RepaymentFrequency::Quarterly => 4,
        }
    }
}

/// When debt service begins relative to the operating start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GracePeriod {
    /// Service starts at the operating start; a partial first period is pro-rated
    None,
    /// Service starts at the first full repayment period after the operating start
    FullPeriod,
}

fn unknown_value(field: &str, value: &str, expected: &[&str]) -> AssetFinanceError {
    AssetFinanceError::InvalidInput {
        field: field.into(),
        reason: format!(
            "unknown value '{value}' (expected one of: {})",
            expected.join(", ")
        ),
    }
}

impl DebtStructure {
    pub fn as_str(self) -> &'static str {
        match self {
            DebtStructure::Sculpting => "sculpting",
            DebtStructure::Annuity => "annuity",
        }
    }
}

impl FromStr for DebtStructure {
    type Err = AssetFinanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sculpting" => Ok(DebtStructure::Sculpting),
            "annuity" => Ok(DebtStructure::Annuity),
            other => Err(unknown_value("debt_structure", other, &["sculpting", "annuity"])),
        }
    }
}

impl RepaymentFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            RepaymentFrequency::Monthly => "monthly",
            RepaymentFrequency::Quarterly => "quarterly",
        }
    }
}

impl FromStr for RepaymentFrequency {
    type Err = AssetFinanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(RepaymentFrequency::Monthly),
            "quarterly" => Ok(RepaymentFrequency::Quarterly),
            other => Err(unknown_value(
                "repayment_frequency",
                other,
                &["monthly", "quarterly"],
            )),
        }
    }
}

impl GracePeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            GracePeriod::None => "none",
            GracePeriod::FullPeriod => "full_period",
        }
    }
}

impl FromStr for GracePeriod {
    type Err = AssetFinanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(GracePeriod::None),
            "full_period" => Ok(GracePeriod::FullPeriod),
            other => Err(unknown_value("grace_period", other, &["none", "full_period"])),
        }
    }
}

impl fmt::Display for DebtStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RepaymentFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for GracePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dated point on an interest-rate curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub date: NaiveDate,
    pub rate: Rate,
}

/// Annual interest rate: a fixed scalar or a forward-filled dated series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InterestRate {
    Fixed(Rate),
    Series(Vec<RatePoint>),
}

impl InterestRate {
    /// Annual rate in force on `date`. Series are forward filled from the
    /// latest point on or before `date`; before the first point the rate is 0.
    pub fn rate_at(&self, date: NaiveDate) -> Rate {
        match self {
            InterestRate::Fixed(rate) => *rate,
            InterestRate::Series(points) => points
                .iter()
                .filter(|p| p.date <= date)
                .max_by_key(|p| p.date)
                .map(|p| p.rate)
                .unwrap_or(Decimal::ZERO),
        }
    }

    /// False when there is no rate data to size against.
    pub fn has_data(&self) -> bool {
        match self {
            InterestRate::Fixed(_) => true,
            InterestRate::Series(points) => !points.is_empty(),
        }
    }

    fn validate(&self) -> AssetFinanceResult<()> {
        let negative = match self {
            InterestRate::Fixed(rate) => rate.is_sign_negative() && !rate.is_zero(),
            InterestRate::Series(points) => points
                .iter()
                .any(|p| p.rate.is_sign_negative() && !p.rate.is_zero()),
        };
        if negative {
            return Err(AssetFinanceError::InvalidInput {
                field: "interest_rate".into(),
                reason: "Interest rates cannot be negative".into(),
            });
        }
        Ok(())
    }
}

/// Per-asset debt assumptions. Structure, frequency and grace period fall
/// back to the model defaults when omitted.
///
/// The overrides are kept as text and parsed per asset, so an unknown value
/// fails that asset alone rather than the whole portfolio input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtAssumptions {
    /// Maximum debt / capex (0–1)
    pub max_gearing: Rate,
    pub tenor_years: u32,
    pub interest_rate: InterestRate,
    /// Minimum DSCR against contracted revenue
    pub target_dscr_contract: Multiple,
    /// Minimum DSCR against merchant revenue
    pub target_dscr_merchant: Multiple,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repayment_frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<String>,
}

fn parse_override<T>(value: &Option<String>) -> AssetFinanceResult<Option<T>>
where
    T: FromStr<Err = AssetFinanceError>,
{
    value.as_deref().map(str::parse).transpose()
}

impl DebtAssumptions {
    pub fn structure_override(&self) -> AssetFinanceResult<Option<DebtStructure>> {
        parse_override(&self.structure)
    }

    pub fn repayment_frequency_override(&self) -> AssetFinanceResult<Option<RepaymentFrequency>> {
        parse_override(&self.repayment_frequency)
    }

    pub fn grace_period_override(&self) -> AssetFinanceResult<Option<GracePeriod>> {
        parse_override(&self.grace_period)
    }

    pub fn validate(&self) -> AssetFinanceResult<()> {
        if self.max_gearing < Decimal::ZERO || self.max_gearing > Decimal::ONE {
            return Err(AssetFinanceError::InvalidInput {
                field: "max_gearing".into(),
                reason: format!("Gearing must be between 0 and 1, got {}", self.max_gearing),
            });
        }
        if self.tenor_years == 0 {
            return Err(AssetFinanceError::InvalidInput {
                field: "tenor_years".into(),
                reason: "Tenor must be at least 1 year".into(),
            });
        }
        self.structure_override()?;
        self.repayment_frequency_override()?;
        self.grace_period_override()?;
        self.interest_rate.validate()
    }
}
