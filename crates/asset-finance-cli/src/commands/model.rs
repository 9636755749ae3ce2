use clap::{Args, ValueEnum};
use serde_json::Value;

use asset_finance_core::debt::{DebtStructure, GracePeriod, RepaymentFrequency};
use asset_finance_core::portfolio::{run_portfolio, PortfolioInput};

use crate::input;

/// Part of the model output to emit.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Section {
    /// The whole output envelope
    Full,
    CashFlows,
    DebtSchedules,
    DebtSummary,
    Returns,
    Platform,
    CalendarYear,
    Quarterly,
    FiscalYear,
    FailedAssets,
}

impl Section {
    /// JSON pointer of the section inside the serialised result.
    fn pointer(self) -> Option<&'static str> {
        match self {
            Section::Full => None,
            Section::CashFlows => Some("/cash_flows"),
            Section::DebtSchedules => Some("/debt_schedules"),
            Section::DebtSummary => Some("/debt_summary"),
            Section::Returns => Some("/asset_returns"),
            Section::Platform => Some("/platform_cash_flows"),
            Section::CalendarYear => Some("/summaries/calendar_year"),
            Section::Quarterly => Some("/summaries/quarterly"),
            Section::FiscalYear => Some("/summaries/fiscal_year"),
            Section::FailedAssets => Some("/failed_assets"),
        }
    }
}

/// Arguments for the portfolio model
#[derive(Args)]
pub struct ModelArgs {
    /// Path to a JSON or YAML portfolio input (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Default repayment frequency for assets without an override
    #[arg(long)]
    pub repayment_frequency: Option<RepaymentFrequency>,

    /// Default grace period for assets without an override
    #[arg(long)]
    pub grace_period: Option<GracePeriod>,

    /// Default debt structure for assets without an override
    #[arg(long)]
    pub debt_structure: Option<DebtStructure>,

    /// First month of the fiscal year (1-12)
    #[arg(long)]
    pub fiscal_year_start: Option<u32>,

    /// Leave terminal values out of equity cash flows
    #[arg(long)]
    pub no_terminal_value: bool,

    /// Output section
    #[arg(long, value_enum, default_value = "full")]
    pub section: Section,
}

pub fn run_model(args: ModelArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut portfolio: PortfolioInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        return Err("--input is required (or pipe a portfolio on stdin)".into());
    };

    let config = &mut portfolio.config;
    if let Some(frequency) = args.repayment_frequency {
        config.default_repayment_frequency = frequency;
    }
    if let Some(grace) = args.grace_period {
        config.default_grace_period = grace;
    }
    if let Some(structure) = args.debt_structure {
        config.default_debt_structure = structure;
    }
    if let Some(month) = args.fiscal_year_start {
        config.fiscal_year_start_month = month;
    }
    if args.no_terminal_value {
        config.terminal_value.enabled = false;
    }

    tracing::debug!(
        assets = portfolio.assets.len(),
        section = ?args.section,
        "Portfolio input loaded"
    );

    let result = run_portfolio(&portfolio)?;
    let mut value = serde_json::to_value(result)?;

    if let Some(pointer) = args.section.pointer() {
        let section = value
            .pointer(&format!("/result{pointer}"))
            .cloned()
            .ok_or_else(|| format!("Section {pointer} missing from output"))?;
        if let Some(map) = value.as_object_mut() {
            map.insert("result".into(), section);
        }
    }
    Ok(value)
}
