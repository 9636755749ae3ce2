use std::time::Instant;

use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use asset_finance_core::debt::blended_target::blended_target;
use asset_finance_core::debt::sizing::{self, SizingRequest};
use asset_finance_core::debt::DebtStructure;
use asset_finance_core::with_metadata;

use crate::input;

/// Arguments for single-asset debt sizing
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct SizeDebtArgs {
    /// Path to JSON/YAML sizing request (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Total capex to fund
    #[arg(long)]
    pub capex: Option<Decimal>,

    /// CFADS per sizing period, comma separated
    #[arg(long, value_delimiter = ',')]
    pub cash_flows: Vec<Decimal>,

    /// Minimum DSCR per period, comma separated (a single value applies to every period)
    #[arg(long, value_delimiter = ',')]
    pub dscr_targets: Vec<Decimal>,

    /// Maximum gearing (debt / capex)
    #[arg(long)]
    pub max_gearing: Option<Decimal>,

    /// Interest rate per sizing period
    #[arg(long)]
    pub period_rate: Option<Decimal>,

    /// Tenor in sizing periods (defaults to the number of cash flows)
    #[arg(long)]
    pub tenor_periods: Option<u32>,

    /// Debt structure
    #[arg(long, default_value = "sculpting")]
    pub structure: DebtStructure,
}

/// Arguments for the blended DSCR target
#[derive(Args)]
pub struct BlendedTargetArgs {
    /// Contracted revenue
    #[arg(long)]
    pub contracted: Decimal,

    /// Merchant revenue
    #[arg(long)]
    pub merchant: Decimal,

    /// Target DSCR for contracted revenue
    #[arg(long)]
    pub target_contract: Decimal,

    /// Target DSCR for merchant revenue
    #[arg(long)]
    pub target_merchant: Decimal,
}

pub fn run_size_debt(args: SizeDebtArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: SizingRequest = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        let periods = args.cash_flows.len();
        let dscr_targets = match args.dscr_targets.as_slice() {
            [] => return Err("--dscr-targets is required (or provide --input)".into()),
            [single] => vec![*single; periods],
            many => many.to_vec(),
        };
        SizingRequest {
            capex: args.capex.ok_or("--capex is required (or provide --input)")?,
            cash_flows: args.cash_flows,
            dscr_targets,
            max_gearing: args
                .max_gearing
                .ok_or("--max-gearing is required (or provide --input)")?,
            period_rate: args
                .period_rate
                .ok_or("--period-rate is required (or provide --input)")?,
            tenor_periods: args.tenor_periods.unwrap_or(periods as u32),
            structure: args.structure,
        }
    };

    let start = Instant::now();
    let result = sizing::size(&request)?;
    let mut warnings = Vec::new();
    if !result.fully_repaid {
        warnings.push(format!(
            "Sized debt is not repaid within the tenor (final balance {})",
            result.final_balance.round_dp(2)
        ));
    }
    let methodology = match request.structure {
        DebtStructure::Sculpting => "DSCR-sculpted debt sizing (binary search)",
        DebtStructure::Annuity => "Annuity debt sizing at maximum gearing",
    };
    let output = with_metadata(
        methodology,
        &request,
        warnings,
        start.elapsed().as_micros() as u64,
        result,
    );
    Ok(serde_json::to_value(output)?)
}

pub fn run_blended_target(args: BlendedTargetArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let target = blended_target(
        args.contracted,
        args.merchant,
        args.target_contract,
        args.target_merchant,
    );
    Ok(json!({ "blended_target": target.round_dp(6).to_string() }))
}
