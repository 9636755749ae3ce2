use std::time::Instant;

use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use asset_finance_core::time_value::{try_xirr, xnpv, DEFAULT_XIRR_GUESS};
use asset_finance_core::{with_metadata, CashFlow, Money, Rate};

use crate::input;

/// Arguments for XIRR
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct XirrArgs {
    /// Path to JSON/YAML list of {date, amount} cash flows
    #[arg(long)]
    pub input: Option<String>,

    /// Cash flows as DATE:AMOUNT pairs, comma separated (e.g. 2025-01-01:-1000,2026-01-01:1100)
    #[arg(long, value_delimiter = ',')]
    pub flows: Vec<String>,

    /// Initial guess
    #[arg(long)]
    pub guess: Option<Decimal>,
}

#[derive(Serialize, Deserialize)]
struct XirrOutput {
    xirr: Option<Rate>,
    xnpv_at_rate: Option<Money>,
    flow_count: usize,
}

fn parse_flow(raw: &str) -> Result<(NaiveDate, Money), Box<dyn std::error::Error>> {
    let (date, amount) = raw
        .split_once(':')
        .ok_or_else(|| format!("Expected DATE:AMOUNT, got '{raw}'"))?;
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|e| format!("Bad date in '{raw}': {e}"))?;
    let amount: Decimal = amount
        .trim()
        .parse()
        .map_err(|e| format!("Bad amount in '{raw}': {e}"))?;
    Ok((date, amount))
}

pub fn run_xirr(args: XirrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let flows: Vec<(NaiveDate, Money)> = if let Some(ref path) = args.input {
        let cash_flows: Vec<CashFlow> = input::file::read_input(path)?;
        cash_flows.into_iter().map(|cf| (cf.date, cf.amount)).collect()
    } else if !args.flows.is_empty() {
        args.flows
            .iter()
            .map(|raw| parse_flow(raw))
            .collect::<Result<_, _>>()?
    } else if let Some(cash_flows) = input::stdin::read_stdin::<Vec<CashFlow>>()? {
        cash_flows.into_iter().map(|cf| (cf.date, cf.amount)).collect()
    } else {
        return Err("--flows is required (or provide --input)".into());
    };

    let guess = args.guess.unwrap_or(DEFAULT_XIRR_GUESS);
    tracing::debug!(flows = flows.len(), %guess, "Solving XIRR");
    let start = Instant::now();
    let mut warnings = Vec::new();

    let rate = match try_xirr(&flows, guess) {
        Ok(rate) => Some(rate),
        Err(e) => {
            warnings.push(format!("XIRR undefined: {e}"));
            None
        }
    };
    let output = XirrOutput {
        xirr: rate,
        xnpv_at_rate: rate.and_then(|r| xnpv(r, &flows)),
        flow_count: flows.len(),
    };

    let result = with_metadata(
        "XIRR (Brent's method, actual/365.25)",
        &serde_json::json!({ "guess": guess.to_string() }),
        warnings,
        start.elapsed().as_micros() as u64,
        output,
    );
    Ok(serde_json::to_value(result)?)
}
