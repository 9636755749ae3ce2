use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use asset_finance_core::debt::{blended_target, sizing};
use asset_finance_core::time_value::{try_xirr, DEFAULT_XIRR_GUESS};
use asset_finance_core::CashFlow;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Portfolio model
// ---------------------------------------------------------------------------

#[napi]
pub fn run_portfolio_model(input_json: String) -> NapiResult<String> {
    let input: asset_finance_core::portfolio::PortfolioInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = asset_finance_core::portfolio::run_portfolio(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Debt
// ---------------------------------------------------------------------------

#[napi]
pub fn size_debt(input_json: String) -> NapiResult<String> {
    let input: sizing::SizingRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = sizing::size(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct BlendedTargetInput {
    contracted: Decimal,
    merchant: Decimal,
    target_contract: Decimal,
    target_merchant: Decimal,
}

#[napi]
pub fn blended_dscr_target(input_json: String) -> NapiResult<String> {
    let input: BlendedTargetInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let target = blended_target::blended_target(
        input.contracted,
        input.merchant,
        input.target_contract,
        input.target_merchant,
    );
    serde_json::to_string(&serde_json::json!({ "blended_target": target }))
        .map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Returns
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct XirrInput {
    cash_flows: Vec<CashFlow>,
    #[serde(default)]
    guess: Option<Decimal>,
}

#[napi]
pub fn xirr(input_json: String) -> NapiResult<String> {
    let input: XirrInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let flows: Vec<_> = input
        .cash_flows
        .iter()
        .map(|cf| (cf.date, cf.amount))
        .collect();
    let rate = try_xirr(&flows, input.guess.unwrap_or(DEFAULT_XIRR_GUESS))
        .map_err(to_napi_error)?;
    serde_json::to_string(&serde_json::json!({ "xirr": rate })).map_err(to_napi_error)
}
