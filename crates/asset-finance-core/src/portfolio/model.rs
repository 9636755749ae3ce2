//! Portfolio orchestration.
//!
//! Each asset runs through the same pipeline: blended DSCR targets, debt
//! sizing, capex funding split, monthly amortization and cash-flow
//! aggregation. Assets are independent; a failure in one is recorded and
//! the rest of the portfolio is still produced. Portfolio figures are sums
//! over the assets that succeeded.

use std::collections::HashSet;
use std::time::Instant;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::asset::{Asset, CapexScheduleEntry, CostAssumptions, PeriodCashFlow};
use crate::cashflow::aggregation::{self, AggregationRequest, ConsolidatedCashFlow};
use crate::cashflow::summary::{self, PeriodSummaries, PlatformCashFlow};
use crate::dates;
use crate::debt::amortization::{self, AmortizationRequest, DebtScheduleEntry};
use crate::debt::assumptions::{DebtAssumptions, DebtStructure, GracePeriod, RepaymentFrequency};
use crate::debt::capex::{apply_debt_split, construction_capex};
use crate::debt::sizing::{self, DebtSizingResult, SizingRequest};
use crate::portfolio::config::ModelConfig;
use crate::time_value::xirr;
use crate::{types::*, AssetFinanceError, AssetFinanceResult};

/// Relative slack before an achieved DSCR counts as a target breach.
const DSCR_BREACH_TOLERANCE: Decimal = dec!(0.000001);

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Everything the model needs for one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetInput {
    pub asset: Asset,
    pub debt: DebtAssumptions,
    #[serde(default)]
    pub costs: CostAssumptions,
    /// Monthly revenue and opex
    pub cash_flows: Vec<PeriodCashFlow>,
    /// Monthly capex; any debt/equity split given here is replaced after sizing
    #[serde(default)]
    pub capex_schedule: Vec<CapexScheduleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioInput {
    #[serde(default)]
    pub config: ModelConfig,
    pub assets: Vec<AssetInput>,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Debt sizing outcome for one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtSummary {
    pub asset_id: u32,
    pub asset_name: String,
    pub capex: Money,
    /// Sized debt
    pub debt: Money,
    /// Debt actually drawn against construction capex
    pub debt_drawn: Money,
    /// Capex not funded by drawn debt
    pub equity: Money,
    /// Drawn debt / capex; `None` without capex
    pub gearing: Option<Rate>,
    pub structure: DebtStructure,
    pub repayment_frequency: RepaymentFrequency,
    pub grace_period: GracePeriod,
    pub min_dscr: Option<Multiple>,
    pub fully_repaid: bool,
    pub sizing_iterations: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebtSummaryTotal {
    pub capex: Money,
    pub debt: Money,
    pub debt_drawn: Money,
    pub equity: Money,
    pub gearing: Option<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetReturns {
    pub asset_id: u32,
    pub asset_name: String,
    pub equity_irr: Option<Rate>,
    /// Unlevered: CFADS less capex
    pub project_irr: Option<Rate>,
    pub terminal_value_applied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedAsset {
    pub asset_id: u32,
    pub asset_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioOutput {
    pub model_start: NaiveDate,
    pub model_end: NaiveDate,
    pub cash_flows: Vec<ConsolidatedCashFlow>,
    pub debt_schedules: Vec<DebtScheduleEntry>,
    pub debt_summary: Vec<DebtSummary>,
    pub debt_summary_total: DebtSummaryTotal,
    pub asset_returns: Vec<AssetReturns>,
    pub portfolio_equity_irr: Option<Rate>,
    pub platform_cash_flows: Vec<PlatformCashFlow>,
    pub summaries: PeriodSummaries,
    pub failed_assets: Vec<FailedAsset>,
}

/// Full result for one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetResult {
    pub sizing: DebtSizingResult,
    pub summary: DebtSummary,
    pub debt_schedule: Vec<DebtScheduleEntry>,
    pub cash_flows: Vec<ConsolidatedCashFlow>,
    pub returns: AssetReturns,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Run the full model over a portfolio.
pub fn run_portfolio(
    input: &PortfolioInput,
) -> AssetFinanceResult<ComputationOutput<PortfolioOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let config = &input.config;

    config.validate()?;
    if input.assets.is_empty() {
        return Err(AssetFinanceError::InsufficientData(
            "Portfolio contains no assets".into(),
        ));
    }
    let mut seen = HashSet::new();
    for a in &input.assets {
        if !seen.insert(a.asset.id) {
            return Err(AssetFinanceError::invalid(
                "assets",
                format!("Duplicate asset id {}", a.asset.id),
            ));
        }
    }

    let (model_start, model_end) = model_horizon(&input.assets, config)?;
    tracing::info!(
        assets = input.assets.len(),
        start = %model_start,
        end = %model_end,
        "Running portfolio model"
    );

    let results = process_all(&input.assets, config, (model_start, model_end));

    let mut cash_flows = Vec::new();
    let mut debt_schedules = Vec::new();
    let mut debt_summary = Vec::new();
    let mut asset_returns = Vec::new();
    let mut failed_assets = Vec::new();

    for (asset_input, result) in input.assets.iter().zip(results) {
        let asset = &asset_input.asset;
        match result {
            Ok(r) => {
                warnings.extend(r.warnings);
                cash_flows.extend(r.cash_flows);
                debt_schedules.extend(r.debt_schedule);
                debt_summary.push(r.summary);
                asset_returns.push(r.returns);
            }
            Err(e) => {
                tracing::warn!(asset = %asset.name, error = %e, "Asset failed");
                warnings.push(format!("{} failed: {e}", asset.name));
                failed_assets.push(FailedAsset {
                    asset_id: asset.id,
                    asset_name: asset.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let debt_summary_total = total_debt_summary(&debt_summary);
    let portfolio_equity_irr = equity_irr(&cash_flows, config.xirr_guess);
    if portfolio_equity_irr.is_none() && !cash_flows.is_empty() {
        warnings.push("Portfolio equity IRR is undefined for these cash flows".into());
    }
    let platform_cash_flows = summary::platform_totals(&cash_flows);
    let summaries = summary::summarise_all(&cash_flows, config.fiscal_year_start_month);

    let output = PortfolioOutput {
        model_start,
        model_end,
        cash_flows,
        debt_schedules,
        debt_summary,
        debt_summary_total,
        asset_returns,
        portfolio_equity_irr,
        platform_cash_flows,
        summaries,
        failed_assets,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Portfolio debt sizing, amortization and equity returns",
        &serde_json::json!({
            "assets": input.assets.len(),
            "config": config,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(feature = "parallel")]
fn process_all(
    assets: &[AssetInput],
    config: &ModelConfig,
    horizon: (NaiveDate, NaiveDate),
) -> Vec<AssetFinanceResult<AssetResult>> {
    use rayon::prelude::*;

    assets
        .par_iter()
        .map(|a| process_asset(a, config, horizon))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn process_all(
    assets: &[AssetInput],
    config: &ModelConfig,
    horizon: (NaiveDate, NaiveDate),
) -> Vec<AssetFinanceResult<AssetResult>> {
    assets
        .iter()
        .map(|a| process_asset(a, config, horizon))
        .collect()
}

/// Model horizon: the configured override when both ends are set, otherwise
/// from the earliest construction-start month to the latest end of life.
pub fn model_horizon(
    assets: &[AssetInput],
    config: &ModelConfig,
) -> AssetFinanceResult<(NaiveDate, NaiveDate)> {
    if let (Some(start), Some(end)) = (config.model_start, config.model_end) {
        return Ok((dates::month_start(start), dates::month_start(end)));
    }

    let start = assets
        .iter()
        .map(|a| dates::month_start(a.asset.construction_start))
        .min()
        .ok_or_else(|| AssetFinanceError::InsufficientData("No assets".into()))?;
    let mut end = start;
    for a in assets {
        end = end.max(dates::month_start(a.asset.operations_end()?));
    }
    Ok((start, end))
}

/// Run the pipeline for one asset over the model horizon.
pub fn process_asset(
    input: &AssetInput,
    config: &ModelConfig,
    horizon: (NaiveDate, NaiveDate),
) -> AssetFinanceResult<AssetResult> {
    let asset = &input.asset;
    let debt = &input.debt;
    asset.validate()?;
    debt.validate()?;

    let mut warnings: Vec<String> = Vec::new();
    let (horizon_start, horizon_end) = horizon;
    let in_horizon = |date: NaiveDate| {
        let month = dates::month_start(date);
        month >= horizon_start && month <= horizon_end
    };
    let cash_flows: Vec<PeriodCashFlow> = input
        .cash_flows
        .iter()
        .filter(|cf| in_horizon(cf.date))
        .cloned()
        .collect();
    let capex_schedule: Vec<CapexScheduleEntry> = input
        .capex_schedule
        .iter()
        .filter(|e| in_horizon(e.date))
        .cloned()
        .collect();

    let structure = debt
        .structure_override()?
        .unwrap_or(config.default_debt_structure);
    let frequency = debt
        .repayment_frequency_override()?
        .unwrap_or(config.default_repayment_frequency);
    let grace = debt
        .grace_period_override()?
        .unwrap_or(config.default_grace_period);
    let service_start = amortization::debt_service_start(asset.operating_start, frequency, grace)?;

    let total_capex: Money = capex_schedule
        .iter()
        .map(|e| e.capex.max(Decimal::ZERO))
        .sum();
    let fundable_capex = construction_capex(&capex_schedule, asset.operating_start);
    if fundable_capex < total_capex {
        warnings.push(format!(
            "{}: {} of capex falls on or after the operating start and is equity funded",
            asset.name,
            (total_capex - fundable_capex).round_dp(2)
        ));
    }

    // Sizing
    let dscr_frequency = config.dscr_calculation_frequency;
    let buckets = sizing::build_buckets(
        &cash_flows,
        service_start,
        dscr_frequency.months_per_bucket(),
        debt.target_dscr_contract,
        debt.target_dscr_merchant,
    );
    let buckets_per_year = Decimal::from(dscr_frequency.buckets_per_year());

    let sizing = if debt.interest_rate.has_data() {
        sizing::size(&SizingRequest {
            capex: fundable_capex,
            cash_flows: buckets.cash_flows,
            dscr_targets: buckets.targets,
            max_gearing: debt.max_gearing,
            period_rate: debt.interest_rate.rate_at(service_start) / buckets_per_year,
            tenor_periods: debt.tenor_years * dscr_frequency.buckets_per_year(),
            structure,
        })?
    } else {
        let msg = format!("{}: empty interest rate series; asset is 100% equity funded", asset.name);
        tracing::warn!("{msg}");
        warnings.push(msg);
        sizing::size(&SizingRequest {
            capex: Decimal::ZERO,
            cash_flows: Vec::new(),
            dscr_targets: Vec::new(),
            max_gearing: debt.max_gearing,
            period_rate: Decimal::ZERO,
            tenor_periods: 1,
            structure,
        })?
    };

    if fundable_capex > Decimal::ZERO && sizing.debt_amount.is_zero() {
        warnings.push(format!(
            "{}: no debt could be supported; capex is 100% equity funded",
            asset.name
        ));
    }
    let breaches = sizing
        .schedule
        .iter()
        .filter(|p| match p.dscr {
            Some(dscr) => dscr < p.target_dscr * (Decimal::ONE - DSCR_BREACH_TOLERANCE),
            None => false,
        })
        .count();
    if breaches > 0 {
        warnings.push(format!(
            "{}: DSCR below target in {breaches} sizing period(s)",
            asset.name
        ));
    }

    // Funding split and monthly schedule
    let capex_schedule = apply_debt_split(
        &capex_schedule,
        asset.operating_start,
        sizing.debt_amount,
        config.capex_funding,
    );
    let principal = sizing.principal_by_period();
    let schedule = amortization::generate(&AmortizationRequest {
        asset_id: asset.id,
        debt_amount: sizing.debt_amount,
        operating_start: asset.operating_start,
        horizon_start,
        horizon_end,
        capex_schedule: &capex_schedule,
        interest_rate: &debt.interest_rate,
        structure,
        repayment_frequency: frequency,
        grace_period: grace,
        tenor_years: debt.tenor_years,
        sized_principal: &principal,
        months_per_bucket: dscr_frequency.months_per_bucket(),
    })?;
    warnings.extend(schedule.warnings);
    let debt_drawn: Money = schedule.entries.iter().map(|e| e.drawdown).sum();

    // Consolidation and returns
    let aggregated = aggregation::aggregate(&AggregationRequest {
        asset,
        cash_flows: &cash_flows,
        capex_schedule: &capex_schedule,
        debt_schedule: &schedule.entries,
        terminal_value: input.costs.terminal_value,
        terminal: config.terminal_value,
    })?;
    warnings.extend(aggregated.warnings);

    let returns = AssetReturns {
        asset_id: asset.id,
        asset_name: asset.name.clone(),
        equity_irr: equity_irr(&aggregated.rows, config.xirr_guess),
        project_irr: project_irr(&aggregated.rows, config.xirr_guess),
        terminal_value_applied: aggregated.terminal_value_applied,
    };

    let summary = DebtSummary {
        asset_id: asset.id,
        asset_name: asset.name.clone(),
        capex: total_capex,
        debt: sizing.debt_amount,
        debt_drawn,
        equity: total_capex - debt_drawn,
        gearing: ratio(debt_drawn, total_capex),
        structure,
        repayment_frequency: frequency,
        grace_period: grace,
        min_dscr: sizing.min_dscr,
        fully_repaid: sizing.fully_repaid,
        sizing_iterations: sizing.iterations,
    };

    tracing::info!(
        asset = %asset.name,
        debt = %summary.debt.round_dp(2),
        gearing = ?summary.gearing.map(|g| g.round_dp(4)),
        equity_irr = ?returns.equity_irr.map(|r| r.round_dp(6)),
        "Asset modelled"
    );

    Ok(AssetResult {
        sizing,
        summary,
        debt_schedule: schedule.entries,
        cash_flows: aggregated.rows,
        returns,
        warnings,
    })
}

/// Equity XIRR over construction and operations rows with nonzero equity
/// cash flow. Same-date flows across assets are summed.
pub fn equity_irr(rows: &[ConsolidatedCashFlow], guess: Rate) -> Option<Rate> {
    let flows: Vec<(NaiveDate, Money)> = rows
        .iter()
        .filter(|r| r.period_type.is_some() && !r.equity_cash_flow.is_zero())
        .map(|r| (r.date, r.equity_cash_flow))
        .collect();
    xirr(&flows, guess)
}

/// Unlevered XIRR on CFADS less capex.
pub fn project_irr(rows: &[ConsolidatedCashFlow], guess: Rate) -> Option<Rate> {
    let flows: Vec<(NaiveDate, Money)> = rows
        .iter()
        .filter(|r| r.period_type.is_some())
        .map(|r| (r.date, r.cfads - r.capex))
        .filter(|(_, amount)| !amount.is_zero())
        .collect();
    xirr(&flows, guess)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ratio(numerator: Money, denominator: Money) -> Option<Rate> {
    if denominator.is_zero() {
        None
    } else {
        Some(numerator / denominator)
    }
}

fn total_debt_summary(rows: &[DebtSummary]) -> DebtSummaryTotal {
    let capex: Money = rows.iter().map(|r| r.capex).sum();
    let debt: Money = rows.iter().map(|r| r.debt).sum();
    let debt_drawn: Money = rows.iter().map(|r| r.debt_drawn).sum();
    DebtSummaryTotal {
        capex,
        debt,
        debt_drawn,
        equity: capex - debt_drawn,
        gearing: ratio(debt_drawn, capex),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
