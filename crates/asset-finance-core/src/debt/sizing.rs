use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::asset::PeriodCashFlow;
use crate::dates;
use crate::debt::assumptions::DebtStructure;
use crate::debt::blended_target::blended_target;
use crate::time_value::level_payment;
use crate::{types::*, AssetFinanceError, AssetFinanceResult};

/// Absolute tolerance (one monetary unit) for the sizing search and for
/// treating a balance as repaid.
pub const SIZING_TOLERANCE: Money = dec!(1);

/// Iteration cap for the sizing binary search.
pub const MAX_SIZING_ITERATIONS: u32 = 50;

// ---------------------------------------------------------------------------
// Sizing buckets
// ---------------------------------------------------------------------------

/// Length of the periods the DSCR constraint is tested on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DscrFrequency {
    #[default]
    Annual,
    Quarterly,
}

impl DscrFrequency {
    pub fn months_per_bucket(self) -> u32 {
        match self {
            DscrFrequency::Annual => 12,
            DscrFrequency::Quarterly => 3,
        }
    }

    pub fn buckets_per_year(self) -> u32 {
        12 / self.months_per_bucket()
    }
}

/// Monthly cash flows rolled up into sizing periods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SizingBuckets {
    pub cash_flows: Vec<Money>,
    pub targets: Vec<Multiple>,
}

/// Group monthly cash flows into buckets of `months_per_bucket` months
/// anchored at `service_start`. Months before the anchor are ignored and
/// gaps inside the range count as zero cash flow. Each bucket's DSCR target
/// is blended from the bucket's summed contracted and merchant revenue.
pub fn build_buckets(
    periods: &[PeriodCashFlow],
    service_start: NaiveDate,
    months_per_bucket: u32,
    target_contract: Multiple,
    target_merchant: Multiple,
) -> SizingBuckets {
    let anchor = dates::month_start(service_start);
    let width = months_per_bucket.max(1) as usize;

    // (cfads, contracted, merchant) per bucket
    let mut sums: Vec<(Money, Money, Money)> = Vec::new();
    for period in periods {
        let offset = dates::months_between(anchor, dates::month_start(period.date));
        if offset < 0 {
            continue;
        }
        let idx = offset as usize / width;
        if sums.len() <= idx {
            sums.resize(idx + 1, (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO));
        }
        let bucket = &mut sums[idx];
        bucket.0 += period.cfads();
        bucket.1 += period.contracted_revenue;
        bucket.2 += period.merchant_revenue;
    }

    SizingBuckets {
        cash_flows: sums.iter().map(|(cfads, _, _)| *cfads).collect(),
        targets: sums
            .iter()
            .map(|(_, c, m)| blended_target(*c, *m, target_contract, target_merchant))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingRequest {
    /// Total capex to be funded
    pub capex: Money,
    /// CFADS per sizing period, starting at the debt-service start
    pub cash_flows: Vec<Money>,
    /// Minimum DSCR per sizing period
    pub dscr_targets: Vec<Multiple>,
    pub max_gearing: Rate,
    /// Interest rate per sizing period
    pub period_rate: Rate,
    /// Number of sizing periods in the tenor
    pub tenor_periods: u32,
    pub structure: DebtStructure,
}

/// One period of a sizing simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingPeriod {
    pub period: u32,
    pub opening_balance: Money,
    pub interest: Money,
    pub principal: Money,
    pub closing_balance: Money,
    pub cfads: Money,
    pub target_dscr: Multiple,
    pub dscr: Option<Multiple>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SculptedSimulation {
    pub periods: Vec<SizingPeriod>,
    pub final_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtSizingResult {
    pub debt_amount: Money,
    /// Debt / capex actually achieved
    pub gearing: Rate,
    pub structure: DebtStructure,
    pub schedule: Vec<SizingPeriod>,
    pub fully_repaid: bool,
    pub min_dscr: Option<Multiple>,
    pub final_balance: Money,
    pub iterations: u32,
}

impl DebtSizingResult {
    fn zero(structure: DebtStructure) -> Self {
        Self {
            debt_amount: Decimal::ZERO,
            gearing: Decimal::ZERO,
            structure,
            schedule: Vec::new(),
            fully_repaid: true,
            min_dscr: None,
            final_balance: Decimal::ZERO,
            iterations: 0,
        }
    }

    /// Principal repaid in each sizing period.
    pub fn principal_by_period(&self) -> Vec<Money> {
        self.schedule.iter().map(|p| p.principal).collect()
    }
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Run a sculpted repayment of `debt` against the given cash flows.
///
/// Each period: interest = opening × rate, allowable debt service =
/// CFADS / target (zero when the target is not positive), principal =
/// allowable − interest clamped to `[0, balance]`. Runs for the shorter of
/// the tenor and the cash-flow series.
pub fn simulate_sculpted(
    debt: Money,
    cash_flows: &[Money],
    targets: &[Multiple],
    period_rate: Rate,
    tenor_periods: u32,
) -> SculptedSimulation {
    let mut balance = debt;
    let n = (tenor_periods as usize).min(cash_flows.len());
    let mut periods = Vec::with_capacity(n);

    for (i, cfads) in cash_flows.iter().take(n).enumerate() {
        let target = targets.get(i).copied().unwrap_or(Decimal::ZERO);
        let opening = balance;
        let interest = opening * period_rate;
        let allowable = if target > Decimal::ZERO {
            *cfads / target
        } else {
            Decimal::ZERO
        };
        let principal = (allowable - interest).max(Decimal::ZERO).min(opening);
        balance = opening - principal;

        periods.push(SizingPeriod {
            period: i as u32 + 1,
            opening_balance: opening,
            interest,
            principal,
            closing_balance: balance,
            cfads: *cfads,
            target_dscr: target,
            dscr: coverage(*cfads, interest + principal),
        });
    }

    SculptedSimulation {
        periods,
        final_balance: balance,
    }
}

/// Size the debt for one asset.
///
/// Sculpting searches `[0, capex × max_gearing]` for the largest amount the
/// cash flows repay within the tenor at the target DSCRs; the gearing cap is
/// tried first. Annuity debt is simply `capex × max_gearing`.
pub fn size(request: &SizingRequest) -> AssetFinanceResult<DebtSizingResult> {
    validate_request(request)?;

    if request.capex <= Decimal::ZERO || request.cash_flows.is_empty() {
        tracing::warn!(
            capex = %request.capex,
            periods = request.cash_flows.len(),
            "No capex or no operating cash flows; asset is 100% equity funded"
        );
        return Ok(DebtSizingResult::zero(request.structure));
    }

    match request.structure {
        DebtStructure::Sculpting => size_sculpted(request),
        DebtStructure::Annuity => size_annuity(request),
    }
}

fn size_sculpted(request: &SizingRequest) -> AssetFinanceResult<DebtSizingResult> {
    let simulate = |debt: Money| {
        simulate_sculpted(
            debt,
            &request.cash_flows,
            &request.dscr_targets,
            request.period_rate,
            request.tenor_periods,
        )
    };
    let feasible = |debt: Money| simulate(debt).final_balance <= SIZING_TOLERANCE;

    let upper = request.capex * request.max_gearing;
    let mut iterations = 1;

    let debt = if feasible(upper) {
        upper
    } else {
        let mut lo = Decimal::ZERO;
        let mut hi = upper;
        let mut best = Decimal::ZERO;

        while hi - lo >= SIZING_TOLERANCE {
            if iterations >= MAX_SIZING_ITERATIONS {
                return Err(AssetFinanceError::ConvergenceFailure {
                    function: "Debt sizing binary search".into(),
                    iterations,
                    last_delta: hi - lo,
                });
            }
            iterations += 1;

            let mid = (lo + hi) / dec!(2);
            if feasible(mid) {
                lo = mid;
                best = mid;
            } else {
                hi = mid;
            }
            tracing::debug!(iteration = iterations, lo = %lo, hi = %hi, "Sizing search step");
        }
        best
    };

    let simulation = simulate(debt);
    let min_dscr = simulation.periods.iter().filter_map(|p| p.dscr).min();

    tracing::info!(
        debt = %debt,
        capex = %request.capex,
        iterations,
        "Sculpted debt sized"
    );

    Ok(DebtSizingResult {
        debt_amount: debt,
        gearing: debt / request.capex,
        structure: DebtStructure::Sculpting,
        fully_repaid: simulation.final_balance <= SIZING_TOLERANCE,
        min_dscr,
        final_balance: simulation.final_balance,
        schedule: simulation.periods,
        iterations,
    })
}

fn size_annuity(request: &SizingRequest) -> AssetFinanceResult<DebtSizingResult> {
    let debt = request.capex * request.max_gearing;
    let payment = level_payment(request.period_rate, request.tenor_periods, debt)?;

    let mut balance = debt;
    let mut schedule = Vec::with_capacity(request.tenor_periods as usize);
    for i in 0..request.tenor_periods as usize {
        let opening = balance;
        let interest = opening * request.period_rate;
        let principal = (payment - interest).max(Decimal::ZERO).min(opening);
        balance = opening - principal;

        let cfads = request.cash_flows.get(i).copied().unwrap_or(Decimal::ZERO);
        schedule.push(SizingPeriod {
            period: i as u32 + 1,
            opening_balance: opening,
            interest,
            principal,
            closing_balance: balance,
            cfads,
            target_dscr: request.dscr_targets.get(i).copied().unwrap_or(Decimal::ZERO),
            dscr: coverage(cfads, interest + principal),
        });
    }

    let min_dscr = schedule.iter().filter_map(|p| p.dscr).min();
    tracing::info!(debt = %debt, payment = %payment, "Annuity debt sized");

    Ok(DebtSizingResult {
        debt_amount: debt,
        gearing: request.max_gearing,
        structure: DebtStructure::Annuity,
        fully_repaid: balance <= SIZING_TOLERANCE,
        min_dscr,
        final_balance: balance,
        schedule,
        iterations: 0,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn coverage(cfads: Money, debt_service: Money) -> Option<Multiple> {
    if debt_service.is_zero() {
        None
    } else {
        Some(cfads / debt_service)
    }
}

fn validate_request(request: &SizingRequest) -> AssetFinanceResult<()> {
    if request.max_gearing < Decimal::ZERO || request.max_gearing > Decimal::ONE {
        return Err(AssetFinanceError::invalid(
            "max_gearing",
            format!("Gearing must be between 0 and 1, got {}", request.max_gearing),
        ));
    }
    if request.period_rate < Decimal::ZERO {
        return Err(AssetFinanceError::invalid(
            "period_rate",
            "Interest rate cannot be negative",
        ));
    }
    if request.tenor_periods == 0 {
        return Err(AssetFinanceError::invalid(
            "tenor_periods",
            "Tenor must cover at least one period",
        ));
    }
    if request.cash_flows.len() != request.dscr_targets.len() {
        return Err(AssetFinanceError::invalid(
            "dscr_targets",
            format!(
                "Expected one target per cash flow ({}), got {}",
                request.cash_flows.len(),
                request.dscr_targets.len()
            ),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
