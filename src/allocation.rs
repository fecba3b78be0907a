/// Multi-placement traffic allocation.
///
/// Given each placement's marginal benefit analysis, reallocate tilt
/// percentages to maximize a goal under global and per-placement
/// constraints. The optimizer is a bounded greedy hill-climb, not a provably
/// optimal solver: a fixed step, a fixed iteration cap, and a transfer
/// fallback when nothing can grow. Worst-case cost is bounded and
/// deterministic.
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::metrics::risk_acos;
use crate::placement_analysis::MarginalBenefitResult;
use crate::performance::PlacementType;

/// Optimization goal for traffic allocation across placements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationGoal {
    MaximizeRoas,
    MinimizeAcos,
    MaximizeSales,
    Balanced,
}

/// Tunable mechanics of the hill-climb (step resolution and iteration cap
/// are tunable constants, not intrinsic to the algorithm)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Tilt points moved per adjustment
    pub step: f64,
    /// Hard cap on hill-climb iterations
    pub max_iterations: usize,
    /// How far past the diminishing point an increase may go
    pub diminishing_headroom: f64,
}

impl AllocatorConfig {
    pub fn new() -> Self {
        Self {
            step: 5.0,
            max_iterations: 20,
            diminishing_headroom: 20.0,
        }
    }

    /// Custom step size and iteration cap, for testing at different resolutions
    pub fn new_advanced(step: f64, max_iterations: usize) -> Self {
        Self {
            step,
            max_iterations,
            diminishing_headroom: 20.0,
        }
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocation constraints; every field optional, resolved against defaults
/// once at entry
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OptimizationConstraints {
    /// Cap on the sum of all tilt percentages (default 400)
    pub max_total_adjustment: Option<f64>,
    /// Per-placement tilt floor (default 0)
    pub min_adjustment_per_placement: Option<f64>,
    /// Per-placement tilt cap (default 200)
    pub max_adjustment_per_placement: Option<f64>,
    /// Cap on projected extra daily spend (default unlimited)
    pub max_spend_increase: Option<f64>,
    pub target_acos: Option<f64>,
    pub target_roas: Option<f64>,
}

/// Constraints with defaults applied
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResolvedConstraints {
    pub max_total_adjustment: f64,
    pub min_adjustment_per_placement: f64,
    pub max_adjustment_per_placement: f64,
    pub max_spend_increase: f64,
    pub target_acos: Option<f64>,
    pub target_roas: Option<f64>,
}

impl OptimizationConstraints {
    /// Fill unset fields with defaults
    pub fn resolve(&self) -> ResolvedConstraints {
        ResolvedConstraints {
            max_total_adjustment: self.max_total_adjustment.unwrap_or(400.0),
            min_adjustment_per_placement: self.min_adjustment_per_placement.unwrap_or(0.0),
            max_adjustment_per_placement: self.max_adjustment_per_placement.unwrap_or(200.0),
            max_spend_increase: self.max_spend_increase.unwrap_or(f64::INFINITY),
            target_acos: self.target_acos,
            target_roas: self.target_roas,
        }
    }
}

/// Trait for per-goal placement scoring strategies
pub trait AllocationScorer {
    /// Score a placement; higher scores receive tilt first
    fn score(&self, benefit: &MarginalBenefitResult) -> f64;

    /// Get the name of this scoring strategy
    fn scorer_name(&self) -> String;
}

/// Scores by marginal ROAS weighted by confidence
pub struct ScoreByMarginalRoas;

impl AllocationScorer for ScoreByMarginalRoas {
    fn score(&self, benefit: &MarginalBenefitResult) -> f64 {
        benefit.marginal_roas * benefit.confidence
    }

    fn scorer_name(&self) -> String {
        "marginal ROAS".to_string()
    }
}

/// Scores by inverted marginal ACoS weighted by confidence
pub struct ScoreByMarginalAcos;

impl AllocationScorer for ScoreByMarginalAcos {
    fn score(&self, benefit: &MarginalBenefitResult) -> f64 {
        (100.0 - benefit.marginal_acos) * benefit.confidence / 100.0
    }

    fn scorer_name(&self) -> String {
        "inverted marginal ACoS".to_string()
    }
}

/// Scores by marginal sales volume weighted by confidence
pub struct ScoreByMarginalSales;

impl AllocationScorer for ScoreByMarginalSales {
    fn score(&self, benefit: &MarginalBenefitResult) -> f64 {
        benefit.marginal_sales * benefit.confidence
    }

    fn scorer_name(&self) -> String {
        "marginal sales".to_string()
    }
}

/// Blend of marginal ROAS and elasticity weighted by confidence
pub struct ScoreBalanced;

impl AllocationScorer for ScoreBalanced {
    fn score(&self, benefit: &MarginalBenefitResult) -> f64 {
        (0.6 * benefit.marginal_roas + 0.4 * benefit.elasticity) * benefit.confidence
    }

    fn scorer_name(&self) -> String {
        "balanced".to_string()
    }
}

/// Scorer for a goal
pub fn scorer_for_goal(goal: AllocationGoal) -> Box<dyn AllocationScorer> {
    match goal {
        AllocationGoal::MaximizeRoas => Box::new(ScoreByMarginalRoas),
        AllocationGoal::MinimizeAcos => Box::new(ScoreByMarginalAcos),
        AllocationGoal::MaximizeSales => Box::new(ScoreByMarginalSales),
        AllocationGoal::Balanced => Box::new(ScoreBalanced),
    }
}

/// Suggested tilt change for one placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementAllocation {
    pub placement_type: PlacementType,
    pub current_adjustment: f64,
    pub suggested_adjustment: f64,
    pub adjustment_delta: f64,
    /// Expected daily sales change from this placement's delta
    pub expected_sales_change: f64,
    /// Expected daily spend change from this placement's delta
    pub expected_spend_change: f64,
    /// The marginal benefit analysis this allocation was based on
    pub marginal_benefit: MarginalBenefitResult,
    pub allocation_reason: String,
}

/// Expected change versus current performance
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImprovementEstimate {
    pub sales_change: f64,
    pub spend_change: f64,
    pub roas_change: f64,
    pub acos_change: f64,
}

/// Combined allocation recommendation across all placements.
/// Constructed fresh per optimization run; never persisted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficAllocationResult {
    pub allocations: Vec<PlacementAllocation>,
    pub total_expected_sales: f64,
    pub total_expected_spend: f64,
    pub expected_roas: f64,
    pub expected_acos: f64,
    pub improvement: ImprovementEstimate,
    pub optimization_goal: AllocationGoal,
    /// Minimum per-placement confidence: the weakest link dominates trust
    /// in the combined recommendation
    pub confidence: f64,
}

/// Current account-level daily performance, baseline for the improvement
/// estimate
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CurrentPerformance {
    pub daily_sales: f64,
    pub daily_spend: f64,
}

/// Optimize tilt allocation across placements.
///
/// # Arguments
/// * `benefits` - one marginal benefit analysis per placement
/// * `baseline` - current daily sales/spend, for the improvement estimate
/// * `goal` - allocation goal selecting the scoring strategy
/// * `constraints` - optional constraints, resolved against defaults
/// * `config` - step size and iteration cap
/// * `logger` - receives per-iteration progress at `Allocation` scope
pub fn optimize_traffic_allocation(
    benefits: &[MarginalBenefitResult],
    baseline: &CurrentPerformance,
    goal: AllocationGoal,
    constraints: &OptimizationConstraints,
    config: &AllocatorConfig,
    logger: &mut Logger,
) -> Result<TrafficAllocationResult> {
    if config.step <= 0.0 {
        return Err(EngineError::InvalidConfig(format!(
            "allocator step must be positive, got {}",
            config.step
        )));
    }
    let resolved = constraints.resolve();
    if resolved.min_adjustment_per_placement > resolved.max_adjustment_per_placement {
        return Err(EngineError::InvalidConfig(
            "min adjustment per placement exceeds max".to_string(),
        ));
    }

    let scorer = scorer_for_goal(goal);
    let scores: Vec<f64> = benefits.iter().map(|b| scorer.score(b)).collect();

    // Rank placements by score, best first
    let mut ranked: Vec<usize> = (0..benefits.len()).collect();
    ranked.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(std::cmp::Ordering::Equal));

    let mut tilts: Vec<f64> = benefits.iter().map(|b| b.current_adjustment).collect();
    let mut transferred_out = vec![false; benefits.len()];

    let step = config.step;
    let can_receive = |idx: usize, tilts: &[f64]| -> bool {
        let b = &benefits[idx];
        tilts[idx] + step <= resolved.max_adjustment_per_placement + 1e-9
            && tilts[idx] + step <= b.diminishing_point + config.diminishing_headroom + 1e-9
            && (b.marginal_roas > 1.0 || goal == AllocationGoal::MaximizeSales)
    };
    let projected_spend = |tilts: &[f64]| -> f64 {
        benefits
            .iter()
            .enumerate()
            .map(|(i, b)| (tilts[i] - b.current_adjustment) * b.marginal_spend)
            .sum()
    };

    for iteration in 0..config.max_iterations {
        let mut changed = false;

        // Grow the best placements first while the global budget allows
        for &idx in &ranked {
            let total: f64 = tilts.iter().sum();
            if total + step > resolved.max_total_adjustment + 1e-9 {
                break;
            }
            if !can_receive(idx, &tilts) {
                continue;
            }
            if projected_spend(&tilts) + step * benefits[idx].marginal_spend
                > resolved.max_spend_increase + 1e-9
            {
                continue;
            }
            tilts[idx] += step;
            changed = true;
        }

        // Nothing could grow: move budget from the weakest placement to the
        // strongest one that can still absorb it
        if !changed {
            let donor = ranked.iter().rev().copied().find(|&i| {
                tilts[i] - step >= resolved.min_adjustment_per_placement - 1e-9
            });
            if let Some(donor) = donor {
                let recipient = ranked.iter().copied().find(|&i| {
                    i != donor
                        && scores[i] > scores[donor]
                        && can_receive(i, &tilts)
                        && projected_spend(&tilts)
                            + step * (benefits[i].marginal_spend - benefits[donor].marginal_spend)
                            <= resolved.max_spend_increase + 1e-9
                });
                if let Some(recipient) = recipient {
                    tilts[donor] -= step;
                    tilts[recipient] += step;
                    transferred_out[donor] = true;
                    changed = true;
                    logln!(
                        logger,
                        LogEvent::Allocation,
                        "iteration {}: transferred {:.0} points from {} to {}",
                        iteration,
                        step,
                        benefits[donor].placement_type.label(),
                        benefits[recipient].placement_type.label()
                    );
                }
            }
        }

        if !changed {
            break;
        }
    }

    // Final clamp to the per-placement bounds
    for tilt in &mut tilts {
        *tilt = tilt.clamp(
            resolved.min_adjustment_per_placement,
            resolved.max_adjustment_per_placement,
        );
    }

    let mut allocations = Vec::with_capacity(benefits.len());
    let mut sales_change_total = 0.0;
    let mut spend_change_total = 0.0;
    for (i, benefit) in benefits.iter().enumerate() {
        let delta = tilts[i] - benefit.current_adjustment;
        let expected_sales_change = delta * benefit.marginal_sales;
        let expected_spend_change = delta * benefit.marginal_spend;
        sales_change_total += expected_sales_change;
        spend_change_total += expected_spend_change;

        let reason = if delta > 0.0 {
            format!(
                "marginal ROAS {:.2}, increasing tilt by {:.0} points",
                benefit.marginal_roas, delta
            )
        } else if delta < 0.0 {
            if transferred_out[i] {
                "transferring budget to a more efficient placement".to_string()
            } else {
                format!(
                    "past diminishing point {:.0}%, reduce tilt",
                    benefit.diminishing_point
                )
            }
        } else if benefit.current_adjustment > benefit.diminishing_point {
            format!(
                "past diminishing point {:.0}%, holding pending stronger signal",
                benefit.diminishing_point
            )
        } else {
            format!("holding at {:.0}% (no profitable adjustment)", tilts[i])
        };

        allocations.push(PlacementAllocation {
            placement_type: benefit.placement_type,
            current_adjustment: benefit.current_adjustment,
            suggested_adjustment: tilts[i],
            adjustment_delta: delta,
            expected_sales_change,
            expected_spend_change,
            marginal_benefit: benefit.clone(),
            allocation_reason: reason,
        });
    }

    let total_expected_sales = baseline.daily_sales + sales_change_total;
    let total_expected_spend = baseline.daily_spend + spend_change_total;
    let expected_roas = if total_expected_spend > 0.0 {
        total_expected_sales / total_expected_spend
    } else {
        0.0
    };
    let expected_acos = risk_acos(total_expected_spend, total_expected_sales);
    let baseline_roas = if baseline.daily_spend > 0.0 {
        baseline.daily_sales / baseline.daily_spend
    } else {
        0.0
    };
    let baseline_acos = risk_acos(baseline.daily_spend, baseline.daily_sales);

    let confidence = benefits
        .iter()
        .map(|b| b.confidence)
        .fold(f64::INFINITY, f64::min);
    let confidence = if confidence.is_finite() { confidence } else { 0.0 };

    logln!(
        logger,
        LogEvent::Allocation,
        "allocation done: {} placements, expected sales change {:+.2}, spend change {:+.2}",
        allocations.len(),
        sales_change_total,
        spend_change_total
    );

    Ok(TrafficAllocationResult {
        allocations,
        total_expected_sales,
        total_expected_spend,
        expected_roas,
        expected_acos,
        improvement: ImprovementEstimate {
            sales_change: sales_change_total,
            spend_change: spend_change_total,
            roas_change: expected_roas - baseline_roas,
            acos_change: expected_acos - baseline_acos,
        },
        optimization_goal: goal,
        confidence,
    })
}

/// Allocation with default constraints and mechanics and no baseline;
/// the improvement estimate then reports pure deltas
pub fn optimize_traffic_allocation_simple(
    benefits: &[MarginalBenefitResult],
    goal: AllocationGoal,
    logger: &mut Logger,
) -> Result<TrafficAllocationResult> {
    optimize_traffic_allocation(
        benefits,
        &CurrentPerformance::default(),
        goal,
        &OptimizationConstraints::default(),
        &AllocatorConfig::new(),
        logger,
    )
}
