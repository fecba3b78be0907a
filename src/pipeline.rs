/// One-call orchestration of a full optimization run for a target.
///
/// Wires the stages together in their natural order: metrics feed the
/// market curve and the placement analyses, the curve feeds the bid search
/// and policy, the analyses feed the allocator, and both outputs pass
/// through the coordinator so simultaneous base-bid and tilt increases are
/// checked exactly once per run. Everything stays pure and synchronous;
/// callers may evaluate many targets in parallel with no ordering
/// dependency.
use serde::{Deserialize, Serialize};

use crate::allocation::{
    optimize_traffic_allocation, AllocationGoal, AllocatorConfig, CurrentPerformance,
    OptimizationConstraints, TrafficAllocationResult,
};
use crate::bid_policy::{calculate_bid_adjustment, BidDecision, BidPolicyConfig};
use crate::bid_search::PerformanceGroupConfig;
use crate::coordinator::{
    calculate_coordinated_adjustment, check_effective_cpc_safety, BiddingStrategy,
    CoordinatedAdjustment, CpcSafetyCheck,
};
use crate::error::Result;
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::market_curve::MarketCurveConfig;
use crate::performance::{BidSample, OptimizationTarget, PlacementSnapshot, PlacementType};
use crate::placement_analysis::{analyze_marginal_benefit, AnalyzerConfig};

/// Stage configurations for one engine run
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EngineConfig {
    pub curve: MarketCurveConfig,
    pub policy: BidPolicyConfig,
    pub analyzer: AnalyzerConfig,
    pub allocator: AllocatorConfig,
    pub allocation_goal: AllocationGoal,
    pub bidding_strategy: BiddingStrategy,
    /// Allowed effective-CPC increase per run before damping kicks in
    pub max_cpc_increase_percent: f64,
    /// Buffer for the worst-case CPC safety check
    pub cpc_safety_buffer_percent: f64,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            curve: MarketCurveConfig::default(),
            policy: BidPolicyConfig::default(),
            analyzer: AnalyzerConfig::default(),
            allocator: AllocatorConfig::default(),
            allocation_goal: AllocationGoal::Balanced,
            bidding_strategy: BiddingStrategy::Fixed,
            max_cpc_increase_percent: 15.0,
            cpc_safety_buffer_percent: 10.0,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Coordination findings for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationReport {
    /// Anti-compounding check over the proposed tilt changes; `None` when
    /// no allocation was produced
    pub adjustment: Option<CoordinatedAdjustment>,
    /// Worst-case CPC check per placement at its suggested (or current) tilt
    pub safety_checks: Vec<(PlacementType, CpcSafetyCheck)>,
}

/// Combined decision record for one target.
/// The engine hands this to the external apply/persistence collaborator;
/// nothing in here has been written anywhere yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationDecision {
    pub target_id: String,
    /// `None` when the target failed the data-sufficiency gate
    pub bid: Option<BidDecision>,
    /// `None` when no placement snapshots were supplied
    pub allocation: Option<TrafficAllocationResult>,
    pub coordination: CoordinationReport,
    /// All warnings surfaced during the run, for the audit log
    pub warnings: Vec<String>,
}

/// Daily baseline across the supplied placement histories, used for the
/// allocator's improvement estimate
fn placement_baseline(placements: &[PlacementSnapshot]) -> CurrentPerformance {
    let mut daily_sales = 0.0;
    let mut daily_spend = 0.0;
    for snapshot in placements {
        let days = snapshot.history.len();
        if days == 0 {
            continue;
        }
        daily_sales += snapshot.history.iter().map(|p| p.sales).sum::<f64>() / days as f64;
        daily_spend += snapshot.history.iter().map(|p| p.spend).sum::<f64>() / days as f64;
    }
    CurrentPerformance {
        daily_sales,
        daily_spend,
    }
}

/// Run a full optimization pass for one target.
///
/// # Arguments
/// * `target` - performance snapshot for the keyword/ASIN
/// * `samples` - optional historical bid/impression observations
/// * `placements` - current tilt and history per placement; may be empty
/// * `group` - per-group bid goal and thresholds
/// * `constraints` - allocation constraints, resolved against defaults
/// * `config` - stage configurations
/// * `logger` - receives the full rationale trail
pub fn optimize_target(
    target: &OptimizationTarget,
    samples: &[BidSample],
    placements: &[PlacementSnapshot],
    group: &PerformanceGroupConfig,
    constraints: &OptimizationConstraints,
    config: &EngineConfig,
    logger: &mut Logger,
) -> Result<OptimizationDecision> {
    let mut warnings = Vec::new();

    let bid = calculate_bid_adjustment(
        target,
        samples,
        group,
        &config.policy,
        &config.curve,
        logger,
    )?;

    let allocation = if placements.is_empty() {
        None
    } else {
        let benefits: Vec<_> = placements
            .iter()
            .map(|snapshot| analyze_marginal_benefit(snapshot, &config.analyzer, logger))
            .collect();
        let baseline = placement_baseline(placements);
        Some(optimize_traffic_allocation(
            &benefits,
            &baseline,
            config.allocation_goal,
            constraints,
            &config.allocator,
            logger,
        )?)
    };

    // Coordination: the bid the account will actually run with
    let base_bid = bid
        .as_ref()
        .map(|d| d.new_bid)
        .unwrap_or(target.current_bid);

    let adjustment = allocation.as_ref().map(|result| {
        let current_tilts: Vec<(PlacementType, f64)> = result
            .allocations
            .iter()
            .map(|a| (a.placement_type, a.current_adjustment))
            .collect();
        let proposed_tilts: Vec<(PlacementType, f64)> = result
            .allocations
            .iter()
            .map(|a| (a.placement_type, a.suggested_adjustment))
            .collect();
        calculate_coordinated_adjustment(
            base_bid,
            &current_tilts,
            &proposed_tilts,
            config.max_cpc_increase_percent,
            logger,
        )
    });
    if let Some(warning) = adjustment.as_ref().and_then(|a| a.warning.clone()) {
        warnings.push(warning);
    }

    let mut safety_checks = Vec::new();
    let tilts_to_check: Vec<(PlacementType, f64)> = match &allocation {
        Some(result) => result
            .allocations
            .iter()
            .map(|a| (a.placement_type, a.suggested_adjustment))
            .collect(),
        None => placements
            .iter()
            .map(|s| (s.placement_type, s.current_adjustment))
            .collect(),
    };
    for (placement, tilt) in tilts_to_check {
        let check = check_effective_cpc_safety(
            base_bid,
            tilt,
            config.bidding_strategy,
            config.cpc_safety_buffer_percent,
            logger,
        );
        if let Some(warning) = &check.warning {
            warnings.push(warning.clone());
        }
        safety_checks.push((placement, check));
    }

    logln!(
        logger,
        LogEvent::Batch,
        "{}: bid {}, {} placement allocations, {} warnings",
        target.id,
        bid.as_ref()
            .map(|d| format!("${:.2} -> ${:.2}", d.current_bid, d.new_bid))
            .unwrap_or_else(|| "skipped (insufficient data)".to_string()),
        allocation.as_ref().map(|a| a.allocations.len()).unwrap_or(0),
        warnings.len()
    );

    Ok(OptimizationDecision {
        target_id: target.id.clone(),
        bid,
        allocation,
        coordination: CoordinationReport {
            adjustment,
            safety_checks,
        },
        warnings,
    })
}
