/// Bid adjustment policy: turns a raw optimal bid into a safe, auditable
/// decision.
///
/// The policy generates a fresh market curve, searches it for the goal's
/// optimal bid, then clamps the change to at most a fraction of the current
/// bid per call and to the platform bid bounds. The returned decision
/// carries both the raw and the final recommendation so callers can audit
/// every clamp without parsing the rationale string.
use serde::{Deserialize, Serialize};

use crate::bid_search::{find_optimal_bid, OptimizationGoal, PerformanceGroupConfig};
use crate::error::Result;
use crate::logger::{LogEvent, Logger};
use crate::market_curve::{generate_market_curve, MarketCurveConfig};
use crate::metrics::calculate_target_metrics;
use crate::performance::{BidSample, OptimizationTarget};
use crate::{logln, warnln};

/// Safety bounds and data-sufficiency thresholds for bid adjustments
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BidPolicyConfig {
    /// Platform bid floor
    pub min_bid: f64,
    /// Platform bid cap
    pub max_bid: f64,
    /// Maximum relative change per call (0.25 = +-25%)
    pub max_change_fraction: f64,
    /// Minimum impressions before any adjustment is attempted
    pub min_impressions: u64,
    /// Minimum clicks before any adjustment is attempted
    pub min_clicks: u64,
}

impl BidPolicyConfig {
    /// Create a policy with platform defaults ($0.02 floor, $10 cap, +-25% per call)
    pub fn new() -> Self {
        Self {
            min_bid: 0.02,
            max_bid: 10.0,
            max_change_fraction: 0.25,
            min_impressions: 100,
            min_clicks: 3,
        }
    }

    /// Create a policy with custom bounds
    ///
    /// # Arguments
    /// * `min_bid` / `max_bid` - platform bid bounds
    /// * `max_change_fraction` - maximum relative change per call
    /// * `min_impressions` / `min_clicks` - data-sufficiency gate
    pub fn new_advanced(
        min_bid: f64,
        max_bid: f64,
        max_change_fraction: f64,
        min_impressions: u64,
        min_clicks: u64,
    ) -> Self {
        Self {
            min_bid,
            max_bid,
            max_change_fraction,
            min_impressions,
            min_clicks,
        }
    }
}

impl Default for BidPolicyConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// One bid decision: the raw recommendation, the final clamped bid, and a
/// human-readable reason referencing the goal and the driving metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidDecision {
    pub target_id: String,
    pub current_bid: f64,
    /// Bid the curve search recommended, before any clamping
    pub raw_bid: f64,
    /// Final bid after the per-call change clamp and platform bounds
    pub new_bid: f64,
    /// True when `new_bid` differs from `raw_bid`
    pub clamped: bool,
    pub reason: String,
}

/// Compute a bid adjustment for one target.
///
/// # Arguments
/// * `target` - performance snapshot
/// * `samples` - optional historical bid/impression observations
/// * `group` - optimization goal and thresholds
/// * `policy` - clamp bounds and sufficiency gate
/// * `curve` - curve shape parameters; the bid range is taken from `policy`
/// * `logger` - receives gate and clamp messages at `Target` scope
///
/// # Returns
/// `None` when the target fails the data-sufficiency gate; statistically
/// meaningless samples must not move bids. Note that the platform bounds
/// dominate the per-call change clamp, so a current bid outside
/// `[min_bid, max_bid]` is pulled back inside even when that exceeds the
/// per-call fraction.
pub fn calculate_bid_adjustment(
    target: &OptimizationTarget,
    samples: &[BidSample],
    group: &PerformanceGroupConfig,
    policy: &BidPolicyConfig,
    curve: &MarketCurveConfig,
    logger: &mut Logger,
) -> Result<Option<BidDecision>> {
    if target.impressions < policy.min_impressions || target.clicks < policy.min_clicks {
        logln!(
            logger,
            LogEvent::Target,
            "{}: insufficient data ({} impressions, {} clicks), no adjustment",
            target.id,
            target.impressions,
            target.clicks
        );
        return Ok(None);
    }

    let curve_config = MarketCurveConfig {
        min_bid: policy.min_bid,
        max_bid: policy.max_bid,
        ..*curve
    };
    let points = generate_market_curve(target, samples, &curve_config, logger)?;
    let raw_bid = find_optimal_bid(&points, group)?;

    // Pull the whole per-call band inside the platform bounds before
    // clamping; a current bid outside the bounds would otherwise invert the
    // band and the bounds must win regardless
    let lower = (target.current_bid * (1.0 - policy.max_change_fraction))
        .clamp(policy.min_bid, policy.max_bid);
    let upper = (target.current_bid * (1.0 + policy.max_change_fraction))
        .clamp(policy.min_bid, policy.max_bid);
    let new_bid = raw_bid.clamp(lower, upper);
    let clamped = (new_bid - raw_bid).abs() > f64::EPSILON;

    let metrics = calculate_target_metrics(target);
    let mut reason = match group.optimization_goal {
        OptimizationGoal::MaximizeSales => format!(
            "maximize sales: marginal revenue covers marginal cost up to ${:.2}",
            raw_bid
        ),
        OptimizationGoal::TargetAcos => format!(
            "target ACoS {:.1}% (current {:.1}%): best qualifying bid ${:.2}",
            group.target_acos.unwrap_or_default(),
            metrics.acos,
            raw_bid
        ),
        OptimizationGoal::TargetRoas => format!(
            "target ROAS {:.2} (current {:.2}): best qualifying bid ${:.2}",
            group.target_roas.unwrap_or_default(),
            metrics.roas,
            raw_bid
        ),
        OptimizationGoal::DailySpendLimit => format!(
            "daily spend limit ${:.2}: best qualifying bid ${:.2}",
            group.daily_spend_limit.unwrap_or_default(),
            raw_bid
        ),
    };
    if clamped {
        reason.push_str(&format!(
            "; clamped to ${:.2} ({:.0}% per-call limit, platform bounds ${:.2}-${:.2})",
            new_bid,
            policy.max_change_fraction * 100.0,
            policy.min_bid,
            policy.max_bid
        ));
        warnln!(
            logger,
            LogEvent::Target,
            "{}: raw bid ${:.2} clamped to ${:.2}",
            target.id,
            raw_bid,
            new_bid
        );
    }

    logln!(
        logger,
        LogEvent::Target,
        "{}: bid ${:.2} -> ${:.2} ({})",
        target.id,
        target.current_bid,
        new_bid,
        reason
    );

    Ok(Some(BidDecision {
        target_id: target.id.clone(),
        current_bid: target.current_bid,
        raw_bid,
        new_bid,
        clamped,
        reason,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::performance::TargetType;

    fn target(current_bid: f64) -> OptimizationTarget {
        OptimizationTarget {
            id: "kw-7".to_string(),
            target_type: TargetType::Keyword,
            current_bid,
            impressions: 8000,
            clicks: 120,
            spend: 60.0,
            sales: 240.0,
            orders: 8,
        }
    }

    fn run(
        target: &OptimizationTarget,
        group: &PerformanceGroupConfig,
        policy: &BidPolicyConfig,
    ) -> Option<BidDecision> {
        let mut logger = Logger::new();
        calculate_bid_adjustment(
            target,
            &[],
            group,
            policy,
            &MarketCurveConfig::default(),
            &mut logger,
        )
        .unwrap()
    }

    #[test]
    fn test_insufficient_impressions_gate() {
        let mut t = target(1.0);
        t.impressions = 50;
        let decision = run(&t, &PerformanceGroupConfig::maximize_sales(), &BidPolicyConfig::new());
        assert!(decision.is_none());
    }

    #[test]
    fn test_insufficient_clicks_gate() {
        let mut t = target(1.0);
        t.clicks = 2;
        let decision = run(&t, &PerformanceGroupConfig::maximize_sales(), &BidPolicyConfig::new());
        assert!(decision.is_none());
    }

    #[test]
    fn test_change_never_exceeds_per_call_fraction() {
        let policy = BidPolicyConfig::new();
        for group in [
            PerformanceGroupConfig::maximize_sales(),
            PerformanceGroupConfig::target_acos(20.0),
            PerformanceGroupConfig::target_roas(3.0),
            PerformanceGroupConfig::daily_spend_limit(40.0),
        ] {
            let t = target(1.0);
            let decision = run(&t, &group, &policy).unwrap();
            assert!(decision.new_bid <= 1.25 + 1e-9, "goal {:?}", group.optimization_goal);
            assert!(decision.new_bid >= 0.75 - 1e-9, "goal {:?}", group.optimization_goal);
            assert!(decision.new_bid >= policy.min_bid);
            assert!(decision.new_bid <= policy.max_bid);
        }
    }

    #[test]
    fn test_clamp_is_exposed_in_decision() {
        // A very strict ACoS target pushes the raw bid to the curve floor,
        // far below -25% of the current bid
        let decision = run(
            &target(1.0),
            &PerformanceGroupConfig::target_acos(0.5),
            &BidPolicyConfig::new(),
        )
        .unwrap();
        assert!(decision.clamped);
        assert!(decision.raw_bid < decision.new_bid);
        assert!(decision.reason.contains("clamped"));
    }

    #[test]
    fn test_decision_respects_platform_bounds() {
        let policy = BidPolicyConfig::new_advanced(0.02, 2.0, 0.25, 100, 3);
        let decision = run(&target(1.9), &PerformanceGroupConfig::maximize_sales(), &policy);
        let decision = decision.unwrap();
        assert!(decision.new_bid <= 2.0);
        assert!(decision.new_bid >= 0.02);
    }

    #[test]
    fn test_current_bid_below_floor_is_pulled_inside() {
        // Per-call band around $0.01 lies entirely below the $0.02 floor;
        // the platform bounds must win without panicking
        let decision = run(
            &target(0.01),
            &PerformanceGroupConfig::maximize_sales(),
            &BidPolicyConfig::new(),
        )
        .unwrap();
        assert_eq!(decision.new_bid, 0.02);
    }

    #[test]
    fn test_current_bid_above_cap_is_pulled_inside() {
        // -25% of $14.00 is still above the $10.00 cap
        let decision = run(
            &target(14.0),
            &PerformanceGroupConfig::target_acos(0.5),
            &BidPolicyConfig::new(),
        )
        .unwrap();
        assert_eq!(decision.new_bid, 10.0);
    }

    #[test]
    fn test_reason_references_goal_metric() {
        let decision = run(
            &target(1.0),
            &PerformanceGroupConfig::target_roas(3.0),
            &BidPolicyConfig::new(),
        )
        .unwrap();
        assert!(decision.reason.contains("ROAS"));
        assert_eq!(decision.current_bid, 1.0);
    }
}
