/// Optimal bid selection over a market curve.
///
/// Each optimization goal maps to a walk over the curve. The walk is
/// deterministic: the same curve and config always produce the same bid.
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::market_curve::MarketCurvePoint;

/// Optimization goal for per-target bid search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationGoal {
    /// Raise bid while each extra dollar of spend still returns at least a
    /// dollar of sales (marginal revenue >= marginal cost)
    MaximizeSales,
    /// Highest bid whose cumulative ACoS stays within the target
    TargetAcos,
    /// Highest bid whose cumulative ROAS stays at or above the target
    TargetRoas,
    /// Highest bid whose estimated spend stays within the daily limit
    DailySpendLimit,
}

/// Per-group bidding configuration, resolved by the account-settings
/// collaborator before the engine is invoked
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceGroupConfig {
    pub optimization_goal: OptimizationGoal,
    pub target_acos: Option<f64>,
    pub target_roas: Option<f64>,
    pub daily_spend_limit: Option<f64>,
}

impl PerformanceGroupConfig {
    /// Config for pure sales maximization
    pub fn maximize_sales() -> Self {
        Self {
            optimization_goal: OptimizationGoal::MaximizeSales,
            target_acos: None,
            target_roas: None,
            daily_spend_limit: None,
        }
    }

    /// Config targeting a maximum ACoS percentage
    pub fn target_acos(acos: f64) -> Self {
        Self {
            optimization_goal: OptimizationGoal::TargetAcos,
            target_acos: Some(acos),
            target_roas: None,
            daily_spend_limit: None,
        }
    }

    /// Config targeting a minimum ROAS
    pub fn target_roas(roas: f64) -> Self {
        Self {
            optimization_goal: OptimizationGoal::TargetRoas,
            target_acos: None,
            target_roas: Some(roas),
            daily_spend_limit: None,
        }
    }

    /// Config limiting estimated daily spend
    pub fn daily_spend_limit(limit: f64) -> Self {
        Self {
            optimization_goal: OptimizationGoal::DailySpendLimit,
            target_acos: None,
            target_roas: None,
            daily_spend_limit: Some(limit),
        }
    }
}

/// Cumulative ACoS of a single curve point
fn point_acos(point: &MarketCurvePoint) -> f64 {
    if point.estimated_sales > 0.0 {
        point.estimated_spend / point.estimated_sales * 100.0
    } else {
        0.0
    }
}

/// Cumulative ROAS of a single curve point
fn point_roas(point: &MarketCurvePoint) -> f64 {
    if point.estimated_spend > 0.0 {
        point.estimated_sales / point.estimated_spend
    } else {
        0.0
    }
}

/// Find the optimal bid for a goal by walking a market curve.
///
/// # Arguments
/// * `curve` - points with strictly increasing bid levels
/// * `config` - goal and thresholds
///
/// # Returns
/// The chosen bid level. When no point satisfies a threshold-based goal the
/// lowest bid on the curve is returned (conservative fallback). An empty
/// curve is a caller bug and returns `EngineError::EmptyCurve`.
pub fn find_optimal_bid(curve: &[MarketCurvePoint], config: &PerformanceGroupConfig) -> Result<f64> {
    let first = curve.first().ok_or(EngineError::EmptyCurve)?;

    let bid = match config.optimization_goal {
        OptimizationGoal::MaximizeSales => {
            // Walk up while each step still pays for itself; the first point
            // has zero marginals and always qualifies
            let mut best = first.bid_level;
            for point in &curve[1..] {
                if point.marginal_revenue >= point.marginal_cost {
                    best = point.bid_level;
                } else {
                    break;
                }
            }
            best
        }
        OptimizationGoal::TargetAcos => {
            let target = config.target_acos.ok_or_else(|| {
                EngineError::InvalidConfig("target_acos goal requires target_acos".to_string())
            })?;
            highest_satisfying(curve, |p| point_acos(p) <= target)
        }
        OptimizationGoal::TargetRoas => {
            let target = config.target_roas.ok_or_else(|| {
                EngineError::InvalidConfig("target_roas goal requires target_roas".to_string())
            })?;
            highest_satisfying(curve, |p| point_roas(p) >= target)
        }
        OptimizationGoal::DailySpendLimit => {
            let limit = config.daily_spend_limit.ok_or_else(|| {
                EngineError::InvalidConfig(
                    "daily_spend_limit goal requires daily_spend_limit".to_string(),
                )
            })?;
            highest_satisfying(curve, |p| p.estimated_spend <= limit)
        }
    };

    Ok(bid)
}

/// Highest bid whose point satisfies the predicate, falling back to the
/// lowest bid on the curve when nothing qualifies
fn highest_satisfying<F>(curve: &[MarketCurvePoint], predicate: F) -> f64
where
    F: Fn(&MarketCurvePoint) -> bool,
{
    curve
        .iter()
        .rev()
        .find(|p| predicate(p))
        .map(|p| p.bid_level)
        .unwrap_or(curve[0].bid_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Hand-built curve: marginal revenue crosses below marginal cost after
    /// bid 1.5, cumulative ACoS rises with bid
    fn crossover_curve() -> Vec<MarketCurvePoint> {
        let rows = [
            // (bid, spend, sales, mr, mc)
            (0.5, 10.0, 60.0, 0.0, 0.0),
            (1.0, 25.0, 100.0, 40.0, 15.0),
            (1.5, 45.0, 125.0, 25.0, 20.0),
            (2.0, 70.0, 140.0, 15.0, 25.0),
            (2.5, 100.0, 148.0, 8.0, 30.0),
        ];
        rows.iter()
            .map(|&(bid, spend, sales, mr, mc)| MarketCurvePoint {
                bid_level: bid,
                estimated_impressions: bid * 1000.0,
                estimated_clicks: bid * 20.0,
                estimated_conversions: bid * 2.0,
                estimated_spend: spend,
                estimated_sales: sales,
                marginal_revenue: mr,
                marginal_cost: mc,
            })
            .collect()
    }

    #[test]
    fn test_maximize_sales_stops_at_crossover() {
        let curve = crossover_curve();
        let bid = find_optimal_bid(&curve, &PerformanceGroupConfig::maximize_sales()).unwrap();
        assert_relative_eq!(bid, 1.5);
    }

    #[test]
    fn test_target_acos_returns_highest_within_target() {
        let curve = crossover_curve();
        // ACoS per point: 16.7, 25, 36, 50, 67.6
        let bid = find_optimal_bid(&curve, &PerformanceGroupConfig::target_acos(40.0)).unwrap();
        assert_relative_eq!(bid, 1.5);
        let bid = find_optimal_bid(&curve, &PerformanceGroupConfig::target_acos(60.0)).unwrap();
        assert_relative_eq!(bid, 2.0);
    }

    #[test]
    fn test_target_roas_returns_highest_at_or_above() {
        let curve = crossover_curve();
        // ROAS per point: 6.0, 4.0, 2.78, 2.0, 1.48
        let bid = find_optimal_bid(&curve, &PerformanceGroupConfig::target_roas(2.5)).unwrap();
        assert_relative_eq!(bid, 1.5);
    }

    #[test]
    fn test_daily_spend_limit() {
        let curve = crossover_curve();
        let bid = find_optimal_bid(&curve, &PerformanceGroupConfig::daily_spend_limit(50.0)).unwrap();
        assert_relative_eq!(bid, 1.5);
    }

    #[test]
    fn test_unsatisfiable_threshold_falls_back_to_lowest_bid() {
        let curve = crossover_curve();
        let bid = find_optimal_bid(&curve, &PerformanceGroupConfig::target_acos(1.0)).unwrap();
        assert_relative_eq!(bid, 0.5);
        let bid = find_optimal_bid(&curve, &PerformanceGroupConfig::daily_spend_limit(5.0)).unwrap();
        assert_relative_eq!(bid, 0.5);
    }

    #[test]
    fn test_determinism() {
        let curve = crossover_curve();
        let config = PerformanceGroupConfig::target_roas(2.5);
        let a = find_optimal_bid(&curve, &config).unwrap();
        let b = find_optimal_bid(&curve, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_curve_is_an_error() {
        let err = find_optimal_bid(&[], &PerformanceGroupConfig::maximize_sales()).unwrap_err();
        assert!(matches!(err, crate::error::EngineError::EmptyCurve));
    }

    #[test]
    fn test_missing_threshold_is_invalid_config() {
        let curve = crossover_curve();
        let config = PerformanceGroupConfig {
            optimization_goal: OptimizationGoal::TargetAcos,
            target_acos: None,
            target_roas: None,
            daily_spend_limit: None,
        };
        let err = find_optimal_bid(&curve, &config).unwrap_err();
        assert!(matches!(err, crate::error::EngineError::InvalidConfig(_)));
    }
}
