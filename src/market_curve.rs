/// Market curve construction for one target.
///
/// The curve models the relationship between bid level and expected
/// traffic/spend/sales. Impressions follow a saturating capture function
/// approaching a traffic ceiling (more bid buys more reach, with
/// diminishing returns), while estimated CPC rises with bid so spend grows
/// faster than impressions.
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::metrics::calculate_target_metrics;
use crate::performance::{BidSample, OptimizationTarget};

/// Configuration for market curve generation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketCurveConfig {
    /// Lowest bid level on the curve
    pub min_bid: f64,
    /// Highest bid level on the curve
    pub max_bid: f64,
    /// Number of bid levels between min and max (inclusive)
    pub steps: usize,
    /// Assumed share of the theoretical traffic ceiling the current bid
    /// captures when no historical bid samples are available
    pub capture_rate: f64,
    /// Headroom multiplier over the best observed impressions when
    /// extrapolating the ceiling from historical samples
    pub ceiling_headroom: f64,
    /// Exponent for CPC growth with bid; below 1.0 keeps CPC sublinear in
    /// bid while still making spend grow faster than impressions
    pub cpc_exponent: f64,
}

impl MarketCurveConfig {
    /// Create a curve config over `[min_bid, max_bid]` with default shape parameters
    pub fn new(min_bid: f64, max_bid: f64) -> Self {
        Self {
            min_bid,
            max_bid,
            steps: 20,
            capture_rate: 0.6,
            ceiling_headroom: 1.25,
            cpc_exponent: 0.7,
        }
    }

    /// Create a curve config with custom shape parameters
    ///
    /// # Arguments
    /// * `min_bid` / `max_bid` - bid range covered by the curve
    /// * `steps` - number of bid levels (at least 2)
    /// * `capture_rate` - assumed current capture share without history (0..1)
    /// * `ceiling_headroom` - ceiling multiplier over best observed impressions
    /// * `cpc_exponent` - CPC growth exponent
    pub fn new_advanced(
        min_bid: f64,
        max_bid: f64,
        steps: usize,
        capture_rate: f64,
        ceiling_headroom: f64,
        cpc_exponent: f64,
    ) -> Self {
        Self {
            min_bid,
            max_bid,
            steps,
            capture_rate,
            ceiling_headroom,
            cpc_exponent,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.min_bid < self.max_bid) || self.min_bid <= 0.0 {
            return Err(EngineError::InvalidBidRange {
                min: self.min_bid,
                max: self.max_bid,
            });
        }
        if self.steps < 2 {
            return Err(EngineError::InvalidConfig(format!(
                "curve needs at least 2 steps, got {}",
                self.steps
            )));
        }
        if self.capture_rate <= 0.0 || self.capture_rate >= 1.0 {
            return Err(EngineError::InvalidConfig(format!(
                "capture rate must be in (0, 1), got {}",
                self.capture_rate
            )));
        }
        Ok(())
    }
}

impl Default for MarketCurveConfig {
    fn default() -> Self {
        // Platform bid bounds: $0.02 floor, $10 cap
        Self::new(0.02, 10.0)
    }
}

/// One point on a market curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketCurvePoint {
    pub bid_level: f64,
    pub estimated_impressions: f64,
    pub estimated_clicks: f64,
    pub estimated_conversions: f64,
    pub estimated_spend: f64,
    pub estimated_sales: f64,
    /// Sales change versus the previous point; zero at the first point
    pub marginal_revenue: f64,
    /// Spend change versus the previous point; zero at the first point
    pub marginal_cost: f64,
}

/// Estimate the theoretical traffic ceiling for a target.
///
/// With historical bid samples the ceiling extrapolates above the highest
/// observed impressions; without history the observed impressions are
/// assumed to represent `capture_rate` of the ceiling.
pub fn estimate_traffic_ceiling(
    target: &OptimizationTarget,
    samples: &[BidSample],
    config: &MarketCurveConfig,
) -> f64 {
    let best_observed = samples
        .iter()
        .map(|s| s.impressions)
        .max()
        .unwrap_or(0)
        .max(target.impressions);
    if samples.is_empty() {
        target.impressions as f64 / config.capture_rate
    } else {
        best_observed as f64 * config.ceiling_headroom
    }
}

/// Generate an ordered market curve for one target.
///
/// # Arguments
/// * `target` - performance snapshot at the current bid
/// * `samples` - optional historical `(bid, impressions)` observations
/// * `config` - curve range and shape parameters
/// * `logger` - receives a curve summary at `Curve` scope
///
/// # Returns
/// Points with strictly increasing `bid_level`; `estimated_impressions` and
/// `estimated_spend` are non-decreasing in bid level.
pub fn generate_market_curve(
    target: &OptimizationTarget,
    samples: &[BidSample],
    config: &MarketCurveConfig,
    logger: &mut Logger,
) -> Result<Vec<MarketCurvePoint>> {
    config.validate()?;
    if target.current_bid <= 0.0 {
        return Err(EngineError::InvalidConfig(format!(
            "target {} has non-positive current bid {}",
            target.id, target.current_bid
        )));
    }

    let metrics = calculate_target_metrics(target);
    let ceiling = estimate_traffic_ceiling(target, samples, config);

    // Observed capture share of the ceiling at the current bid; clamped away
    // from 0 and 1 so the half-saturation constant stays finite
    let observed_capture = if ceiling > 0.0 {
        (target.impressions as f64 / ceiling).clamp(0.05, 0.95)
    } else {
        config.capture_rate
    };

    // Half-saturation constant fixed so the capture function reproduces the
    // observed share at the current bid: capture(b) = b / (b + h)
    let half_saturation = target.current_bid * (1.0 - observed_capture) / observed_capture;

    let span = config.max_bid - config.min_bid;
    let step = span / (config.steps - 1) as f64;

    let mut points: Vec<MarketCurvePoint> = Vec::with_capacity(config.steps);
    for i in 0..config.steps {
        let bid_level = config.min_bid + step * i as f64;

        let estimated_impressions = ceiling * bid_level / (bid_level + half_saturation);
        let estimated_clicks = estimated_impressions * metrics.ctr / 100.0;
        let estimated_conversions = estimated_clicks * metrics.cvr / 100.0;
        let estimated_sales = estimated_conversions * metrics.aov;
        // Higher bid raises the realized CPC as well as the click volume
        let estimated_cpc = metrics.cpc * (bid_level / target.current_bid).powf(config.cpc_exponent);
        let estimated_spend = estimated_clicks * estimated_cpc;

        let (marginal_revenue, marginal_cost) = match points.last() {
            Some(prev) => (
                estimated_sales - prev.estimated_sales,
                estimated_spend - prev.estimated_spend,
            ),
            None => (0.0, 0.0),
        };

        points.push(MarketCurvePoint {
            bid_level,
            estimated_impressions,
            estimated_clicks,
            estimated_conversions,
            estimated_spend,
            estimated_sales,
            marginal_revenue,
            marginal_cost,
        });
    }

    logln!(
        logger,
        LogEvent::Curve,
        "curve for {}: ceiling {:.0} impressions, {} points over [{:.2}, {:.2}]",
        target.id,
        ceiling,
        points.len(),
        config.min_bid,
        config.max_bid
    );

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::performance::TargetType;
    use approx::assert_relative_eq;

    fn target() -> OptimizationTarget {
        OptimizationTarget {
            id: "kw-1".to_string(),
            target_type: TargetType::Keyword,
            current_bid: 1.0,
            impressions: 6000,
            clicks: 90,
            spend: 45.0,
            sales: 180.0,
            orders: 6,
        }
    }

    #[test]
    fn test_bid_levels_strictly_increasing() {
        let mut logger = Logger::new();
        let config = MarketCurveConfig::new(0.1, 3.0);
        let curve = generate_market_curve(&target(), &[], &config, &mut logger).unwrap();
        assert_eq!(curve.len(), 20);
        for pair in curve.windows(2) {
            assert!(pair[1].bid_level > pair[0].bid_level);
        }
    }

    #[test]
    fn test_spend_and_impressions_non_decreasing() {
        let mut logger = Logger::new();
        let config = MarketCurveConfig::new(0.1, 5.0);
        let curve = generate_market_curve(&target(), &[], &config, &mut logger).unwrap();
        for pair in curve.windows(2) {
            assert!(pair[1].estimated_impressions >= pair[0].estimated_impressions);
            assert!(pair[1].estimated_spend >= pair[0].estimated_spend);
        }
    }

    #[test]
    fn test_ceiling_without_history_uses_capture_rate() {
        let config = MarketCurveConfig::new(0.1, 3.0);
        let ceiling = estimate_traffic_ceiling(&target(), &[], &config);
        assert_relative_eq!(ceiling, 6000.0 / 0.6);
    }

    #[test]
    fn test_ceiling_with_history_extrapolates_above_best() {
        let config = MarketCurveConfig::new(0.1, 3.0);
        let samples = vec![
            BidSample { bid: 0.8, impressions: 5000 },
            BidSample { bid: 1.2, impressions: 8000 },
        ];
        let ceiling = estimate_traffic_ceiling(&target(), &samples, &config);
        assert_relative_eq!(ceiling, 8000.0 * 1.25);
        assert!(ceiling > 8000.0);
    }

    #[test]
    fn test_current_bid_reproduces_observed_traffic() {
        // With the default capture model, the point at the current bid should
        // estimate roughly the observed impressions
        let mut logger = Logger::new();
        let config = MarketCurveConfig::new_advanced(0.5, 1.5, 21, 0.6, 1.25, 0.7);
        let curve = generate_market_curve(&target(), &[], &config, &mut logger).unwrap();
        let at_current = curve
            .iter()
            .min_by(|a, b| {
                (a.bid_level - 1.0)
                    .abs()
                    .partial_cmp(&(b.bid_level - 1.0).abs())
                    .unwrap()
            })
            .unwrap();
        assert_relative_eq!(at_current.estimated_impressions, 6000.0, max_relative = 0.02);
    }

    #[test]
    fn test_first_point_has_zero_marginals() {
        let mut logger = Logger::new();
        let config = MarketCurveConfig::default();
        let curve = generate_market_curve(&target(), &[], &config, &mut logger).unwrap();
        assert_eq!(curve[0].marginal_revenue, 0.0);
        assert_eq!(curve[0].marginal_cost, 0.0);
        // Later points carry positive marginals for a healthy target
        assert!(curve[1].marginal_revenue > 0.0);
        assert!(curve[1].marginal_cost > 0.0);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut logger = Logger::new();
        let config = MarketCurveConfig::new(2.0, 1.0);
        let err = generate_market_curve(&target(), &[], &config, &mut logger).unwrap_err();
        assert!(matches!(err, EngineError::InvalidBidRange { .. }));
    }

    #[test]
    fn test_curve_invariants_hold_for_random_targets() {
        use rand::{Rng, SeedableRng};
        use rand_distr::{Distribution, LogNormal};

        let mut rng = rand::rngs::StdRng::seed_from_u64(20240517);
        let bid_dist: LogNormal<f64> = LogNormal::new(0.0, 0.6).unwrap();
        let mut logger = Logger::new();

        for round in 0..100 {
            let current_bid: f64 = bid_dist.sample(&mut rng).clamp(0.05, 8.0);
            let impressions: u64 = rng.gen_range(100..50_000);
            let clicks: u64 = rng.gen_range(0..=impressions / 10);
            let orders: u64 = rng.gen_range(0..=clicks / 5 + 1);
            let spend = clicks as f64 * current_bid * rng.gen_range(0.3..1.0);
            let sales = spend * rng.gen_range(0.0..6.0);
            let random_target = OptimizationTarget {
                id: format!("kw-rand-{}", round),
                current_bid,
                impressions,
                clicks,
                spend,
                sales,
                orders,
                ..target()
            };

            let config = MarketCurveConfig::default();
            let curve =
                generate_market_curve(&random_target, &[], &config, &mut logger).unwrap();
            assert_eq!(curve.len(), config.steps);
            for pair in curve.windows(2) {
                assert!(pair[1].bid_level > pair[0].bid_level);
                assert!(pair[1].estimated_impressions >= pair[0].estimated_impressions);
                assert!(pair[1].estimated_spend >= pair[0].estimated_spend - 1e-9);
                assert!(pair[1].estimated_sales >= pair[0].estimated_sales - 1e-9);
            }
        }
    }

    #[test]
    fn test_zero_traffic_target_yields_flat_curve() {
        let mut logger = Logger::new();
        let empty = OptimizationTarget {
            impressions: 0,
            clicks: 0,
            spend: 0.0,
            sales: 0.0,
            orders: 0,
            ..target()
        };
        let config = MarketCurveConfig::default();
        let curve = generate_market_curve(&empty, &[], &config, &mut logger).unwrap();
        for point in &curve {
            assert_eq!(point.estimated_spend, 0.0);
            assert_eq!(point.estimated_sales, 0.0);
        }
    }
}
