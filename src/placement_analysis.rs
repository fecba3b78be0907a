/// Per-placement marginal benefit analysis.
///
/// For one placement's rolling window of daily aggregates, estimate what an
/// extra point of tilt would buy: marginal sales and spend, marginal
/// ROAS/ACoS, a coarse elasticity, the tilt level where returns start to
/// fall off, a suggested tilt range, and a confidence score.
///
/// The sensitivity constants here are empirical calibration values carried
/// for behavioral parity; they should eventually be refit by regression
/// against held-out data.
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::logger::{LogEvent, Logger};
use crate::metrics::risk_acos;
use crate::performance::{PlacementDataPoint, PlacementSnapshot, PlacementType};
use crate::warnln;

/// Configuration for placement analysis
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Rolling window length in days
    pub window_days: i64,
    /// Minimum data points before the analysis is considered reliable
    pub min_data_points: usize,
    /// Fraction of daily volume one tilt point is assumed to move
    pub flow_sensitivity: f64,
    /// Floor of the conversion-retention factor
    pub retention_floor: f64,
    /// Conversion-retention decrease per tilt point (extra traffic converts worse)
    pub retention_decay: f64,
    /// CPC inflation per tilt point (extra traffic costs more per click)
    pub cpc_inflation: f64,
    /// Assumed tilt delta behind the elasticity finite difference
    pub assumed_tilt_delta: f64,
}

impl AnalyzerConfig {
    pub fn new() -> Self {
        Self {
            window_days: 30,
            min_data_points: 7,
            flow_sensitivity: 0.008,
            retention_floor: 0.7,
            retention_decay: 0.001,
            cpc_inflation: 0.002,
            assumed_tilt_delta: 0.1,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Marginal benefit estimate for one placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginalBenefitResult {
    pub placement_type: PlacementType,
    /// Tilt percentage at analysis time
    pub current_adjustment: f64,
    pub marginal_roas: f64,
    pub marginal_acos: f64,
    /// Expected daily sales change per tilt point
    pub marginal_sales: f64,
    /// Expected daily spend change per tilt point
    pub marginal_spend: f64,
    pub elasticity: f64,
    /// Tilt level beyond which marginal benefit drops sharply, 0..=200
    pub diminishing_point: f64,
    /// Suggested tilt range, min <= max, both in 0..=200
    pub optimal_range: (f64, f64),
    /// Reliability of this analysis, 0..=1
    pub confidence: f64,
    /// Number of data points inside the rolling window
    pub data_points: usize,
}

/// Marginal sales/spend estimate at a given tilt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginalMetrics {
    pub marginal_sales: f64,
    pub marginal_spend: f64,
    pub marginal_roas: f64,
    pub marginal_acos: f64,
}

/// Estimate marginal sales and spend per tilt point at the current tilt.
///
/// Two corrective multipliers shape the estimate: conversion retention
/// decreases with tilt (extra traffic converts worse, floored), and CPC
/// inflation increases with tilt (extra traffic costs more per click). Both
/// make the marginal ROAS monotonically non-increasing in tilt.
pub fn calculate_marginal_metrics(
    points: &[PlacementDataPoint],
    current_tilt: f64,
    config: &AnalyzerConfig,
) -> MarginalMetrics {
    let n = points.len().max(1) as f64;
    let total_sales: f64 = points.iter().map(|p| p.sales).sum();
    let total_spend: f64 = points.iter().map(|p| p.spend).sum();
    let avg_daily_sales = total_sales / n;
    let avg_daily_spend = total_spend / n;

    let retention = (1.0 - config.retention_decay * current_tilt).max(config.retention_floor);
    let inflation = 1.0 + config.cpc_inflation * current_tilt;

    let marginal_sales = avg_daily_sales * config.flow_sensitivity * retention;
    let marginal_spend = avg_daily_spend * config.flow_sensitivity * inflation;

    let marginal_roas = if marginal_spend > 0.0 {
        marginal_sales / marginal_spend
    } else {
        0.0
    };
    let marginal_acos = risk_acos(marginal_spend, marginal_sales);

    MarginalMetrics {
        marginal_sales,
        marginal_spend,
        marginal_roas,
        marginal_acos,
    }
}

/// Coarse elasticity proxy: relative sales change between the older and the
/// more recent half of the window, divided by the assumed tilt delta.
///
/// A finite difference, not a regression; it only signals direction and
/// rough magnitude.
pub fn calculate_elasticity(points: &[PlacementDataPoint], config: &AnalyzerConfig) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut sorted: Vec<&PlacementDataPoint> = points.iter().collect();
    sorted.sort_by_key(|p| p.date);
    let half = sorted.len() / 2;
    let older_sales: f64 = sorted[..half].iter().map(|p| p.sales).sum();
    let recent_sales: f64 = sorted[half..].iter().map(|p| p.sales).sum();
    if older_sales <= 0.0 {
        return 0.0;
    }
    (recent_sales - older_sales) / older_sales / config.assumed_tilt_delta
}

/// Tilt level where returns start to fall off, mapped from baseline ROAS.
/// Higher baseline efficiency implies the placement can absorb more tilt.
pub fn diminishing_point_for_roas(avg_roas: f64) -> f64 {
    if avg_roas >= 5.0 {
        100.0
    } else if avg_roas >= 3.0 {
        70.0
    } else if avg_roas >= 1.5 {
        50.0
    } else {
        30.0
    }
}

/// Suggested tilt range given the marginal ROAS at the current tilt.
/// Always returns `min <= max`, both within `[0, 200]`.
pub fn calculate_optimal_range(
    marginal_roas: f64,
    current_tilt: f64,
    diminishing_point: f64,
) -> (f64, f64) {
    let current = current_tilt.clamp(0.0, 200.0);
    if marginal_roas > 1.5 {
        // Strong marginal return: widen upward toward the diminishing point
        let max = (diminishing_point + 20.0).clamp(0.0, 200.0);
        let min = current.min(max);
        (min, max)
    } else if marginal_roas > 1.0 {
        // Roughly break-even at the margin: hold around the current tilt
        let min = (current - 20.0).max(0.0);
        let max = (current + 20.0).min(200.0);
        (min, max)
    } else {
        // Losing at the margin: cap the range below the current tilt
        let max = current;
        let min = (current - 30.0).max(0.0);
        (min, max)
    }
}

/// Confidence score for an analysis window.
///
/// Starts at 0.3 and climbs with data-point count, order count and click
/// count; monotonically non-decreasing in each, capped at 1.0.
pub fn calculate_analysis_confidence(data_points: usize, orders: u64, clicks: u64) -> f64 {
    let mut confidence: f64 = 0.3;
    if data_points >= 30 {
        confidence += 0.2;
    } else if data_points >= 14 {
        confidence += 0.1;
    }
    if orders >= 50 {
        confidence += 0.3;
    } else if orders >= 20 {
        confidence += 0.2;
    } else if orders >= 10 {
        confidence += 0.1;
    }
    if clicks >= 500 {
        confidence += 0.2;
    } else if clicks >= 200 {
        confidence += 0.1;
    }
    confidence.min(1.0)
}

/// Analyze one placement's marginal benefit at its current tilt.
///
/// # Arguments
/// * `snapshot` - placement type, current tilt and daily history
/// * `config` - window and sensitivity parameters
/// * `logger` - receives a warning at `Allocation` scope when the window is
///   too thin to trust
///
/// # Returns
/// With fewer than `min_data_points` points in the window, a default result
/// (`marginal_roas = 1.0`, `marginal_acos = 100`, `confidence = 0.2`)
/// signaling "unreliable" — never an error.
pub fn analyze_marginal_benefit(
    snapshot: &PlacementSnapshot,
    config: &AnalyzerConfig,
    logger: &mut Logger,
) -> MarginalBenefitResult {
    let current = snapshot.current_adjustment;

    // Rolling window relative to the most recent observation
    let window: Vec<PlacementDataPoint> = match snapshot.history.iter().map(|p| p.date).max() {
        Some(latest) => {
            let cutoff = latest - Duration::days(config.window_days);
            snapshot
                .history
                .iter()
                .copied()
                .filter(|p| p.date > cutoff)
                .collect()
        }
        None => Vec::new(),
    };

    if window.len() < config.min_data_points {
        warnln!(
            logger,
            LogEvent::Allocation,
            "{}: only {} data points in window (minimum {}), returning low-confidence default",
            snapshot.placement_type.label(),
            window.len(),
            config.min_data_points
        );
        return MarginalBenefitResult {
            placement_type: snapshot.placement_type,
            current_adjustment: current,
            marginal_roas: 1.0,
            marginal_acos: 100.0,
            marginal_sales: 0.0,
            marginal_spend: 0.0,
            elasticity: 0.0,
            diminishing_point: 50.0,
            optimal_range: calculate_optimal_range(1.0, current, 50.0),
            confidence: 0.2,
            data_points: window.len(),
        };
    }

    let total_spend: f64 = window.iter().map(|p| p.spend).sum();
    let total_sales: f64 = window.iter().map(|p| p.sales).sum();
    let total_orders: u64 = window.iter().map(|p| p.orders).sum();
    let total_clicks: u64 = window.iter().map(|p| p.clicks).sum();
    let avg_roas = if total_spend > 0.0 {
        total_sales / total_spend
    } else {
        0.0
    };

    let marginal = calculate_marginal_metrics(&window, current, config);
    let elasticity = calculate_elasticity(&window, config);
    let diminishing_point = diminishing_point_for_roas(avg_roas);
    let optimal_range = calculate_optimal_range(marginal.marginal_roas, current, diminishing_point);
    let confidence = calculate_analysis_confidence(window.len(), total_orders, total_clicks);

    MarginalBenefitResult {
        placement_type: snapshot.placement_type,
        current_adjustment: current,
        marginal_roas: marginal.marginal_roas,
        marginal_acos: marginal.marginal_acos,
        marginal_sales: marginal.marginal_sales,
        marginal_spend: marginal.marginal_spend,
        elasticity,
        diminishing_point,
        optimal_range,
        confidence,
        data_points: window.len(),
    }
}
