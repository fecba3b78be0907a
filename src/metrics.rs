use serde::{Deserialize, Serialize};

use crate::performance::OptimizationTarget;

/// Sentinel for cost/revenue risk scores when revenue is zero but cost is
/// not: "infinitely bad", but finite so it sorts and serializes cleanly
pub const ACOS_SENTINEL: f64 = 999.0;

/// Metrics derived from raw counters.
///
/// Every ratio is guarded against a zero denominator and defined as 0 in
/// that case, so downstream arithmetic never sees NaN or infinity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Advertising cost of sales, spend/sales*100
    pub acos: f64,
    /// Return on ad spend, sales/spend
    pub roas: f64,
    /// Click-through rate percent, clicks/impressions*100
    pub ctr: f64,
    /// Conversion rate percent, orders/clicks*100
    pub cvr: f64,
    /// Cost per click, spend/clicks
    pub cpc: f64,
    /// Average order value, sales/orders
    pub aov: f64,
}

/// Divide with a defined-zero guard
fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Compute derived metrics from raw counters.
///
/// Pure function, no side effects.
pub fn calculate_metrics(
    impressions: u64,
    clicks: u64,
    spend: f64,
    sales: f64,
    orders: u64,
) -> DerivedMetrics {
    DerivedMetrics {
        acos: safe_ratio(spend, sales) * 100.0,
        roas: safe_ratio(sales, spend),
        ctr: safe_ratio(clicks as f64, impressions as f64) * 100.0,
        cvr: safe_ratio(orders as f64, clicks as f64) * 100.0,
        cpc: safe_ratio(spend, clicks as f64),
        aov: safe_ratio(sales, orders as f64),
    }
}

/// Convenience wrapper over a target snapshot
pub fn calculate_target_metrics(target: &OptimizationTarget) -> DerivedMetrics {
    calculate_metrics(
        target.impressions,
        target.clicks,
        target.spend,
        target.sales,
        target.orders,
    )
}

/// ACoS used as a risk score: zero revenue with non-zero cost is reported
/// as the sentinel rather than 0, so it reads as "infinitely bad" instead
/// of "free"
pub fn risk_acos(spend: f64, sales: f64) -> f64 {
    if sales > 0.0 {
        spend / sales * 100.0
    } else if spend > 0.0 {
        ACOS_SENTINEL
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basic_metrics() {
        let m = calculate_metrics(10_000, 150, 75.0, 300.0, 12);
        assert_relative_eq!(m.acos, 25.0);
        assert_relative_eq!(m.roas, 4.0);
        assert_relative_eq!(m.ctr, 1.5);
        assert_relative_eq!(m.cvr, 8.0);
        assert_relative_eq!(m.cpc, 0.5);
        assert_relative_eq!(m.aov, 25.0);
    }

    #[test]
    fn test_zero_spend_yields_zero_acos_and_roas() {
        let m = calculate_metrics(500, 10, 0.0, 0.0, 0);
        assert_eq!(m.acos, 0.0);
        assert_eq!(m.roas, 0.0);
        assert_eq!(m.cpc, 0.0);
        assert_eq!(m.aov, 0.0);
    }

    #[test]
    fn test_all_zero_counters() {
        let m = calculate_metrics(0, 0, 0.0, 0.0, 0);
        assert_eq!(m.ctr, 0.0);
        assert_eq!(m.cvr, 0.0);
        assert!(m.acos.is_finite());
        assert!(m.roas.is_finite());
    }

    #[test]
    fn test_risk_acos_sentinel() {
        assert_eq!(risk_acos(12.0, 0.0), ACOS_SENTINEL);
        assert_eq!(risk_acos(0.0, 0.0), 0.0);
        assert_relative_eq!(risk_acos(25.0, 100.0), 25.0);
    }
}
