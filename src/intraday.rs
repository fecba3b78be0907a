/// Intraday (hour-of-day) bid adjustment.
///
/// Hours that convert better than the daily average deserve a higher bid;
/// hours that convert worse deserve a lower one. The multiplier is the
/// hour's relative ROAS deviation, clamped to a band so a single hot hour
/// cannot swing bids wildly.
use serde::{Deserialize, Serialize};

use crate::performance::HourlyDataPoint;

/// Configuration for intraday adjustment
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntradayConfig {
    /// Clamp band for the multiplier, in percent
    pub max_adjustment_percent: f64,
}

impl IntradayConfig {
    pub fn new() -> Self {
        Self {
            max_adjustment_percent: 30.0,
        }
    }
}

impl Default for IntradayConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Bid multiplier in percent for one hour of the day.
///
/// # Arguments
/// * `hourly` - hourly aggregates; multiple rows for the same hour are summed
/// * `target_hour` - hour of day, 0..=23
///
/// # Returns
/// Percent adjustment clamped to `+-max_adjustment_percent`; 0 when the
/// target hour has no data or the average ROAS is degenerate.
pub fn calculate_intraday_adjustment(
    hourly: &[HourlyDataPoint],
    target_hour: u8,
    config: &IntradayConfig,
) -> f64 {
    // Aggregate counters per hour
    let mut spend = [0.0f64; 24];
    let mut sales = [0.0f64; 24];
    let mut seen = [false; 24];
    for point in hourly {
        let hour = point.hour as usize;
        if hour >= 24 {
            continue;
        }
        spend[hour] += point.spend;
        sales[hour] += point.sales;
        seen[hour] = true;
    }

    let target = target_hour as usize;
    if target >= 24 || !seen[target] {
        return 0.0;
    }

    let hour_roas = |h: usize| -> f64 {
        if spend[h] > 0.0 {
            sales[h] / spend[h]
        } else {
            0.0
        }
    };

    let hours_with_data = seen.iter().filter(|&&s| s).count();
    let average_roas: f64 = (0..24)
        .filter(|&h| seen[h])
        .map(hour_roas)
        .sum::<f64>()
        / hours_with_data as f64;
    if average_roas <= 0.0 {
        return 0.0;
    }

    let deviation = (hour_roas(target) - average_roas) / average_roas;
    (deviation * 100.0).clamp(
        -config.max_adjustment_percent,
        config.max_adjustment_percent,
    )
}
