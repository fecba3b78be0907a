/// Input snapshots consumed by the engine.
///
/// Everything in this file is an immutable view of already-aggregated
/// performance counters, produced by the external data-sync collaborator.
/// The engine never mutates a snapshot; it produces fresh decision records
/// instead.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of optimization target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Keyword,
    Asin,
}

/// Ad placement slot types with independent bid multipliers ("tilt")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementType {
    TopOfSearch,
    ProductPage,
    RestOfSearch,
}

impl PlacementType {
    /// Human-readable placement name used in rationale strings
    pub fn label(&self) -> &'static str {
        match self {
            PlacementType::TopOfSearch => "top of search",
            PlacementType::ProductPage => "product page",
            PlacementType::RestOfSearch => "rest of search",
        }
    }
}

/// Performance snapshot for one keyword or product target.
///
/// One snapshot covers whatever aggregation window the caller selected; the
/// engine treats the counters as a single observation at `current_bid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationTarget {
    pub id: String,
    pub target_type: TargetType,
    pub current_bid: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub spend: f64,
    pub sales: f64,
    pub orders: u64,
}

/// Historical observation of impressions obtained at a given bid,
/// used to extrapolate the traffic ceiling of a market curve
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BidSample {
    pub bid: f64,
    pub impressions: u64,
}

/// One day of aggregated counters for a single placement
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlacementDataPoint {
    pub date: NaiveDate,
    pub impressions: u64,
    pub clicks: u64,
    pub spend: f64,
    pub sales: f64,
    pub orders: u64,
}

/// One hour of aggregated counters, for intraday adjustment
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HourlyDataPoint {
    /// Hour of day, 0..=23
    pub hour: u8,
    pub impressions: u64,
    pub clicks: u64,
    pub spend: f64,
    pub sales: f64,
    pub orders: u64,
}

/// Current state and history of one placement, input to the placement
/// analysis and allocation stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementSnapshot {
    pub placement_type: PlacementType,
    /// Current tilt percentage, 0..=200
    pub current_adjustment: f64,
    pub history: Vec<PlacementDataPoint>,
}
