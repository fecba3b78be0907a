//! Bid and placement optimization engine for sponsored-ads accounts.
//!
//! Pure, synchronous decision logic: given performance snapshots for a
//! keyword or product target and its placements, compute an optimal base
//! bid, a tilt allocation across placements, and coordination checks that
//! keep simultaneous moves from compounding the effective cost per click.
//! The engine never performs I/O; callers fetch the data, run a pass, and
//! apply (or discard) the returned decisions.
//!
//! [`pipeline::optimize_target`] runs the whole flow; the stage modules are
//! public for callers that want to run them individually.

pub mod allocation;
pub mod bid_policy;
pub mod bid_search;
pub mod coordinator;
pub mod error;
pub mod intraday;
pub mod logger;
pub mod market_curve;
pub mod metrics;
pub mod performance;
pub mod pipeline;
pub mod placement_analysis;

pub use allocation::{
    optimize_traffic_allocation, optimize_traffic_allocation_simple, AllocationGoal,
    AllocatorConfig, CurrentPerformance, OptimizationConstraints, PlacementAllocation,
    TrafficAllocationResult,
};
pub use bid_policy::{calculate_bid_adjustment, BidDecision, BidPolicyConfig};
pub use bid_search::{find_optimal_bid, OptimizationGoal, PerformanceGroupConfig};
pub use coordinator::{
    calculate_coordinated_adjustment, check_effective_cpc_safety, normalize_base_bid,
    BiddingStrategy, CoordinatedAdjustment, CpcSafetyCheck, NormalizedBid,
};
pub use error::{EngineError, Result};
pub use intraday::{calculate_intraday_adjustment, IntradayConfig};
pub use logger::{LogEvent, Logger};
pub use market_curve::{generate_market_curve, MarketCurveConfig, MarketCurvePoint};
pub use metrics::{calculate_metrics, calculate_target_metrics, DerivedMetrics};
pub use performance::{
    BidSample, HourlyDataPoint, OptimizationTarget, PlacementDataPoint, PlacementSnapshot,
    PlacementType, TargetType,
};
pub use pipeline::{optimize_target, CoordinationReport, EngineConfig, OptimizationDecision};
pub use placement_analysis::{
    analyze_marginal_benefit, AnalyzerConfig, MarginalBenefitResult, MarginalMetrics,
};
