/// Coordination between base bids and placement multipliers.
///
/// The bid policy and the traffic allocator each move a cost lever. When
/// both raise their lever in the same run, the effective cost per click
/// compounds multiplicatively. This layer normalizes the two levers into an
/// effective CPC, detects compounding past a configured cap, and produces a
/// corrective base-bid adjustment instead of letting the combined change
/// through. Corrections are surfaced, never auto-applied.
use serde::{Deserialize, Serialize};

use crate::logger::{LogEvent, Logger};
use crate::performance::PlacementType;
use crate::warnln;

/// Platform dynamic-bidding strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiddingStrategy {
    /// Platform bids the base bid as-is
    Fixed,
    /// Platform may raise bids up to 2x the base in promising auctions
    UpAndDown,
    /// Platform only lowers bids
    DownOnly,
}

/// Base bid and multiplier normalized into one effective CPC view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBid {
    /// Base bid that, with the multiplier applied, yields the effective CPC
    pub normalized_bid: f64,
    pub effective_bid: f64,
    /// Multiplier as a factor (tilt 50% -> 1.5)
    pub placement_multiplier: f64,
}

/// Split an effective CPC back into a base bid under a placement multiplier.
///
/// `normalize_base_bid(1.5, 50.0)` yields a normalized bid of 1.0: a $1.00
/// base bid with a +50% placement multiplier costs $1.50 per click.
pub fn normalize_base_bid(effective_cpc: f64, multiplier_percent: f64) -> NormalizedBid {
    let placement_multiplier = 1.0 + multiplier_percent / 100.0;
    NormalizedBid {
        normalized_bid: effective_cpc / placement_multiplier,
        effective_bid: effective_cpc,
        placement_multiplier,
    }
}

/// Outcome of checking a simultaneous base-bid and tilt move
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatedAdjustment {
    /// Corrective base-bid change in percent; negative when the combined
    /// move must be damped, zero otherwise
    pub base_bid_adjustment: f64,
    /// Effective CPC change implied by the largest proposed tilt increase
    pub effective_cpc_change_percent: f64,
    /// Placement whose proposed increase drives the check
    pub driving_placement: Option<PlacementType>,
    pub warning: Option<String>,
}

/// Check whether proposed tilt changes compound the effective CPC past the
/// allowed increase, and size a corrective base-bid adjustment if so.
///
/// # Arguments
/// * `base_bid` - base bid the tilts multiply
/// * `current_tilts` / `proposed_tilts` - tilt percent per placement
/// * `max_cpc_increase_percent` - allowed effective CPC increase per run
/// * `logger` - receives a warning at `Validation` scope when damped
pub fn calculate_coordinated_adjustment(
    base_bid: f64,
    current_tilts: &[(PlacementType, f64)],
    proposed_tilts: &[(PlacementType, f64)],
    max_cpc_increase_percent: f64,
    logger: &mut Logger,
) -> CoordinatedAdjustment {
    // Largest proposed tilt increase drives the worst-case CPC change
    let mut driving: Option<(PlacementType, f64, f64)> = None;
    for &(placement, proposed) in proposed_tilts {
        let current = current_tilts
            .iter()
            .find(|(p, _)| *p == placement)
            .map(|(_, t)| *t)
            .unwrap_or(0.0);
        let increase = proposed - current;
        let is_larger = match driving {
            Some((_, cur, prop)) => increase > prop - cur,
            None => true,
        };
        if is_larger {
            driving = Some((placement, current, proposed));
        }
    }

    let (placement, current, proposed) = match driving {
        Some(d) => d,
        None => {
            return CoordinatedAdjustment {
                base_bid_adjustment: 0.0,
                effective_cpc_change_percent: 0.0,
                driving_placement: None,
                warning: None,
            }
        }
    };

    let current_factor = 1.0 + current / 100.0;
    let proposed_factor = 1.0 + proposed / 100.0;
    let cpc_change_percent = (proposed_factor / current_factor - 1.0) * 100.0;

    if cpc_change_percent <= max_cpc_increase_percent {
        return CoordinatedAdjustment {
            base_bid_adjustment: 0.0,
            effective_cpc_change_percent: cpc_change_percent,
            driving_placement: Some(placement),
            warning: None,
        };
    }

    // Solve (1 + adj) * proposed_factor / current_factor = 1 + max_increase
    // for the base-bid damping that brings the combined change back to target
    let adjustment =
        ((1.0 + max_cpc_increase_percent / 100.0) * current_factor / proposed_factor - 1.0) * 100.0;
    let warning = format!(
        "{} tilt {:.0}% -> {:.0}% raises effective CPC by {:.1}% (cap {:.1}%); \
        damping base bid ${:.2} by {:.1}%",
        placement.label(),
        current,
        proposed,
        cpc_change_percent,
        max_cpc_increase_percent,
        base_bid,
        adjustment
    );
    warnln!(logger, LogEvent::Validation, "{}", warning);

    CoordinatedAdjustment {
        base_bid_adjustment: adjustment,
        effective_cpc_change_percent: cpc_change_percent,
        driving_placement: Some(placement),
        warning: Some(warning),
    }
}

/// Result of an effective-CPC safety check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpcSafetyCheck {
    pub effective_cpc: f64,
    /// Worst-case CPC the platform may realize under the bidding strategy
    pub max_possible_cpc: f64,
    /// Acceptable bound: effective CPC plus the buffer
    pub limit: f64,
    pub is_safe: bool,
    pub warning: Option<String>,
}

/// Check whether the worst-case effective CPC stays within an acceptable
/// bound for the given dynamic-bidding strategy.
///
/// Under `up_and_down` the platform may bid up to twice the base, so the
/// worst case doubles; `fixed` and `down_only` cannot exceed the effective
/// CPC itself.
pub fn check_effective_cpc_safety(
    base_bid: f64,
    tilt_percent: f64,
    strategy: BiddingStrategy,
    buffer_percent: f64,
    logger: &mut Logger,
) -> CpcSafetyCheck {
    let effective_cpc = base_bid * (1.0 + tilt_percent / 100.0);
    let max_possible_cpc = match strategy {
        BiddingStrategy::UpAndDown => effective_cpc * 2.0,
        BiddingStrategy::Fixed | BiddingStrategy::DownOnly => effective_cpc,
    };
    let limit = effective_cpc * (1.0 + buffer_percent / 100.0);
    let is_safe = max_possible_cpc <= limit + 1e-9;

    let warning = if is_safe {
        None
    } else {
        let message = format!(
            "worst-case CPC ${:.2} exceeds acceptable ${:.2} \
            (base ${:.2}, tilt {:.0}%, {:?} strategy)",
            max_possible_cpc, limit, base_bid, tilt_percent, strategy
        );
        warnln!(logger, LogEvent::Validation, "{}", message);
        Some(message)
    };

    CpcSafetyCheck {
        effective_cpc,
        max_possible_cpc,
        limit,
        is_safe,
        warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_base_bid() {
        let normalized = normalize_base_bid(1.5, 50.0);
        assert_relative_eq!(normalized.normalized_bid, 1.0);
        assert_relative_eq!(normalized.effective_bid, 1.5);
        assert_relative_eq!(normalized.placement_multiplier, 1.5);
    }

    #[test]
    fn test_normalize_with_zero_multiplier() {
        let normalized = normalize_base_bid(2.0, 0.0);
        assert_relative_eq!(normalized.normalized_bid, 2.0);
        assert_relative_eq!(normalized.placement_multiplier, 1.0);
    }

    #[test]
    fn test_small_tilt_change_needs_no_damping() {
        let mut logger = Logger::new();
        let result = calculate_coordinated_adjustment(
            1.0,
            &[(PlacementType::TopOfSearch, 50.0)],
            &[(PlacementType::TopOfSearch, 60.0)],
            15.0,
            &mut logger,
        );
        // (1.6 / 1.5 - 1) * 100 = 6.67% within the 15% cap
        assert_relative_eq!(result.effective_cpc_change_percent, 100.0 / 15.0, epsilon = 1e-9);
        assert_eq!(result.base_bid_adjustment, 0.0);
        assert!(result.warning.is_none());
    }

    #[test]
    fn test_compounding_increase_gets_damped() {
        let mut logger = Logger::new();
        let result = calculate_coordinated_adjustment(
            1.0,
            &[(PlacementType::TopOfSearch, 50.0)],
            &[(PlacementType::TopOfSearch, 100.0)],
            15.0,
            &mut logger,
        );
        assert_relative_eq!(result.effective_cpc_change_percent, 100.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(result.base_bid_adjustment, -13.75, epsilon = 1e-9);
        assert!(result.warning.is_some());
        // Damped base bid restores the capped effective change
        let damped_factor = 1.0 + result.base_bid_adjustment / 100.0;
        assert_relative_eq!(damped_factor * 2.0 / 1.5, 1.15, epsilon = 1e-9);
    }

    #[test]
    fn test_largest_increase_drives_the_check() {
        let mut logger = Logger::new();
        let result = calculate_coordinated_adjustment(
            1.0,
            &[
                (PlacementType::TopOfSearch, 50.0),
                (PlacementType::ProductPage, 20.0),
            ],
            &[
                (PlacementType::TopOfSearch, 55.0),
                (PlacementType::ProductPage, 80.0),
            ],
            15.0,
            &mut logger,
        );
        assert_eq!(result.driving_placement, Some(PlacementType::ProductPage));
        assert!(result.base_bid_adjustment < 0.0);
    }

    #[test]
    fn test_no_proposals_is_a_no_op() {
        let mut logger = Logger::new();
        let result = calculate_coordinated_adjustment(1.0, &[], &[], 15.0, &mut logger);
        assert_eq!(result.base_bid_adjustment, 0.0);
        assert!(result.driving_placement.is_none());
    }

    #[test]
    fn test_up_and_down_doubles_worst_case() {
        let mut logger = Logger::new();
        let check =
            check_effective_cpc_safety(3.0, 100.0, BiddingStrategy::UpAndDown, 10.0, &mut logger);
        assert_relative_eq!(check.effective_cpc, 6.0);
        assert_relative_eq!(check.max_possible_cpc, 12.0);
        assert!(!check.is_safe);
        assert!(check.warning.is_some());
    }

    #[test]
    fn test_down_only_is_safe_within_buffer() {
        let mut logger = Logger::new();
        let check =
            check_effective_cpc_safety(3.0, 100.0, BiddingStrategy::DownOnly, 10.0, &mut logger);
        assert_relative_eq!(check.max_possible_cpc, 6.0);
        assert!(check.is_safe);
        assert!(check.warning.is_none());
    }

    #[test]
    fn test_fixed_matches_down_only_worst_case() {
        let mut logger = Logger::new();
        let check =
            check_effective_cpc_safety(2.0, 50.0, BiddingStrategy::Fixed, 5.0, &mut logger);
        assert_relative_eq!(check.max_possible_cpc, 3.0);
        assert!(check.is_safe);
    }
}
