//! Proposal calculation
//!
//! Scales a current allocation by how far its observed utilization is from
//! the desired one, then rounds the result upward so a proposal is never 0.

use crate::error::{OptimizerError, Result};

/// Offset added before taking the ceiling. Guarantees `round_up(0.0) == 1`.
const ROUNDING_OFFSET: f64 = 1.5;

/// Round upward with a floor of 1: `ceil(x + 1.5) - 1`
///
/// This is not round-to-nearest. Integral inputs move up by one
/// (`round_up(300.0) == 301.0`) and every non-negative input yields at
/// least 1.
pub fn round_up(value: f64) -> f64 {
    (value + ROUNDING_OFFSET).ceil() - 1.0
}

/// Unrounded allocation that would bring utilization to the desired level
pub fn raw_proposal(current_value: i64, observed_utilization: f64, desired_percentage: f64) -> f64 {
    (observed_utilization / 100.0) * current_value as f64 * (100.0 / desired_percentage)
}

/// Proposed allocation for one dimension
///
/// Inputs are validated before any division takes place, and a result that
/// does not fit a `u64` allocation is rejected instead of saturating.
pub fn propose(
    current_value: i64,
    observed_utilization: f64,
    desired_percentage: f64,
) -> Result<u64> {
    if !desired_percentage.is_finite() || desired_percentage <= 0.0 {
        return Err(OptimizerError::Configuration(format!(
            "desired percentage must be greater than 0, got {}",
            desired_percentage
        )));
    }
    if current_value < 0 {
        return Err(OptimizerError::Configuration(format!(
            "current allocation must not be negative, got {}",
            current_value
        )));
    }
    if !observed_utilization.is_finite() || observed_utilization < 0.0 {
        return Err(OptimizerError::Configuration(format!(
            "observed utilization must be a non-negative percentage, got {}",
            observed_utilization
        )));
    }

    let proposed = round_up(raw_proposal(
        current_value,
        observed_utilization,
        desired_percentage,
    ));

    // u64::MAX as f64 rounds up to 2^64, which no u64 holds
    if !proposed.is_finite() || proposed >= u64::MAX as f64 {
        return Err(OptimizerError::Configuration(format!(
            "proposal for current={} observed={} desired={} is out of range",
            current_value, observed_utilization, desired_percentage
        )));
    }

    Ok(proposed as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CPU_UTILIZATION: f64 = 49.53529105870167;
    const MEMORY_UTILIZATION: f64 = 102.3319085080778;

    #[test]
    fn test_round_up_floors_at_one() {
        assert_eq!(round_up(0.0), 1.0);
        assert_eq!(round_up(0.2), 1.0);
        assert_eq!(round_up(0.5), 1.0);
    }

    #[test]
    fn test_round_up_integral_values_move_up() {
        assert_eq!(round_up(1.0), 2.0);
        assert_eq!(round_up(300.0), 301.0);
    }

    #[test]
    fn test_round_up_fractional_values() {
        assert_eq!(round_up(0.99), 2.0);
        assert_eq!(round_up(316.4), 317.0);
        assert_eq!(round_up(316.6), 318.0);
    }

    #[test]
    fn test_cpu_proposal() {
        let raw = raw_proposal(512, CPU_UTILIZATION, 80.0);
        assert!((raw - 317.0258627756907).abs() < 1e-9);
        assert_eq!(propose(512, CPU_UTILIZATION, 80.0).unwrap(), 318);
    }

    #[test]
    fn test_memory_proposal() {
        let raw = raw_proposal(2048, MEMORY_UTILIZATION, 80.0);
        assert!((raw - 2619.6968578067917).abs() < 1e-9);
        assert_eq!(propose(2048, MEMORY_UTILIZATION, 80.0).unwrap(), 2621);
    }

    #[test]
    fn test_zero_desired_percentage_is_configuration_error() {
        let result = propose(512, CPU_UTILIZATION, 0.0);
        assert!(matches!(result, Err(OptimizerError::Configuration(_))));
    }

    #[test]
    fn test_negative_inputs_rejected() {
        assert!(matches!(
            propose(-1, CPU_UTILIZATION, 80.0),
            Err(OptimizerError::Configuration(_))
        ));
        assert!(matches!(
            propose(512, -0.1, 80.0),
            Err(OptimizerError::Configuration(_))
        ));
        assert!(matches!(
            propose(512, CPU_UTILIZATION, -80.0),
            Err(OptimizerError::Configuration(_))
        ));
        assert!(propose(512, f64::INFINITY, 80.0).is_err());
    }

    #[test]
    fn test_unrepresentable_proposal_rejected() {
        // a tiny target overflows the division
        assert!(raw_proposal(512, 50.0, 1e-320).is_infinite());
        assert!(matches!(
            propose(512, 50.0, 1e-320),
            Err(OptimizerError::Configuration(_))
        ));
        // finite, but far beyond any u64
        assert!(matches!(
            propose(i64::MAX, 1e300, 1.0),
            Err(OptimizerError::Configuration(_))
        ));
        assert!(propose(i64::MAX, 100.0, 100.0).is_ok());
    }

    #[test]
    fn test_zero_inputs_still_propose_one() {
        assert_eq!(propose(0, CPU_UTILIZATION, 80.0).unwrap(), 1);
        assert_eq!(propose(512, 0.0, 80.0).unwrap(), 1);
    }

    #[test]
    fn test_proposal_is_at_least_one_across_inputs() {
        let currents = [0, 1, 128, 256, 512, 1024, 4096];
        let utilizations = [0.0, 0.01, 1.0, 33.3, 80.0, 100.0, 250.0];
        let targets = [1.0, 25.0, 50.0, 80.0, 100.0, 150.0];

        for current in currents {
            for observed in utilizations {
                for desired in targets {
                    let proposed = propose(current, observed, desired).unwrap();
                    assert!(
                        proposed >= 1,
                        "current={} observed={} desired={} proposed={}",
                        current,
                        observed,
                        desired,
                        proposed
                    );
                }
            }
        }
    }
}
