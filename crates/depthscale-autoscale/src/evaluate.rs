//! Step-scaling evaluation: metric value in, capacity delta out.

use depthscale_core::{ScalingPolicy, ScalingStep};

/// Capacity delta for `value` under `policy`.
///
/// Steps are scanned in order and the first one containing `value` wins.
/// No match, or a NaN value, yields 0.
pub fn evaluate(value: f64, policy: &ScalingPolicy) -> i32 {
    if value.is_nan() {
        return 0;
    }
    normalized_steps(&policy.steps)
        .iter()
        .find(|step| step.contains(value))
        .map_or(0, |step| step.change)
}

/// Close each open-ended step at the lower bound of the step after it,
/// when that bound lies above the step's own lower bound.
///
/// Explicit upper bounds are kept as written.
pub fn normalized_steps(steps: &[ScalingStep]) -> Vec<ScalingStep> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let mut step = step.clone();
            if step.upper.is_none()
                && let Some(next_lower) = steps.get(index + 1).and_then(|next| next.lower)
                && step.lower.is_none_or(|lower| next_lower > lower)
            {
                step.upper = Some(next_lower);
            }
            step
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_policy() -> ScalingPolicy {
        ScalingPolicy {
            min_capacity: 1,
            max_capacity: 10,
            steps: vec![
                ScalingStep::new(None, Some(10.0), -1),
                ScalingStep::new(Some(50.0), None, 1),
                ScalingStep::new(Some(70.0), None, 3),
            ],
            ..ScalingPolicy::default()
        }
    }

    #[test]
    fn first_matching_step_wins() {
        let policy = queue_policy();
        assert_eq!(evaluate(5.0, &policy), -1);
        assert_eq!(evaluate(55.0, &policy), 1);
        assert_eq!(evaluate(80.0, &policy), 3);
        assert_eq!(evaluate(30.0, &policy), 0);
    }

    #[test]
    fn bounds_are_inclusive_lower_exclusive_upper() {
        let policy = queue_policy();
        assert_eq!(evaluate(10.0, &policy), 0);
        assert_eq!(evaluate(9.999, &policy), -1);
        assert_eq!(evaluate(50.0, &policy), 1);
        assert_eq!(evaluate(70.0, &policy), 3);
    }

    #[test]
    fn nan_and_infinities() {
        let policy = queue_policy();
        assert_eq!(evaluate(f64::NAN, &policy), 0);
        assert_eq!(evaluate(f64::INFINITY, &policy), 3);
        assert_eq!(evaluate(f64::NEG_INFINITY, &policy), -1);
    }

    #[test]
    fn empty_policy_never_scales() {
        let policy = ScalingPolicy {
            steps: vec![],
            ..ScalingPolicy::default()
        };
        assert_eq!(evaluate(1_000.0, &policy), 0);
    }

    #[test]
    fn explicit_overlaps_keep_first_match() {
        let policy = ScalingPolicy {
            steps: vec![
                ScalingStep::new(Some(0.0), Some(100.0), 2),
                ScalingStep::new(Some(50.0), Some(60.0), 5),
            ],
            ..ScalingPolicy::default()
        };
        assert_eq!(evaluate(55.0, &policy), 2);
    }

    #[test]
    fn normalization_only_touches_open_steps() {
        let steps = normalized_steps(&queue_policy().steps);
        assert_eq!(steps[0], ScalingStep::new(None, Some(10.0), -1));
        assert_eq!(steps[1], ScalingStep::new(Some(50.0), Some(70.0), 1));
        assert_eq!(steps[2], ScalingStep::new(Some(70.0), None, 3));
    }

    #[test]
    fn open_step_not_narrowed_by_lower_following_step() {
        // Descending order: the later step starts below, so the first stays open.
        let steps = normalized_steps(&[
            ScalingStep::new(Some(70.0), None, 3),
            ScalingStep::new(Some(50.0), None, 1),
        ]);
        assert_eq!(steps[0].upper, None);
        let policy = ScalingPolicy {
            steps: steps.clone(),
            ..ScalingPolicy::default()
        };
        assert_eq!(evaluate(80.0, &policy), 3);
        assert_eq!(evaluate(60.0, &policy), 1);
    }
}
