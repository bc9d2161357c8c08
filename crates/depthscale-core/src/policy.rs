//! Step-scaling policy model.
//!
//! A policy is an ordered list of threshold steps plus the capacity bounds
//! the pool must stay within. Evaluation lives in `depthscale-autoscale`;
//! this module only holds the data and its validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One threshold range `[lower, upper)` mapped to a capacity change.
///
/// An absent bound is unbounded on that side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    pub change: i32,
}

impl ScalingStep {
    pub fn new(lower: Option<f64>, upper: Option<f64>, change: i32) -> Self {
        Self {
            lower,
            upper,
            change,
        }
    }

    /// Whether `value` falls inside `[lower, upper)`. NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        self.lower.is_none_or(|lower| value >= lower) && self.upper.is_none_or(|upper| value < upper)
    }
}

/// How a step's `change` is applied to the current capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AdjustmentType {
    /// Add `change` to the current capacity.
    #[default]
    ChangeInCapacity,
}

/// Ordered threshold steps plus the capacity bounds of the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub min_capacity: u32,
    pub max_capacity: u32,
    #[serde(default)]
    pub adjustment_type: AdjustmentType,
    /// Evaluated in this order; the first matching step wins.
    #[serde(default)]
    pub steps: Vec<ScalingStep>,
}

#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("min_capacity {min} exceeds max_capacity {max}")]
    InvalidBounds { min: u32, max: u32 },

    #[error("step {index} has an empty range: lower {lower} >= upper {upper}")]
    EmptyStep { index: usize, lower: f64, upper: f64 },

    #[error("step {index} has a NaN bound")]
    NonFiniteBound { index: usize },
}

impl ScalingPolicy {
    /// Check the capacity bounds and every step's range.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.min_capacity > self.max_capacity {
            return Err(PolicyError::InvalidBounds {
                min: self.min_capacity,
                max: self.max_capacity,
            });
        }

        for (index, step) in self.steps.iter().enumerate() {
            if step.lower.is_some_and(f64::is_nan) || step.upper.is_some_and(f64::is_nan) {
                return Err(PolicyError::NonFiniteBound { index });
            }
            if let (Some(lower), Some(upper)) = (step.lower, step.upper)
                && lower >= upper
            {
                return Err(PolicyError::EmptyStep {
                    index,
                    lower,
                    upper,
                });
            }
        }

        Ok(())
    }

    /// Apply `delta` to `current` and clamp into `[min_capacity, max_capacity]`.
    pub fn clamp_capacity(&self, current: u32, delta: i32) -> u32 {
        let desired = i64::from(current) + i64::from(delta);
        desired.clamp(i64::from(self.min_capacity), i64::from(self.max_capacity)) as u32
    }

    /// CPU-style step layout: shrink below 10, grow from 50, grow faster from 70.
    pub fn default_steps() -> Vec<ScalingStep> {
        vec![
            ScalingStep::new(None, Some(10.0), -1),
            ScalingStep::new(Some(50.0), None, 1),
            ScalingStep::new(Some(70.0), None, 3),
        ]
    }
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            min_capacity: 1,
            max_capacity: 10,
            adjustment_type: AdjustmentType::ChangeInCapacity,
            steps: Self::default_steps(),
        }
    }
}
