pub mod config;
pub mod policy;
pub mod types;

pub use config::DepthscaleConfig;
pub use policy::{AdjustmentType, PolicyError, ScalingPolicy, ScalingStep};
pub use types::*;
