//! Training-Set Conditioning
//!
//! Scaling fitted on the training partition only, and class-imbalance
//! resampling of the training partition. Test data is never used to fit
//! anything here.

mod error;
mod neighbors;
mod resampler;
mod scaler;

pub use error::{ConditioningError, Result};
pub use resampler::{
    resample, Resampler, ResamplingMethod, DEFAULT_K_NEIGHBORS, DEFAULT_M_NEIGHBORS,
    DEFAULT_RESAMPLING_SEED,
};
pub use scaler::{scale, FittedScaler, ScalingMethod};
