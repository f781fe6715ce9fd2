//! Feature Scaling
//!
//! Column-wise scaling fitted on the training partition only and applied
//! unchanged to the test partition.

use crate::error::{ConditioningError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Scaling method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "Option<String>")]
pub enum ScalingMethod {
    /// Leave features untouched
    #[default]
    None,
    /// Zero mean, unit variance
    Standard,
    /// Train range mapped to [0, 1]
    MinMax,
}

impl ScalingMethod {
    /// Resolve a method name; unrecognised names fall back to `None`
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            None | Some("none") => ScalingMethod::None,
            Some("standard") => ScalingMethod::Standard,
            Some("minmax") | Some("min_max") => ScalingMethod::MinMax,
            Some(other) => {
                warn!("Unknown scaling method '{}', features will not be scaled", other);
                ScalingMethod::None
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingMethod::None => "none",
            ScalingMethod::Standard => "standard",
            ScalingMethod::MinMax => "min_max",
        }
    }
}

impl From<Option<String>> for ScalingMethod {
    fn from(name: Option<String>) -> Self {
        Self::from_name(name.as_deref())
    }
}

/// Scaler parameters learned from a training matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    /// Method the parameters belong to
    pub method: ScalingMethod,
    /// Per-column value subtracted first (mean or min)
    pub offset: Array1<f64>,
    /// Per-column divisor (std or range; 1 where that is zero)
    pub scale: Array1<f64>,
}

impl FittedScaler {
    /// Learn parameters from `train`; `None` for `ScalingMethod::None`
    pub fn fit(train: &Array2<f64>, method: ScalingMethod) -> Result<Option<Self>> {
        let label = method.as_str();
        let (offset, spread) = match method {
            ScalingMethod::None => return Ok(None),
            ScalingMethod::Standard => {
                let mean = train
                    .mean_axis(Axis(0))
                    .ok_or(ConditioningError::EmptyTrainingSet(label))?;
                (mean, train.std_axis(Axis(0), 0.0))
            }
            ScalingMethod::MinMax => {
                if train.nrows() == 0 {
                    return Err(ConditioningError::EmptyTrainingSet(label));
                }
                let min = train.fold_axis(Axis(0), f64::INFINITY, |acc, &v| acc.min(v));
                let max = train.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, &v| acc.max(v));
                let range = &max - &min;
                (min, range)
            }
        };

        let scale = spread.mapv(|s| if s == 0.0 { 1.0 } else { s });
        debug!("Fitted {} scaler on {} rows", label, train.nrows());
        Ok(Some(Self {
            method,
            offset,
            scale,
        }))
    }

    /// Apply the learned transform
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.offset.len() {
            return Err(ConditioningError::ShapeMismatch(format!(
                "scaler fitted on {} columns, got {}",
                self.offset.len(),
                x.ncols()
            )));
        }
        Ok((x - &self.offset) / &self.scale)
    }
}

/// Fit on `train`, transform both partitions
///
/// Returns the scaled train and test matrices and the fitted scaler (none
/// when the method is `None`).
pub fn scale(
    train: &Array2<f64>,
    test: &Array2<f64>,
    method: ScalingMethod,
) -> Result<(Array2<f64>, Array2<f64>, Option<FittedScaler>)> {
    if train.ncols() != test.ncols() {
        return Err(ConditioningError::ShapeMismatch(format!(
            "train has {} columns, test has {}",
            train.ncols(),
            test.ncols()
        )));
    }

    match FittedScaler::fit(train, method)? {
        Some(scaler) => Ok((scaler.transform(train)?, scaler.transform(test)?, Some(scaler))),
        None => Ok((train.clone(), test.clone(), None)),
    }
}
