//! Reference Classifiers
//!
//! Two small binary models shipped with the harness: a nearest-centroid model
//! scored by its decision function and a Gaussian naive Bayes model scored by
//! its positive-class probability.

use crate::classifier::{Classifier, ParamDict};
use crate::error::{CvError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde_json::json;

/// Split `x` by 0/1 label; both classes must be present
fn class_partitions(model: &str, x: &Array2<f64>, y: &Array1<i64>) -> Result<[Array2<f64>; 2]> {
    if x.nrows() != y.len() {
        return Err(CvError::ShapeMismatch(format!(
            "{} feature rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }

    let mut partitions = [Vec::new(), Vec::new()];
    for (i, &label) in y.iter().enumerate() {
        match label {
            0 | 1 => partitions[label as usize].push(i),
            other => {
                return Err(CvError::Training {
                    model: model.to_string(),
                    reason: format!("label {other} is not 0/1"),
                })
            }
        }
    }
    if partitions.iter().any(Vec::is_empty) {
        return Err(CvError::Training {
            model: model.to_string(),
            reason: "training labels contain a single class".to_string(),
        });
    }

    Ok(partitions.map(|rows| x.select(Axis(0), &rows)))
}

fn check_width(model: &str, expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(CvError::ShapeMismatch(format!(
            "{model} fitted on {expected} features, got {}",
            x.ncols()
        )));
    }
    Ok(())
}

/// Distance to the per-class mean
#[derive(Debug, Clone, Default)]
pub struct NearestCentroid {
    centroids: Option<[Array1<f64>; 2]>,
}

impl NearestCentroid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(&self) -> ParamDict {
        ParamDict::from([("metric".to_string(), json!("euclidean"))])
    }

    fn fitted(&self) -> Result<&[Array1<f64>; 2]> {
        self.centroids
            .as_ref()
            .ok_or_else(|| CvError::NotFitted(self.name().to_string()))
    }
}

fn euclidean(a: ArrayView1<f64>, b: &Array1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(p, q)| (p - q) * (p - q))
        .sum::<f64>()
        .sqrt()
}

impl Classifier for NearestCentroid {
    fn name(&self) -> &str {
        "nearest_centroid"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        let [negative, positive] = class_partitions(self.name(), x, y)?;
        let mean = |part: &Array2<f64>| {
            part.mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(part.ncols()))
        };
        self.centroids = Some([mean(&negative), mean(&positive)]);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        Ok(self.decision_function(x)?.mapv(|d| i64::from(d > 0.0)))
    }

    /// Distance to the negative centroid minus distance to the positive one
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let [negative, positive] = self.fitted()?;
        check_width(self.name(), negative.len(), x)?;
        Ok(x.outer_iter()
            .map(|row| euclidean(row, negative) - euclidean(row, positive))
            .collect())
    }

    fn supports_decision_function(&self) -> bool {
        true
    }

    fn clone_untrained(&self) -> Box<dyn Classifier> {
        Box::new(Self::new())
    }
}

/// Per-class Gaussian parameters
#[derive(Debug, Clone)]
struct ClassGaussian {
    log_prior: f64,
    mean: Array1<f64>,
    var: Array1<f64>,
}

impl ClassGaussian {
    fn joint_log_likelihood(&self, row: ArrayView1<f64>) -> f64 {
        let mut ll = self.log_prior;
        for ((&v, &m), &s) in row.iter().zip(self.mean.iter()).zip(self.var.iter()) {
            ll -= 0.5 * (2.0 * std::f64::consts::PI * s).ln();
            ll -= 0.5 * (v - m) * (v - m) / s;
        }
        ll
    }
}

/// Gaussian naive Bayes
#[derive(Debug, Clone)]
pub struct GaussianNb {
    /// Share of the largest feature variance added to every variance
    pub var_smoothing: f64,
    classes: Option<[ClassGaussian; 2]>,
}

impl Default for GaussianNb {
    fn default() -> Self {
        Self {
            var_smoothing: 1e-9,
            classes: None,
        }
    }
}

impl GaussianNb {
    pub fn params(&self) -> ParamDict {
        ParamDict::from([("var_smoothing".to_string(), json!(self.var_smoothing))])
    }

    fn fitted(&self) -> Result<&[ClassGaussian; 2]> {
        self.classes
            .as_ref()
            .ok_or_else(|| CvError::NotFitted(self.name().to_string()))
    }

    /// Joint log-likelihood of both classes per row
    fn joint_log_likelihood(&self, x: &Array2<f64>) -> Result<Vec<[f64; 2]>> {
        let classes = self.fitted()?;
        check_width(self.name(), classes[0].mean.len(), x)?;
        Ok(x.outer_iter()
            .map(|row| {
                [
                    classes[0].joint_log_likelihood(row),
                    classes[1].joint_log_likelihood(row),
                ]
            })
            .collect())
    }
}

impl Classifier for GaussianNb {
    fn name(&self) -> &str {
        "nb"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        let parts = class_partitions(self.name(), x, y)?;
        let max_var = x.var_axis(Axis(0), 0.0).fold(0.0f64, |acc, &v| acc.max(v));
        // all-constant features would leave every variance at zero
        let epsilon = self.var_smoothing * if max_var > 0.0 { max_var } else { 1.0 };
        let n = x.nrows() as f64;

        let gaussian = |part: &Array2<f64>| ClassGaussian {
            log_prior: (part.nrows() as f64 / n).ln(),
            mean: part
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(part.ncols())),
            var: part.var_axis(Axis(0), 0.0) + epsilon,
        };
        self.classes = Some([gaussian(&parts[0]), gaussian(&parts[1])]);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        Ok(self
            .joint_log_likelihood(x)?
            .into_iter()
            .map(|[neg, pos]| i64::from(pos > neg))
            .collect())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .joint_log_likelihood(x)?
            .into_iter()
            .map(|[neg, pos]| {
                let max = neg.max(pos);
                let log_norm = max + ((neg - max).exp() + (pos - max).exp()).ln();
                (pos - log_norm).exp()
            })
            .collect())
    }

    fn supports_probability(&self) -> bool {
        true
    }

    fn clone_untrained(&self) -> Box<dyn Classifier> {
        Box::new(Self {
            var_smoothing: self.var_smoothing,
            classes: None,
        })
    }
}
