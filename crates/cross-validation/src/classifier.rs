//! Classifier Interface
//!
//! The harness trains and scores through `Classifier` trait objects produced
//! by a `ClassifierFactory`. Each fold trains a fresh untrained clone of one
//! prototype.

use crate::error::{CvError, Result};
use crate::models::{GaussianNb, NearestCentroid};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Hyper-parameters of a classifier, by name
pub type ParamDict = BTreeMap<String, serde_json::Value>;

/// Binary classifier
pub trait Classifier: fmt::Debug + Send + Sync {
    /// Short model name
    fn name(&self) -> &str;

    /// Train on `x` with 0/1 labels `y`
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()>;

    /// Hard 0/1 predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>>;

    /// Signed confidence; larger means more likely positive
    fn decision_function(&self, _x: &Array2<f64>) -> Result<Array1<f64>> {
        Err(CvError::Unsupported {
            model: self.name().to_string(),
            method: "decision_function",
        })
    }

    /// Probability of the positive class
    fn predict_proba(&self, _x: &Array2<f64>) -> Result<Array1<f64>> {
        Err(CvError::Unsupported {
            model: self.name().to_string(),
            method: "predict_proba",
        })
    }

    fn supports_decision_function(&self) -> bool {
        false
    }

    fn supports_probability(&self) -> bool {
        false
    }

    /// Same configuration, no fitted state
    fn clone_untrained(&self) -> Box<dyn Classifier>;
}

/// Which confidence score a classifier is scored with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCapability {
    DecisionFunction,
    Probability,
}

impl ScoreCapability {
    /// Decision function when available, otherwise positive-class probability
    pub fn detect(classifier: &dyn Classifier) -> Result<Self> {
        let capability = if classifier.supports_decision_function() {
            ScoreCapability::DecisionFunction
        } else if classifier.supports_probability() {
            ScoreCapability::Probability
        } else {
            return Err(CvError::NoScoringCapability(classifier.name().to_string()));
        };
        debug!("Scoring {} with {:?}", classifier.name(), capability);
        Ok(capability)
    }

    /// Confidence scores for `x`
    pub fn scores(&self, classifier: &dyn Classifier, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            ScoreCapability::DecisionFunction => classifier.decision_function(x),
            ScoreCapability::Probability => classifier.predict_proba(x),
        }
    }
}

/// Builds untrained classifiers by name
pub trait ClassifierFactory {
    /// Untrained classifier and its parameter dictionary
    fn create(&self, name: &str, seed: u64) -> Result<(Box<dyn Classifier>, ParamDict)>;

    /// Registered names
    fn names(&self) -> Vec<String>;
}

type Builder = Box<dyn Fn(u64) -> (Box<dyn Classifier>, ParamDict) + Send + Sync>;

/// Name-keyed classifier registry
pub struct ClassifierRegistry {
    builders: BTreeMap<String, Builder>,
}

impl ClassifierRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    /// Registry with the bundled models: `nearest_centroid` and `nb`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("nearest_centroid", |_seed| {
            let model = NearestCentroid::new();
            let params = model.params();
            (Box::new(model) as Box<dyn Classifier>, params)
        });
        registry.register("nb", |_seed| {
            let model = GaussianNb::default();
            let params = model.params();
            (Box::new(model) as Box<dyn Classifier>, params)
        });
        registry
    }

    /// Add or replace a builder
    pub fn register<F>(&mut self, name: impl Into<String>, builder: F)
    where
        F: Fn(u64) -> (Box<dyn Classifier>, ParamDict) + Send + Sync + 'static,
    {
        self.builders.insert(name.into(), Box::new(builder));
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ClassifierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl ClassifierFactory for ClassifierRegistry {
    fn create(&self, name: &str, seed: u64) -> Result<(Box<dyn Classifier>, ParamDict)> {
        let builder = self
            .builders
            .get(name)
            .ok_or_else(|| CvError::UnknownClassifier(name.to_string()))?;
        let (classifier, params) = builder(seed);
        info!("Created classifier {} (seed {}): {:?}", name, seed, params);
        Ok((classifier, params))
    }

    fn names(&self) -> Vec<String> {
        self.builders.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Predicts the majority training label, offers no confidence score
    #[derive(Debug, Clone, Default)]
    struct Constant {
        label: Option<i64>,
    }

    impl Classifier for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
            let positives = y.iter().filter(|&&v| v == 1).count();
            self.label = Some(i64::from(2 * positives > y.len()));
            Ok(())
        }

        fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
            let label = self.label.ok_or_else(|| CvError::NotFitted("constant".into()))?;
            Ok(Array1::from_elem(x.nrows(), label))
        }

        fn clone_untrained(&self) -> Box<dyn Classifier> {
            Box::new(Constant::default())
        }
    }

    #[test]
    fn test_detect_prefers_decision_function() {
        assert_eq!(
            ScoreCapability::detect(&NearestCentroid::new()).unwrap(),
            ScoreCapability::DecisionFunction
        );
        assert_eq!(
            ScoreCapability::detect(&GaussianNb::default()).unwrap(),
            ScoreCapability::Probability
        );
    }

    #[test]
    fn test_detect_rejects_scoreless_model() {
        assert!(matches!(
            ScoreCapability::detect(&Constant::default()),
            Err(CvError::NoScoringCapability(_))
        ));
        let x = Array2::zeros((2, 1));
        assert!(matches!(
            Constant::default().decision_function(&x),
            Err(CvError::Unsupported { method: "decision_function", .. })
        ));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ClassifierRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["nb", "nearest_centroid"]);

        let (model, params) = registry.create("nb", 7).unwrap();
        assert_eq!(model.name(), "nb");
        assert!(params.contains_key("var_smoothing"));

        assert!(matches!(
            registry.create("xgb", 7),
            Err(CvError::UnknownClassifier(_))
        ));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = ClassifierRegistry::new();
        registry.register("constant", |_| {
            (Box::new(Constant::default()) as Box<dyn Classifier>, ParamDict::new())
        });
        let (model, _) = registry.create("constant", 0).unwrap();
        assert_eq!(model.name(), "constant");
    }
}
