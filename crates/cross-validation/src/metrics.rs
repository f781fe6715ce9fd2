//! Binary Classification Scoring
//!
//! Threshold curves, areas under them and the hard-prediction scores of one
//! fold. Class 1 is the positive class throughout.

use crate::error::{CvError, Result};
use crate::folds::Fold;
use crate::table::GroupKey;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Precision-recall curve, ordered by increasing threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrCurve {
    /// One entry per threshold plus a final 1.0
    pub precision: Vec<f64>,
    /// One entry per threshold plus a final 0.0
    pub recall: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// ROC curve, ordered by decreasing threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Starts at +inf, the point where nothing is predicted positive
    pub thresholds: Vec<f64>,
}

fn check_inputs(y_true: &[i64], scores: &[f64]) -> Result<()> {
    if y_true.len() != scores.len() {
        return Err(CvError::ShapeMismatch(format!(
            "{} labels but {} scores",
            y_true.len(),
            scores.len()
        )));
    }
    if y_true.is_empty() {
        return Err(CvError::UndefinedMetric("no samples to score".to_string()));
    }
    if let Some(&value) = y_true.iter().find(|&&v| v != 0 && v != 1) {
        return Err(CvError::UndefinedMetric(format!(
            "label {value} is not binary 0/1"
        )));
    }
    if scores.iter().any(|s| s.is_nan()) {
        return Err(CvError::UndefinedMetric("scores contain NaN".to_string()));
    }
    Ok(())
}

/// Cumulative (false positives, true positives, threshold) at each distinct
/// score, from the highest score down
fn binary_clf_curve(y_true: &[i64], scores: &[f64]) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    check_inputs(y_true, scores)?;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let (mut fps, mut tps, mut thresholds) = (Vec::new(), Vec::new(), Vec::new());
    let (mut fp, mut tp) = (0.0, 0.0);
    for (pos, &i) in order.iter().enumerate() {
        if y_true[i] == 1 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_score = order.get(pos + 1).map_or(true, |&next| scores[next] != scores[i]);
        if last_of_score {
            fps.push(fp);
            tps.push(tp);
            thresholds.push(scores[i]);
        }
    }
    Ok((fps, tps, thresholds))
}

/// Precision and recall at every distinct score threshold
pub fn precision_recall_curve(y_true: &[i64], scores: &[f64]) -> Result<PrCurve> {
    let (fps, tps, thresholds) = binary_clf_curve(y_true, scores)?;
    let total_positive = tps.last().copied().unwrap_or(0.0);

    let mut precision: Vec<f64> = tps
        .iter()
        .zip(&fps)
        .map(|(&tp, &fp)| if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 })
        .collect();
    let mut recall: Vec<f64> = if total_positive == 0.0 {
        warn!("No positive samples in y_true, recall is set to one for all thresholds");
        vec![1.0; tps.len()]
    } else {
        tps.iter().map(|&tp| tp / total_positive).collect()
    };

    precision.reverse();
    recall.reverse();
    precision.push(1.0);
    recall.push(0.0);
    Ok(PrCurve {
        precision,
        recall,
        thresholds: thresholds.into_iter().rev().collect(),
    })
}

/// ROC curve with collinear intermediate points dropped
pub fn roc_curve(y_true: &[i64], scores: &[f64]) -> Result<RocCurve> {
    let (mut fps, mut tps, mut thresholds) = binary_clf_curve(y_true, scores)?;

    if fps.len() > 2 {
        let keep: Vec<usize> = (0..fps.len())
            .filter(|&i| {
                i == 0
                    || i == fps.len() - 1
                    || fps[i + 1] - 2.0 * fps[i] + fps[i - 1] != 0.0
                    || tps[i + 1] - 2.0 * tps[i] + tps[i - 1] != 0.0
            })
            .collect();
        fps = keep.iter().map(|&i| fps[i]).collect();
        tps = keep.iter().map(|&i| tps[i]).collect();
        thresholds = keep.iter().map(|&i| thresholds[i]).collect();
    }

    fps.insert(0, 0.0);
    tps.insert(0, 0.0);
    thresholds.insert(0, f64::INFINITY);

    let normalise = |counts: &[f64], what: &str| -> Vec<f64> {
        let total = counts.last().copied().unwrap_or(0.0);
        if total <= 0.0 {
            warn!("No {} samples in y_true, the ROC curve is undefined", what);
            vec![f64::NAN; counts.len()]
        } else {
            counts.iter().map(|&c| c / total).collect()
        }
    };

    Ok(RocCurve {
        fpr: normalise(&fps, "negative"),
        tpr: normalise(&tps, "positive"),
        thresholds,
    })
}

/// Trapezoidal area under a monotonic curve
pub fn auc(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(CvError::ShapeMismatch(format!(
            "{} x values but {} y values",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(CvError::UndefinedMetric(
            "at least 2 points are needed to compute area under curve".to_string(),
        ));
    }

    let dx: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let direction = if dx.iter().any(|&d| d < 0.0) {
        if dx.iter().all(|&d| d <= 0.0) {
            -1.0
        } else {
            return Err(CvError::UndefinedMetric(
                "x is neither increasing nor decreasing".to_string(),
            ));
        }
    } else {
        1.0
    };

    let area: f64 = dx
        .iter()
        .zip(y.windows(2))
        .map(|(d, w)| d * (w[0] + w[1]) / 2.0)
        .sum();
    Ok(direction * area)
}

/// Area under the ROC curve; needs both classes in `y_true`
pub fn roc_auc_score(y_true: &[i64], scores: &[f64]) -> Result<f64> {
    let has_positive = y_true.iter().any(|&v| v == 1);
    let has_negative = y_true.iter().any(|&v| v == 0);
    if !(has_positive && has_negative) {
        return Err(CvError::UndefinedMetric(
            "only one class present in y_true, ROC AUC is not defined".to_string(),
        ));
    }
    let curve = roc_curve(y_true, scores)?;
    auc(&curve.fpr, &curve.tpr)
}

/// Confusion counts for the positive class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl Confusion {
    pub fn from_predictions(y_true: &[i64], y_pred: &[i64]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(CvError::ShapeMismatch(format!(
                "{} labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        let mut counts = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t == 1, p == 1) {
                (true, true) => counts.tp += 1,
                (false, true) => counts.fp += 1,
                (false, false) => counts.tn += 1,
                (true, false) => counts.fn_ += 1,
            }
        }
        Ok(counts)
    }

    pub fn correct(&self) -> usize {
        self.tp + self.tn
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// 0 when nothing is predicted positive
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// 0 when there are no positives
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1(&self) -> f64 {
        ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Number of distinct score values
pub fn count_thresholds(scores: &[f64]) -> usize {
    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup_by(|a, b| a == b);
    sorted.len()
}

/// Metrics of one fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub fold: usize,
    pub n_correct: usize,
    pub n_thresholds: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub pr_auc: f64,
    pub roc_auc: f64,
    pub precisions: Vec<f64>,
    pub recalls: Vec<f64>,
    pub pr_thresholds: Vec<f64>,
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub roc_thresholds: Vec<f64>,
    /// Raw confidence scores of the test rows
    pub y_scores: Vec<f64>,
    pub train_groups: Vec<GroupKey>,
    pub test_groups: Vec<GroupKey>,
}

impl ScoreRecord {
    /// Score hard predictions and confidence scores against the true labels
    pub fn compute(
        y_true: &Array1<i64>,
        y_pred: &Array1<i64>,
        y_scores: &Array1<f64>,
    ) -> Result<Self> {
        let y_true = y_true.to_vec();
        let y_scores = y_scores.to_vec();

        let confusion = Confusion::from_predictions(&y_true, &y_pred.to_vec())?;
        let pr = precision_recall_curve(&y_true, &y_scores)?;
        let roc = roc_curve(&y_true, &y_scores)?;
        let pr_auc = auc(&pr.recall, &pr.precision)?;
        let roc_auc = roc_auc_score(&y_true, &y_scores)?;

        Ok(Self {
            fold: 0,
            n_correct: confusion.correct(),
            n_thresholds: count_thresholds(&y_scores),
            accuracy: confusion.accuracy(),
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1: confusion.f1(),
            pr_auc,
            roc_auc,
            precisions: pr.precision,
            recalls: pr.recall,
            pr_thresholds: pr.thresholds,
            fpr: roc.fpr,
            tpr: roc.tpr,
            roc_thresholds: roc.thresholds,
            y_scores,
            train_groups: Vec::new(),
            test_groups: Vec::new(),
        })
    }

    /// Tag with the fold's index and stratification groups
    pub fn with_fold(mut self, fold: &Fold) -> Self {
        self.fold = fold.index;
        self.train_groups = fold.train_groups.clone();
        self.test_groups = fold.test_groups.clone();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    const Y: [i64; 4] = [0, 0, 1, 1];
    const SCORES: [f64; 4] = [0.1, 0.4, 0.35, 0.8];

    fn assert_all_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert_relative_eq!(*a, *e, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_precision_recall_curve() {
        let pr = precision_recall_curve(&Y, &SCORES).unwrap();
        assert_all_close(&pr.precision, &[0.5, 2.0 / 3.0, 0.5, 1.0, 1.0]);
        assert_all_close(&pr.recall, &[1.0, 1.0, 0.5, 0.5, 0.0]);
        assert_eq!(pr.thresholds, vec![0.1, 0.35, 0.4, 0.8]);
    }

    #[test]
    fn test_roc_curve() {
        let roc = roc_curve(&Y, &SCORES).unwrap();
        assert_all_close(&roc.fpr, &[0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_all_close(&roc.tpr, &[0.0, 0.5, 0.5, 1.0, 1.0]);
        assert_eq!(roc.thresholds[0], f64::INFINITY);
        assert_eq!(&roc.thresholds[1..], &[0.8, 0.4, 0.35, 0.1]);
    }

    #[test]
    fn test_roc_drops_collinear_points() {
        let y = [0, 0, 0, 1, 1, 1];
        let scores = [0.1, 0.2, 0.3, 0.7, 0.8, 0.9];
        let roc = roc_curve(&y, &scores).unwrap();

        assert_all_close(&roc.fpr, &[0.0, 0.0, 0.0, 1.0]);
        assert_all_close(&roc.tpr, &[0.0, 1.0 / 3.0, 1.0, 1.0]);
        assert_eq!(&roc.thresholds[1..], &[0.9, 0.7, 0.1]);
        assert_relative_eq!(roc_auc_score(&y, &scores).unwrap(), 1.0);
    }

    #[test]
    fn test_areas() {
        assert_relative_eq!(roc_auc_score(&Y, &SCORES).unwrap(), 0.75);
        let pr = precision_recall_curve(&Y, &SCORES).unwrap();
        assert_relative_eq!(
            auc(&pr.recall, &pr.precision).unwrap(),
            0.5 * (2.0 / 3.0 + 0.5) / 2.0 + 0.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_auc_rejects_non_monotonic() {
        assert!(matches!(
            auc(&[0.0, 1.0, 0.5], &[0.0, 1.0, 1.0]),
            Err(CvError::UndefinedMetric(_))
        ));
        assert!(matches!(auc(&[0.0], &[1.0]), Err(CvError::UndefinedMetric(_))));
    }

    #[test]
    fn test_roc_auc_needs_both_classes() {
        assert!(matches!(
            roc_auc_score(&[1, 1, 1], &[0.2, 0.5, 0.9]),
            Err(CvError::UndefinedMetric(_))
        ));
    }

    #[test]
    fn test_no_positive_samples() {
        let pr = precision_recall_curve(&[0, 0], &[0.3, 0.6]).unwrap();
        assert_eq!(pr.recall, vec![1.0, 1.0, 0.0]);
        assert_eq!(pr.precision, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_confusion_scores() {
        let c = Confusion::from_predictions(&[0, 1, 1, 0, 1], &[0, 1, 0, 1, 1]).unwrap();
        assert_eq!(c.correct(), 3);
        assert_relative_eq!(c.accuracy(), 0.6);
        assert_relative_eq!(c.precision(), 2.0 / 3.0);
        assert_relative_eq!(c.recall(), 2.0 / 3.0);
        assert_relative_eq!(c.f1(), 2.0 / 3.0);

        let silent = Confusion::from_predictions(&[1, 0], &[0, 0]).unwrap();
        assert_eq!(silent.precision(), 0.0);
        assert_eq!(silent.f1(), 0.0);
    }

    #[test]
    fn test_count_thresholds() {
        assert_eq!(count_thresholds(&[0.5, 0.1, 0.5, -0.0, 0.0]), 3);
    }

    #[test]
    fn test_score_record() {
        let record = ScoreRecord::compute(
            &array![0, 0, 1, 1],
            &array![0, 1, 0, 1],
            &array![0.1, 0.4, 0.35, 0.8],
        )
        .unwrap();

        assert_eq!(record.n_correct, 2);
        assert_eq!(record.n_thresholds, 4);
        assert_relative_eq!(record.roc_auc, 0.75);
        assert_eq!(record.y_scores, SCORES.to_vec());
        assert_eq!(record.recalls.len(), record.pr_thresholds.len() + 1);
    }
}
