//! Fold Planning
//!
//! Stratified k-fold splitting, optionally over groups. With a group column
//! every distinct group becomes one stratification unit labelled by its first
//! row, so all rows of a group land on the same side of every fold.

use crate::error::{CvError, Result};
use crate::table::{format_groups, GroupKey};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Shuffle seed of the fold planner
pub const FOLD_SEED: u64 = 42;

/// Default number of folds
pub const DEFAULT_FOLDS: usize = 5;

/// Shuffled stratified k-fold splitter
#[derive(Debug, Clone, Copy)]
pub struct StratifiedKFold {
    n_splits: usize,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            seed: FOLD_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Fold number of every unit
    ///
    /// Units of each class are dealt round-robin over the folds in sorted
    /// class order, then each class's fold assignments are shuffled.
    pub fn assign(&self, labels: &[i64]) -> Result<Vec<usize>> {
        let k = self.n_splits;
        if k < 2 || k > labels.len() {
            return Err(CvError::InvalidFoldCount {
                folds: k,
                units: labels.len(),
            });
        }

        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for &label in labels {
            *counts.entry(label).or_default() += 1;
        }
        if let Some((class, &n)) = counts.iter().min_by_key(|&(_, &n)| n) {
            if n < k {
                warn!(
                    "Least populated class {} has only {} members, fewer than {} folds",
                    class, n, k
                );
            }
        }

        // allocation[f][c]: members of class c dealt to fold f
        let class_order: Vec<i64> = counts.keys().copied().collect();
        let mut sorted: Vec<usize> = labels
            .iter()
            .map(|l| class_order.binary_search(l).unwrap_or_default())
            .collect();
        sorted.sort_unstable();
        let mut allocation = vec![vec![0usize; class_order.len()]; k];
        for (position, &class) in sorted.iter().enumerate() {
            allocation[position % k][class] += 1;
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut assignment = vec![0usize; labels.len()];
        for (c, class) in class_order.iter().enumerate() {
            let mut folds_for_class: Vec<usize> = (0..k)
                .flat_map(|fold| std::iter::repeat(fold).take(allocation[fold][c]))
                .collect();
            folds_for_class.shuffle(&mut rng);

            let members = labels
                .iter()
                .enumerate()
                .filter(|&(_, l)| l == class)
                .map(|(i, _)| i);
            for (unit, fold) in members.zip(folds_for_class) {
                assignment[unit] = fold;
            }
        }
        Ok(assignment)
    }

    /// `(train, test)` unit indices for each fold, ascending
    pub fn split(&self, labels: &[i64]) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        let assignment = self.assign(labels)?;
        Ok((0..self.n_splits)
            .map(|fold| -> (Vec<usize>, Vec<usize>) {
                (0..labels.len()).partition(|&unit| assignment[unit] != fold)
            })
            .collect())
    }
}

/// One train/test partition of table rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fold {
    pub index: usize,
    pub train_rows: Vec<usize>,
    pub test_rows: Vec<usize>,
    /// Stratification groups on the training side (empty without grouping)
    pub train_groups: Vec<GroupKey>,
    /// Stratification groups on the test side (empty without grouping)
    pub test_groups: Vec<GroupKey>,
}

/// Plan folds over table rows
///
/// With `groups`, stratification runs over distinct groups and each row
/// follows its group; without, every row is its own unit.
pub fn plan_folds(
    labels: &[i64],
    groups: Option<&[GroupKey]>,
    splitter: StratifiedKFold,
) -> Result<Vec<Fold>> {
    let Some(groups) = groups else {
        return Ok(splitter
            .split(labels)?
            .into_iter()
            .enumerate()
            .map(|(index, (train_rows, test_rows))| Fold {
                index,
                train_rows,
                test_rows,
                train_groups: Vec::new(),
                test_groups: Vec::new(),
            })
            .collect());
    };

    if groups.len() != labels.len() {
        return Err(CvError::ShapeMismatch(format!(
            "{} group keys for {} labels",
            groups.len(),
            labels.len()
        )));
    }

    // one unit per group, in first-seen order, labelled by its first row
    let mut unit_of: HashMap<&GroupKey, usize> = HashMap::new();
    let mut unit_keys: Vec<GroupKey> = Vec::new();
    let mut unit_labels: Vec<i64> = Vec::new();
    let mut mixed: HashSet<usize> = HashSet::new();
    for (key, &label) in groups.iter().zip(labels) {
        match unit_of.get(key) {
            Some(&unit) => {
                if unit_labels[unit] != label {
                    mixed.insert(unit);
                }
            }
            None => {
                unit_of.insert(key, unit_keys.len());
                unit_keys.push(key.clone());
                unit_labels.push(label);
            }
        }
    }
    if !mixed.is_empty() {
        warn!(
            "{} groups carry more than one label; each is stratified by its first label",
            mixed.len()
        );
    }

    let row_units: Vec<usize> = groups.iter().map(|key| unit_of[key]).collect();
    let splits = splitter.split(&unit_labels)?;

    let mut folds = Vec::with_capacity(splits.len());
    for (index, (train_units, test_units)) in splits.into_iter().enumerate() {
        let mut in_test = vec![false; unit_keys.len()];
        for &unit in &test_units {
            in_test[unit] = true;
        }
        let (test_rows, train_rows): (Vec<usize>, Vec<usize>) =
            (0..labels.len()).partition(|&row| in_test[row_units[row]]);

        let fold = Fold {
            index,
            train_rows,
            test_rows,
            train_groups: train_units.iter().map(|&u| unit_keys[u].clone()).collect(),
            test_groups: test_units.iter().map(|&u| unit_keys[u].clone()).collect(),
        };
        debug!(
            "Fold {}: {} train rows, {} test rows, test groups [{}]",
            index,
            fold.train_rows.len(),
            fold.test_rows.len(),
            format_groups(&fold.test_groups)
        );
        folds.push(fold);
    }
    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fold_count_bounds() {
        let labels = [0, 1, 0];
        assert!(matches!(
            StratifiedKFold::new(1).split(&labels),
            Err(CvError::InvalidFoldCount { folds: 1, units: 3 })
        ));
        assert!(matches!(
            StratifiedKFold::new(4).split(&labels),
            Err(CvError::InvalidFoldCount { folds: 4, units: 3 })
        ));
    }

    #[test]
    fn test_stratified_sizes() {
        // 10 negatives, 5 positives over 5 folds: every test fold gets 2 + 1
        let labels: Vec<i64> = (0..15).map(|i| i64::from(i % 3 == 0)).collect();
        let splits = StratifiedKFold::new(5).split(&labels).unwrap();

        let mut seen = vec![0; labels.len()];
        for (train, test) in &splits {
            assert_eq!(test.len(), 3);
            assert_eq!(test.iter().filter(|&&i| labels[i] == 1).count(), 1);
            assert_eq!(train.len() + test.len(), labels.len());
            for &i in test {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_split_is_deterministic() {
        let labels: Vec<i64> = (0..40).map(|i| i64::from(i % 4 == 0)).collect();
        let a = StratifiedKFold::new(5).split(&labels).unwrap();
        let b = StratifiedKFold::new(5).split(&labels).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_groups_follow_first_label() {
        let labels = [0, 1, 0, 0, 1, 1, 0, 0];
        let groups: Vec<GroupKey> = [1, 1, 2, 3, 4, 5, 6, 6]
            .into_iter()
            .map(GroupKey::Int)
            .collect();
        let folds = plan_folds(&labels, Some(&groups), StratifiedKFold::new(2)).unwrap();

        assert_eq!(folds.len(), 2);
        for fold in &folds {
            let total = fold.train_groups.len() + fold.test_groups.len();
            assert_eq!(total, 6);
            for &row in &fold.test_rows {
                assert!(fold.test_groups.contains(&groups[row]));
            }
        }
    }

    #[test]
    fn test_ungrouped_fold_has_no_groups() {
        let labels = [0, 1, 0, 1];
        let folds = plan_folds(&labels, None, StratifiedKFold::new(2)).unwrap();
        assert!(folds.iter().all(|f| f.test_groups.is_empty()));
        assert_eq!(folds[0].test_rows.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_groups_never_straddle_a_fold(
            rows in proptest::collection::vec((0i64..12, 0i64..2), 12..120),
            k in 2usize..5,
        ) {
            let groups: Vec<GroupKey> = rows.iter().map(|&(g, _)| GroupKey::Int(g)).collect();
            let labels: Vec<i64> = rows.iter().map(|&(_, l)| l).collect();
            let n_groups = groups.iter().collect::<HashSet<_>>().len();
            prop_assume!(n_groups >= k);

            let folds = plan_folds(&labels, Some(&groups), StratifiedKFold::new(k)).unwrap();
            let mut tested = HashSet::new();
            for fold in &folds {
                let train: HashSet<&GroupKey> = fold.train_rows.iter().map(|&r| &groups[r]).collect();
                let test: HashSet<&GroupKey> = fold.test_rows.iter().map(|&r| &groups[r]).collect();
                prop_assert!(train.is_disjoint(&test));
                prop_assert_eq!(fold.train_rows.len() + fold.test_rows.len(), labels.len());
                tested.extend(test);
            }
            // every group is tested exactly once across the folds
            prop_assert_eq!(tested.len(), n_groups);
        }
    }
}
