//! Class-Imbalance Resampling
//!
//! Rebalances a binary training set towards a target minority:majority ratio.
//! Over-samplers grow the minority class to `floor(ratio * n_majority)`
//! samples and append the new rows after the originals; under-samplers shrink
//! the majority class to `floor(n_minority / ratio)` samples. The hybrid
//! methods run SMOTE and then clean the result, so their final ratio is only
//! approximate.
//!
//! Every method draws from a ChaCha RNG seeded with a fixed value, so the same
//! input always produces the same output.

use crate::error::{ConditioningError, Result};
use crate::neighbors::kneighbors;
use ndarray::{Array1, Array2, Axis};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Default RNG seed for resampling
pub const DEFAULT_RESAMPLING_SEED: u64 = 0;

/// Neighbours used to interpolate synthetic samples
pub const DEFAULT_K_NEIGHBORS: usize = 5;

/// Neighbours used by borderline-SMOTE to find samples in danger
pub const DEFAULT_M_NEIGHBORS: usize = 10;

/// Neighbours used by the edited-nearest-neighbours cleaner
const ENN_NEIGHBORS: usize = 3;

/// Resampling method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "Option<String>")]
pub enum ResamplingMethod {
    /// Leave the training set untouched
    #[default]
    None,
    /// Duplicate random minority rows
    RandomOver,
    /// Drop random majority rows
    RandomUnder,
    /// Draw majority rows with replacement
    RandomUnderBootstrap,
    /// Interpolate between minority neighbours
    Smote,
    /// SMOTE seeded only from minority rows near the class border
    BorderlineSmote,
    /// SMOTE weighted by how many majority rows surround each minority row
    Adasyn,
    /// SMOTE followed by edited-nearest-neighbours cleaning
    SmoteEnn,
    /// SMOTE followed by Tomek-link removal
    SmoteTomek,
}

impl ResamplingMethod {
    /// Resolve a method name; unrecognised names fall back to `None`
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            None | Some("none") => ResamplingMethod::None,
            Some("random_over") => ResamplingMethod::RandomOver,
            Some("random_under") => ResamplingMethod::RandomUnder,
            Some("random_under_bootstrap") => ResamplingMethod::RandomUnderBootstrap,
            Some("smote") => ResamplingMethod::Smote,
            Some("borderline_smote") => ResamplingMethod::BorderlineSmote,
            Some("adasyn") => ResamplingMethod::Adasyn,
            Some("smote_enn") => ResamplingMethod::SmoteEnn,
            Some("smote_tomek") => ResamplingMethod::SmoteTomek,
            Some(other) => {
                warn!(
                    "Unknown resampling method '{}', training data will not be resampled",
                    other
                );
                ResamplingMethod::None
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResamplingMethod::None => "none",
            ResamplingMethod::RandomOver => "random_over",
            ResamplingMethod::RandomUnder => "random_under",
            ResamplingMethod::RandomUnderBootstrap => "random_under_bootstrap",
            ResamplingMethod::Smote => "smote",
            ResamplingMethod::BorderlineSmote => "borderline_smote",
            ResamplingMethod::Adasyn => "adasyn",
            ResamplingMethod::SmoteEnn => "smote_enn",
            ResamplingMethod::SmoteTomek => "smote_tomek",
        }
    }
}

impl From<Option<String>> for ResamplingMethod {
    fn from(name: Option<String>) -> Self {
        Self::from_name(name.as_deref())
    }
}

/// Class counts of a binary label vector
#[derive(Debug, Clone, Copy)]
struct ClassBalance {
    minority: i64,
    n_minority: usize,
    n_majority: usize,
}

impl ClassBalance {
    fn of(y: &Array1<i64>) -> Result<Self> {
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for &label in y {
            *counts.entry(label).or_default() += 1;
        }
        if counts.len() != 2 {
            return Err(ConditioningError::NotBinary(counts.len()));
        }

        // ties resolve to the lower label as minority
        let mut classes: Vec<(i64, usize)> = counts.into_iter().collect();
        classes.sort_by_key(|&(_, n)| n);
        Ok(Self {
            minority: classes[0].0,
            n_minority: classes[0].1,
            n_majority: classes[1].1,
        })
    }
}

/// Configured resampler
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    method: ResamplingMethod,
    ratio: f64,
    seed: u64,
    k_neighbors: usize,
    m_neighbors: usize,
}

impl Resampler {
    pub fn new(method: ResamplingMethod, ratio: f64) -> Self {
        Self {
            method,
            ratio,
            seed: DEFAULT_RESAMPLING_SEED,
            k_neighbors: DEFAULT_K_NEIGHBORS,
            m_neighbors: DEFAULT_M_NEIGHBORS,
        }
    }

    /// Override the RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn method(&self) -> ResamplingMethod {
        self.method
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Resample a training set; returns the new feature matrix and labels
    pub fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<(Array2<f64>, Array1<i64>)> {
        if x.nrows() != y.len() {
            return Err(ConditioningError::ShapeMismatch(format!(
                "{} feature rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        if self.method == ResamplingMethod::None {
            return Ok((x.clone(), y.clone()));
        }
        if !(self.ratio > 0.0 && self.ratio <= 1.0) {
            return Err(ConditioningError::InvalidRatio(self.ratio));
        }

        let balance = ClassBalance::of(y)?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let (x_out, y_out) = match self.method {
            ResamplingMethod::None => (x.clone(), y.clone()),
            ResamplingMethod::RandomOver => self.random_over(x, y, balance, &mut rng)?,
            ResamplingMethod::RandomUnder => self.random_under(x, y, balance, false, &mut rng)?,
            ResamplingMethod::RandomUnderBootstrap => {
                self.random_under(x, y, balance, true, &mut rng)?
            }
            ResamplingMethod::Smote => self.smote(x, y, balance, &mut rng)?,
            ResamplingMethod::BorderlineSmote => self.borderline_smote(x, y, balance, &mut rng)?,
            ResamplingMethod::Adasyn => self.adasyn(x, y, balance, &mut rng)?,
            ResamplingMethod::SmoteEnn => {
                let (xs, ys) = self.smote(x, y, balance, &mut rng)?;
                edited_nearest_neighbours(&xs, &ys)?
            }
            ResamplingMethod::SmoteTomek => {
                let (xs, ys) = self.smote(x, y, balance, &mut rng)?;
                remove_tomek_links(&xs, &ys)?
            }
        };

        info!(
            "Resampled training set with {} (ratio {}): {} -> {} rows",
            self.method.as_str(),
            self.ratio,
            x.nrows(),
            x_out.nrows()
        );
        Ok((x_out, y_out))
    }

    /// Minority rows to synthesise
    fn over_sampling_count(&self, balance: ClassBalance) -> Result<usize> {
        let target = (self.ratio * balance.n_majority as f64) as usize;
        if target < balance.n_minority {
            return Err(ConditioningError::UnreachableRatio {
                ratio: self.ratio,
                direction: "removing minority",
                minority: balance.n_minority,
                majority: balance.n_majority,
            });
        }
        Ok(target - balance.n_minority)
    }

    /// Majority rows to keep
    fn under_sampling_count(&self, balance: ClassBalance) -> Result<usize> {
        let target = (balance.n_minority as f64 / self.ratio) as usize;
        if target > balance.n_majority {
            return Err(ConditioningError::UnreachableRatio {
                ratio: self.ratio,
                direction: "generating majority",
                minority: balance.n_minority,
                majority: balance.n_majority,
            });
        }
        Ok(target)
    }

    fn random_over(
        &self,
        x: &Array2<f64>,
        y: &Array1<i64>,
        balance: ClassBalance,
        rng: &mut ChaCha8Rng,
    ) -> Result<(Array2<f64>, Array1<i64>)> {
        let n_new = self.over_sampling_count(balance)?;
        let minority = class_indices(y, balance.minority);
        let picks: Vec<usize> = (0..n_new)
            .map(|_| minority[rng.gen_range(0..minority.len())])
            .collect();

        debug!("random_over: duplicating {} minority rows", n_new);
        append(x, y, x.select(Axis(0), &picks), balance.minority)
    }

    fn random_under(
        &self,
        x: &Array2<f64>,
        y: &Array1<i64>,
        balance: ClassBalance,
        replacement: bool,
        rng: &mut ChaCha8Rng,
    ) -> Result<(Array2<f64>, Array1<i64>)> {
        let n_keep = self.under_sampling_count(balance)?;

        // output is grouped by class in ascending label order
        let mut classes: Vec<i64> = y.iter().copied().collect();
        classes.sort_unstable();
        classes.dedup();

        let mut keep = Vec::with_capacity(balance.n_minority + n_keep);
        for class in classes {
            let members = class_indices(y, class);
            if class == balance.minority {
                keep.extend(members);
            } else if replacement {
                keep.extend((0..n_keep).map(|_| members[rng.gen_range(0..members.len())]));
            } else {
                keep.extend(
                    index::sample(rng, members.len(), n_keep)
                        .into_iter()
                        .map(|i| members[i]),
                );
            }
        }

        debug!(
            "random_under: keeping {} of {} majority rows (replacement: {})",
            n_keep, balance.n_majority, replacement
        );
        Ok((x.select(Axis(0), &keep), y.select(Axis(0), &keep)))
    }

    fn smote(
        &self,
        x: &Array2<f64>,
        y: &Array1<i64>,
        balance: ClassBalance,
        rng: &mut ChaCha8Rng,
    ) -> Result<(Array2<f64>, Array1<i64>)> {
        let n_new = self.over_sampling_count(balance)?;
        if n_new == 0 {
            return Ok((x.clone(), y.clone()));
        }
        self.require_samples("SMOTE", balance.n_minority, self.k_neighbors + 1)?;

        let x_class = x.select(Axis(0), &class_indices(y, balance.minority));
        let own: Vec<usize> = (0..x_class.nrows()).collect();
        let nns = kneighbors(x_class.view(), x_class.view(), Some(own.as_slice()), self.k_neighbors)?;

        debug!("smote: synthesising {} minority rows", n_new);
        let synthetic = interpolate(&x_class, &x_class, &nns, n_new, rng);
        append(x, y, synthetic, balance.minority)
    }

    fn borderline_smote(
        &self,
        x: &Array2<f64>,
        y: &Array1<i64>,
        balance: ClassBalance,
        rng: &mut ChaCha8Rng,
    ) -> Result<(Array2<f64>, Array1<i64>)> {
        let n_new = self.over_sampling_count(balance)?;
        if n_new == 0 {
            return Ok((x.clone(), y.clone()));
        }
        self.require_samples("borderline-SMOTE", x.nrows(), self.m_neighbors + 1)?;
        self.require_samples("borderline-SMOTE", balance.n_minority, self.k_neighbors + 1)?;

        let minority = class_indices(y, balance.minority);
        let x_class = x.select(Axis(0), &minority);

        // in danger: at least half, but not all, of the m neighbours are majority
        let neighbourhoods = kneighbors(x.view(), x_class.view(), Some(minority.as_slice()), self.m_neighbors)?;
        let danger: Vec<usize> = neighbourhoods
            .iter()
            .enumerate()
            .filter(|(_, nn)| {
                let n_majority = nn.iter().filter(|&&i| y[i] != balance.minority).count();
                2 * n_majority >= self.m_neighbors && n_majority < self.m_neighbors
            })
            .map(|(i, _)| i)
            .collect();

        if danger.is_empty() {
            debug!("borderline_smote: no minority rows in danger, nothing generated");
            return Ok((x.clone(), y.clone()));
        }

        let x_danger = x_class.select(Axis(0), &danger);
        let nns = kneighbors(x_class.view(), x_danger.view(), Some(danger.as_slice()), self.k_neighbors)?;

        debug!(
            "borderline_smote: {} of {} minority rows in danger, synthesising {}",
            danger.len(),
            minority.len(),
            n_new
        );
        let synthetic = interpolate(&x_danger, &x_class, &nns, n_new, rng);
        append(x, y, synthetic, balance.minority)
    }

    fn adasyn(
        &self,
        x: &Array2<f64>,
        y: &Array1<i64>,
        balance: ClassBalance,
        rng: &mut ChaCha8Rng,
    ) -> Result<(Array2<f64>, Array1<i64>)> {
        let n_requested = self.over_sampling_count(balance)?;
        if n_requested == 0 {
            return Ok((x.clone(), y.clone()));
        }
        let k = self.k_neighbors;
        self.require_samples("ADASYN", x.nrows(), k + 1)?;
        self.require_samples("ADASYN", balance.n_minority, k + 1)?;

        let minority = class_indices(y, balance.minority);
        let x_class = x.select(Axis(0), &minority);

        // difficulty: share of majority rows among each minority row's neighbours
        let difficulty: Vec<f64> = kneighbors(x.view(), x_class.view(), Some(minority.as_slice()), k)?
            .iter()
            .map(|nn| nn.iter().filter(|&&i| y[i] != balance.minority).count() as f64 / k as f64)
            .collect();
        let total: f64 = difficulty.iter().sum();
        if total == 0.0 {
            return Err(ConditioningError::NoMajorityNeighbours);
        }

        let per_row: Vec<usize> = difficulty
            .iter()
            .map(|d| (d / total * n_requested as f64).round_ties_even() as usize)
            .collect();
        let n_new: usize = per_row.iter().sum();
        if n_new == 0 {
            return Err(ConditioningError::TooFewSamples {
                method: "ADASYN",
                needed: 1,
                available: 0,
            });
        }

        let own: Vec<usize> = (0..x_class.nrows()).collect();
        let nns = kneighbors(x_class.view(), x_class.view(), Some(own.as_slice()), k)?;

        let rows: Vec<usize> = per_row
            .iter()
            .enumerate()
            .flat_map(|(row, &count)| std::iter::repeat(row).take(count))
            .collect();
        let cols: Vec<usize> = (0..n_new).map(|_| rng.gen_range(0..k)).collect();
        let steps: Vec<f64> = (0..n_new).map(|_| rng.gen::<f64>()).collect();

        let mut synthetic = Array2::zeros((n_new, x.ncols()));
        for (j, mut out) in synthetic.outer_iter_mut().enumerate() {
            let base = x_class.row(rows[j]);
            let neighbour = x_class.row(nns[rows[j]][cols[j]]);
            out.assign(&(&base + &((&neighbour - &base) * steps[j])));
        }

        debug!(
            "adasyn: synthesising {} minority rows ({} requested)",
            n_new, n_requested
        );
        append(x, y, synthetic, balance.minority)
    }

    fn require_samples(&self, method: &'static str, available: usize, needed: usize) -> Result<()> {
        if available < needed {
            return Err(ConditioningError::TooFewSamples {
                method,
                needed,
                available,
            });
        }
        Ok(())
    }
}

/// Resample with the default seed and neighbourhood sizes
pub fn resample(
    x: &Array2<f64>,
    y: &Array1<i64>,
    method: ResamplingMethod,
    ratio: f64,
) -> Result<(Array2<f64>, Array1<i64>)> {
    Resampler::new(method, ratio).resample(x, y)
}

fn class_indices(y: &Array1<i64>, class: i64) -> Vec<usize> {
    y.iter()
        .enumerate()
        .filter(|&(_, &label)| label == class)
        .map(|(i, _)| i)
        .collect()
}

/// Synthesise `n_samples` rows on segments from `base` rows to their neighbours
///
/// A flat index over every (row, neighbour) pair is drawn first, then one
/// uniform step per sample.
fn interpolate(
    base: &Array2<f64>,
    neighbour_data: &Array2<f64>,
    nns: &[Vec<usize>],
    n_samples: usize,
    rng: &mut ChaCha8Rng,
) -> Array2<f64> {
    let k = nns.first().map(Vec::len).unwrap_or(0).max(1);
    let picks: Vec<usize> = (0..n_samples)
        .map(|_| rng.gen_range(0..base.nrows() * k))
        .collect();
    let steps: Vec<f64> = (0..n_samples).map(|_| rng.gen::<f64>()).collect();

    let mut synthetic = Array2::zeros((n_samples, base.ncols()));
    for (j, mut out) in synthetic.outer_iter_mut().enumerate() {
        let (row, col) = (picks[j] / k, picks[j] % k);
        let origin = base.row(row);
        let neighbour = neighbour_data.row(nns[row][col]);
        out.assign(&(&origin + &((&neighbour - &origin) * steps[j])));
    }
    synthetic
}

/// Append synthetic rows labelled `class` after the originals
fn append(
    x: &Array2<f64>,
    y: &Array1<i64>,
    synthetic: Array2<f64>,
    class: i64,
) -> Result<(Array2<f64>, Array1<i64>)> {
    let x_out = ndarray::concatenate(Axis(0), &[x.view(), synthetic.view()])
        .map_err(|e| ConditioningError::ShapeMismatch(e.to_string()))?;
    let y_out = y
        .iter()
        .copied()
        .chain(std::iter::repeat(class).take(synthetic.nrows()))
        .collect();
    Ok((x_out, y_out))
}

/// Drop every row whose three nearest neighbours are not all of its own class
///
/// Applied to both classes; output is grouped by class in ascending order.
fn edited_nearest_neighbours(
    x: &Array2<f64>,
    y: &Array1<i64>,
) -> Result<(Array2<f64>, Array1<i64>)> {
    if x.nrows() <= ENN_NEIGHBORS {
        return Err(ConditioningError::TooFewSamples {
            method: "edited nearest neighbours",
            needed: ENN_NEIGHBORS + 1,
            available: x.nrows(),
        });
    }

    let all: Vec<usize> = (0..x.nrows()).collect();
    let nns = kneighbors(x.view(), x.view(), Some(all.as_slice()), ENN_NEIGHBORS)?;

    let mut classes: Vec<i64> = y.iter().copied().collect();
    classes.sort_unstable();
    classes.dedup();

    let mut keep = Vec::with_capacity(x.nrows());
    for class in classes {
        keep.extend(
            class_indices(y, class)
                .into_iter()
                .filter(|&i| nns[i].iter().all(|&j| y[j] == class)),
        );
    }

    debug!("enn: removed {} rows", x.nrows() - keep.len());
    Ok((x.select(Axis(0), &keep), y.select(Axis(0), &keep)))
}

/// Drop both ends of every Tomek link, keeping the remaining rows in order
///
/// A Tomek link is a pair of opposite-class rows that are each other's nearest
/// neighbour.
fn remove_tomek_links(x: &Array2<f64>, y: &Array1<i64>) -> Result<(Array2<f64>, Array1<i64>)> {
    if x.nrows() < 2 {
        return Err(ConditioningError::TooFewSamples {
            method: "Tomek links",
            needed: 2,
            available: x.nrows(),
        });
    }

    let all: Vec<usize> = (0..x.nrows()).collect();
    let nearest: Vec<usize> = kneighbors(x.view(), x.view(), Some(all.as_slice()), 1)?
        .into_iter()
        .map(|nn| nn[0])
        .collect();

    let keep: Vec<usize> = (0..x.nrows())
        .filter(|&i| {
            let j = nearest[i];
            !(y[j] != y[i] && nearest[j] == i)
        })
        .collect();

    debug!("tomek: removed {} rows", x.nrows() - keep.len());
    Ok((x.select(Axis(0), &keep), y.select(Axis(0), &keep)))
}
