//! Euclidean nearest neighbours over a k-d tree

use crate::error::{ConditioningError, Result};
use kdtree::distance::squared_euclidean;
use kdtree::KdTree;
use ndarray::{ArrayView1, ArrayView2};
use rayon::prelude::*;

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn search_error(err: kdtree::ErrorKind) -> ConditioningError {
    ConditioningError::NeighbourSearch(format!("{err:?}"))
}

/// `k` nearest rows of `data` to each row of `queries`
///
/// `self_index[q]` names the row of `data` that query `q` was taken from; that
/// row is never returned as its own neighbour. Ties break on the lower index.
pub(crate) fn kneighbors(
    data: ArrayView2<f64>,
    queries: ArrayView2<f64>,
    self_index: Option<&[usize]>,
    k: usize,
) -> Result<Vec<Vec<usize>>> {
    let mut tree: KdTree<f64, usize, Vec<f64>> = KdTree::new(data.ncols().max(1));
    for (i, row) in data.outer_iter().enumerate() {
        let point = if data.ncols() == 0 { vec![0.0] } else { row.to_vec() };
        tree.add(point, i).map_err(search_error)?;
    }

    if k == 0 {
        return Ok(vec![Vec::new(); queries.nrows()]);
    }

    let wanted = k + usize::from(self_index.is_some());
    (0..queries.nrows())
        .into_par_iter()
        .map(|q| -> Result<Vec<usize>> {
            let query = queries.row(q);
            let skip = self_index.map(|idx| idx[q]);

            // the tree bounds the search radius; candidates within it are
            // re-ranked exactly so that ties resolve on the lower index
            let candidates: Vec<usize> = if wanted >= data.nrows() || data.ncols() == 0 {
                (0..data.nrows()).collect()
            } else {
                let point = query.to_vec();
                let radius = tree
                    .nearest(&point, wanted, &squared_euclidean)
                    .map_err(search_error)?
                    .last()
                    .map_or(f64::INFINITY, |&(d, _)| d);
                let slack = radius.abs() * 1e-9 + f64::MIN_POSITIVE;
                tree.within(&point, radius + slack, &squared_euclidean)
                    .map_err(search_error)?
                    .into_iter()
                    .map(|(_, &i)| i)
                    .collect()
            };

            let mut ranked: Vec<(f64, usize)> = candidates
                .into_iter()
                .filter(|&i| Some(i) != skip)
                .map(|i| (squared_distance(query, data.row(i)), i))
                .collect();
            let by_distance = |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
            if ranked.len() > k {
                ranked.select_nth_unstable_by(k, by_distance);
                ranked.truncate(k);
            }
            ranked.sort_by(by_distance);
            Ok(ranked.into_iter().map(|(_, i)| i).collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use proptest::prelude::*;

    /// Exhaustive reference search
    fn scan(
        data: ArrayView2<f64>,
        queries: ArrayView2<f64>,
        self_index: Option<&[usize]>,
        k: usize,
    ) -> Vec<Vec<usize>> {
        queries
            .outer_iter()
            .enumerate()
            .map(|(q, query)| {
                let skip = self_index.map(|idx| idx[q]);
                let mut all: Vec<(f64, usize)> = (0..data.nrows())
                    .filter(|&i| Some(i) != skip)
                    .map(|i| (squared_distance(query, data.row(i)), i))
                    .collect();
                all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                all.into_iter().take(k).map(|(_, i)| i).collect()
            })
            .collect()
    }

    #[test]
    fn test_skips_self_and_orders_by_distance() {
        let data = array![[0.0, 0.0], [1.0, 0.0], [3.0, 0.0], [0.5, 0.0]];
        let all: Vec<usize> = (0..4).collect();
        let nn = kneighbors(data.view(), data.view(), Some(all.as_slice()), 2).unwrap();

        assert_eq!(nn[0], vec![3, 1]);
        assert_eq!(nn[2], vec![1, 3]);
    }

    #[test]
    fn test_ties_prefer_lower_index() {
        let data = array![[1.0], [-1.0], [5.0]];
        let query = array![[0.0]];
        let nn = kneighbors(data.view(), query.view(), None, 2).unwrap();
        assert_eq!(nn[0], vec![0, 1]);
    }

    #[test]
    fn test_duplicate_rows_and_constant_axis() {
        // 200 copies of one point plus a constant second feature
        let mut values = Vec::new();
        for i in 0..300 {
            values.push(if i < 200 { 1.0 } else { i as f64 });
            values.push(4.0);
        }
        let data = Array2::from_shape_vec((300, 2), values).unwrap();
        let all: Vec<usize> = (0..300).collect();
        let nn = kneighbors(data.view(), data.view(), Some(all.as_slice()), 3).unwrap();

        assert_eq!(nn[0], vec![1, 2, 3]);
        assert_eq!(nn[150], vec![0, 1, 2]);
        assert_eq!(nn[299], vec![298, 297, 296]);
    }

    #[test]
    fn test_non_finite_rows_are_rejected() {
        let data = array![[0.0], [f64::NAN], [2.0]];
        assert!(matches!(
            kneighbors(data.view(), data.view(), None, 1),
            Err(ConditioningError::NeighbourSearch(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_matches_exhaustive_search(
            values in proptest::collection::vec(0i32..6, 2..160),
            k in 1usize..7,
        ) {
            // coarse integer grid: plenty of ties and repeated points
            let n = values.len() / 2;
            let data = Array2::from_shape_vec(
                (n, 2),
                values[..n * 2].iter().map(|&v| f64::from(v)).collect(),
            ).unwrap();
            let own: Vec<usize> = (0..n).collect();

            let tree = kneighbors(data.view(), data.view(), Some(own.as_slice()), k).unwrap();
            prop_assert_eq!(tree, scan(data.view(), data.view(), Some(own.as_slice()), k));
        }
    }
}
