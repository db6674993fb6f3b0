//! Small dense linear-algebra helpers shared by the clustering algorithms.

use crate::error::{SegError, SegResult};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView1, Axis};

pub fn sq_dist(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Pairwise squared Euclidean distances, shape (n, n).
pub fn pairwise_sq_dists(x: &Array2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let mut d = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let v = sq_dist(x.row(i), x.row(j));
            d[[i, j]] = v;
            d[[j, i]] = v;
        }
    }
    d
}

/// Index of the row of `centers` closest to `point`.
pub fn nearest(point: ArrayView1<f64>, centers: &Array2<f64>) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centers.axis_iter(Axis(0)).enumerate() {
        let d = sq_dist(point, c);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

/// Mean row per label in 0..k. Empty labels yield a zero row.
pub fn label_means(x: &Array2<f64>, labels: &[usize], k: usize) -> Array2<f64> {
    let mut sums = Array2::zeros((k, x.ncols()));
    let mut counts = vec![0usize; k];
    for (row, &l) in x.axis_iter(Axis(0)).zip(labels) {
        let mut s = sums.row_mut(l);
        s += &row;
        counts[l] += 1;
    }
    for (l, &c) in counts.iter().enumerate() {
        if c > 0 {
            sums.row_mut(l).mapv_inplace(|v| v / c as f64);
        }
    }
    sums
}

pub fn rows_to_vecs(m: &Array2<f64>) -> Vec<Vec<f64>> {
    m.axis_iter(Axis(0)).map(|r| r.to_vec()).collect()
}

/// Eigenvectors of a real symmetric matrix for its `k` largest
/// eigenvalues, one per column, largest first. Ties keep index order.
pub fn top_eigenvectors(a: Array2<f64>, k: usize) -> SegResult<(Array1<f64>, Array2<f64>)> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(SegError::computation("eigen", "matrix is not square"));
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(SegError::computation("eigen", "matrix has non-finite entries"));
    }
    let k = k.min(n);
    if k == 0 {
        return Ok((Array1::zeros(0), Array2::zeros((n, 0))));
    }

    let matrix = DMatrix::from_fn(n, n, |i, j| a[[i, j]]);
    drop(a);
    let eigen = SymmetricEigen::new(matrix);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&p, &q| {
        eigen.eigenvalues[q]
            .total_cmp(&eigen.eigenvalues[p])
            .then(p.cmp(&q))
    });
    order.truncate(k);

    let values = Array1::from_iter(order.iter().map(|&c| eigen.eigenvalues[c]));
    let vectors = Array2::from_shape_fn((n, k), |(i, col)| eigen.eigenvectors[(i, order[col])]);
    Ok((values, vectors))
}
