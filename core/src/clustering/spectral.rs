//! Spectral clustering.
//!
//! Builds an affinity graph over customers, embeds them with the top
//! `n_clusters` eigenvectors of the symmetric normalized affinity
//! D^-1/2 W D^-1/2, then runs k-means on the row-normalized embedding.

use super::{
    kmeans,
    linalg::{self, label_means, pairwise_sq_dists, rows_to_vecs},
    params::{Affinity, SpectralParams},
    to_labels, AlgorithmSpec, Fitted, ModelState,
};
use crate::{
    config::{KMeansTuning, SpectralTuning},
    error::{SegError, SegResult},
    rng::AlgorithmRng,
};
use linfa::prelude::*;
use ndarray::{Array1, Array2, Axis};

pub fn fit(
    x: &Array2<f64>,
    params: &SpectralParams,
    tuning: &SpectralTuning,
    kmeans_tuning: &KMeansTuning,
    rng: AlgorithmRng,
) -> SegResult<Fitted> {
    let n = x.nrows();
    let k = params.n_clusters;

    let w = affinity_matrix(x, params.affinity, tuning);
    let degree: Vec<f64> = w.sum_axis(Axis(1)).to_vec();
    if degree.iter().any(|d| *d <= 0.0) {
        return Err(SegError::computation(
            "spectral",
            "affinity graph has an isolated customer",
        ));
    }
    let inv_sqrt: Vec<f64> = degree.iter().map(|d| 1.0 / d.sqrt()).collect();
    let mut m = w;
    for i in 0..n {
        for j in 0..n {
            m[[i, j]] *= inv_sqrt[i] * inv_sqrt[j];
        }
    }

    let embedding = top_eigenvectors(m, k)?;
    let model = kmeans::centroids_model(&embedding, k, kmeans_tuning, rng)?;
    let labels: Array1<usize> = model.predict(&embedding);
    let labels: Vec<usize> = labels.to_vec();

    log::debug!(
        "spectral: affinity={} embedding {}x{}",
        params.affinity.as_str(),
        embedding.nrows(),
        embedding.ncols()
    );

    Ok(Fitted {
        state: ModelState::Centroids {
            centroids: rows_to_vecs(&label_means(x, &labels, k)),
        },
        labels: to_labels(labels),
        resolved: AlgorithmSpec::Spectral(params.clone()),
    })
}

fn affinity_matrix(x: &Array2<f64>, affinity: Affinity, tuning: &SpectralTuning) -> Array2<f64> {
    let mut d = pairwise_sq_dists(x);
    match affinity {
        Affinity::Rbf => {
            d.mapv_inplace(|v| (-tuning.gamma * v).exp());
            d
        }
        Affinity::NearestNeighbors => {
            // Connectivity graph including self, symmetrized as (A + A^T) / 2.
            let n = x.nrows();
            let neighbours = tuning.n_neighbors.clamp(1, n);
            let mut a = Array2::<f64>::zeros((n, n));
            for i in 0..n {
                let mut order: Vec<usize> = (0..n).collect();
                order.sort_by(|&p, &q| d[[i, p]].total_cmp(&d[[i, q]]).then(p.cmp(&q)));
                // Self sorts first at distance zero unless a duplicate row ties it.
                a[[i, i]] = 1.0;
                for &j in order.iter().filter(|&&j| j != i).take(neighbours - 1) {
                    a[[i, j]] = 1.0;
                }
            }
            let at = a.t().to_owned();
            (a + at) * 0.5
        }
    }
}

/// Eigenvectors for the `k` largest eigenvalues, one per column,
/// with each row scaled to unit length.
fn top_eigenvectors(m: Array2<f64>, k: usize) -> SegResult<Array2<f64>> {
    let (_, mut embedding) = linalg::top_eigenvectors(m, k)?;
    for mut row in embedding.axis_iter_mut(Axis(0)) {
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
    Ok(embedding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn nearest_neighbor_graph_is_symmetric_and_connects_self() {
        let x = array![[0.0], [1.0], [10.0], [11.0]];
        let tuning = SpectralTuning {
            n_neighbors: 2,
            ..SpectralTuning::default()
        };
        let a = affinity_matrix(&x, Affinity::NearestNeighbors, &tuning);
        assert_eq!(a, a.t().to_owned());
        for i in 0..4 {
            assert_eq!(a[[i, i]], 1.0);
        }
        assert_eq!(a[[0, 1]], 1.0);
        assert_eq!(a[[0, 2]], 0.0);
    }

    #[test]
    fn embedding_rows_are_unit_length() {
        let x = array![[0.0, 0.0], [0.2, 0.1], [5.0, 5.0], [5.1, 4.9]];
        let w = affinity_matrix(&x, Affinity::Rbf, &SpectralTuning::default());
        let e = top_eigenvectors(w, 2).unwrap();
        for row in e.axis_iter(Axis(0)) {
            let norm: f64 = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn separates_two_blobs_of_several_hundred_customers() {
        let n = 360;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let jitter = ((i * 7 + j * 3) % 11) as f64 * 0.02;
            if i < n / 2 { jitter } else { 6.0 + jitter }
        });
        let params = SpectralParams {
            n_clusters: 2,
            affinity: Affinity::Rbf,
        };
        let fitted = fit(
            &x,
            &params,
            &SpectralTuning::default(),
            &KMeansTuning::default(),
            AlgorithmRng::new(42, 0),
        )
        .unwrap();
        let labels = fitted.labels;
        assert!(labels[..n / 2].iter().all(|l| *l == labels[0]));
        assert!(labels[n / 2..].iter().all(|l| *l == labels[n / 2]));
        assert_ne!(labels[0], labels[n / 2]);
    }
}
