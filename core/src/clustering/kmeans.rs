use super::{linalg::rows_to_vecs, params::KMeansParams, to_labels, AlgorithmSpec, Fitted, ModelState};
use crate::{
    config::KMeansTuning,
    error::{SegError, SegResult},
    rng::AlgorithmRng,
};
use linfa::prelude::*;
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};

/// k-means++ initialisation, best of `n_runs` Lloyd runs.
pub fn fit(
    x: &Array2<f64>,
    params: &KMeansParams,
    tuning: &KMeansTuning,
    rng: AlgorithmRng,
) -> SegResult<Fitted> {
    let model = centroids_model(x, params.n_clusters, tuning, rng)?;
    let labels: Array1<usize> = model.predict(x);

    Ok(Fitted {
        labels: to_labels(labels.iter().copied()),
        state: ModelState::Centroids {
            centroids: rows_to_vecs(model.centroids()),
        },
        resolved: AlgorithmSpec::KMeans(params.clone()),
    })
}

/// Shared with spectral clustering, which runs k-means on its embedding.
pub(super) fn centroids_model(
    x: &Array2<f64>,
    n_clusters: usize,
    tuning: &KMeansTuning,
    rng: AlgorithmRng,
) -> SegResult<KMeans<f64, L2Dist>> {
    let dataset = DatasetBase::from(x.clone());
    KMeans::params_with(n_clusters, rng.into_inner(), L2Dist)
        .max_n_iterations(tuning.max_iterations)
        .tolerance(tuning.tolerance)
        .n_runs(tuning.n_runs)
        .fit(&dataset)
        .map_err(|e| SegError::computation("kmeans", e.to_string()))
}
