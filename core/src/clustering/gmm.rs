use super::{linalg::rows_to_vecs, params::GmmParams, to_labels, AlgorithmSpec, Fitted, ModelState};
use crate::{
    config::GmmTuning,
    error::{SegError, SegResult},
    rng::AlgorithmRng,
};
use linfa::prelude::*;
use linfa::DatasetBase;
use linfa_clustering::GaussianMixtureModel;
use ndarray::{Array1, Array2};

/// Full-covariance EM; each customer is hard-assigned to its most
/// likely component.
pub fn fit(
    x: &Array2<f64>,
    params: &GmmParams,
    tuning: &GmmTuning,
    rng: AlgorithmRng,
) -> SegResult<Fitted> {
    let dataset = DatasetBase::from(x.clone());
    let gmm = GaussianMixtureModel::<f64>::params(params.n_clusters)
        .n_runs(tuning.n_runs)
        .tolerance(tuning.tolerance)
        .max_n_iterations(tuning.max_iterations)
        .with_rng(rng.into_inner())
        .fit(&dataset)
        .map_err(|e| SegError::computation("gmm", e.to_string()))?;

    let labels: Array1<usize> = gmm.predict(x);

    Ok(Fitted {
        labels: to_labels(labels.iter().copied()),
        state: ModelState::Mixture {
            weights: gmm.weights().to_vec(),
            means: rows_to_vecs(gmm.means()),
        },
        resolved: AlgorithmSpec::Gmm(params.clone()),
    })
}
