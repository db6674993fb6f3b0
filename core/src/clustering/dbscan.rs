use super::{linalg::sq_dist, params::DbscanParams, AlgorithmSpec, Fitted, ModelState};
use crate::{
    error::{SegError, SegResult},
    types::{ClusterLabel, NOISE_LABEL},
};
use linfa::{traits::Transformer, ParamGuard};
use linfa_clustering::Dbscan;
use ndarray::Array2;

/// Points that no core point reaches get NOISE_LABEL.
pub fn fit(x: &Array2<f64>, params: &DbscanParams) -> SegResult<Fitted> {
    let memberships: Vec<Option<usize>> = if params.min_samples <= 1 {
        eps_components(x, params.eps)
    } else {
        let valid = Dbscan::params(params.min_samples)
            .tolerance(params.eps)
            .check()
            .map_err(|e| SegError::invalid_parameter("eps", e.to_string()))?;
        valid.transform(x).to_vec()
    };

    let labels: Vec<ClusterLabel> = memberships
        .iter()
        .map(|m| m.map_or(NOISE_LABEL, |c| c as ClusterLabel))
        .collect();
    let n_clusters = memberships.iter().flatten().max().map_or(0, |m| m + 1);
    let n_noise = labels.iter().filter(|l| **l == NOISE_LABEL).count();

    if n_noise == labels.len() {
        log::warn!(
            "dbscan: every customer is noise (eps={}, min_samples={})",
            params.eps,
            params.min_samples
        );
    }

    Ok(Fitted {
        labels,
        state: ModelState::Density { n_clusters, n_noise },
        resolved: AlgorithmSpec::Dbscan(params.clone()),
    })
}

/// With a one-point neighbourhood every customer is a core point, so the
/// clusters are the connected components of the eps graph. Labels follow
/// first appearance.
fn eps_components(x: &Array2<f64>, eps: f64) -> Vec<Option<usize>> {
    let n = x.nrows();
    let eps_sq = eps * eps;
    let mut labels = vec![None; n];
    let mut next = 0;
    for start in 0..n {
        if labels[start].is_some() {
            continue;
        }
        labels[start] = Some(next);
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            for j in 0..n {
                if labels[j].is_none() && sq_dist(x.row(i), x.row(j)) <= eps_sq {
                    labels[j] = Some(next);
                    stack.push(j);
                }
            }
        }
        next += 1;
    }
    labels
}
