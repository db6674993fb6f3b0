//! Agglomerative clustering with Ward linkage.
//!
//! Starts from singletons and repeatedly merges the pair whose union
//! least increases within-cluster variance, until `n_clusters` remain.
//! Distances are updated with the Lance-Williams formula; each active
//! cluster caches its nearest neighbour so a merge step is usually O(n).

use super::{
    linalg::{label_means, pairwise_sq_dists, rows_to_vecs},
    params::HierarchicalParams,
    to_labels, AlgorithmSpec, Fitted, ModelState,
};
use crate::error::SegResult;
use ndarray::Array2;

pub fn fit(x: &Array2<f64>, params: &HierarchicalParams) -> SegResult<Fitted> {
    let labels = ward_labels(x, params.n_clusters);
    let centroids = label_means(x, &labels, params.n_clusters.min(x.nrows()));
    Ok(Fitted {
        labels: to_labels(labels),
        state: ModelState::Centroids {
            centroids: rows_to_vecs(&centroids),
        },
        resolved: AlgorithmSpec::Hierarchical(params.clone()),
    })
}

/// Ward clustering of the rows of `x` into `n_clusters` groups.
/// Labels are numbered by first appearance in row order.
pub(super) fn ward_labels(x: &Array2<f64>, n_clusters: usize) -> Vec<usize> {
    let n = x.nrows();
    if n == 0 {
        return Vec::new();
    }
    let target = n_clusters.clamp(1, n);

    let mut dist = pairwise_sq_dists(x);
    let mut size = vec![1.0f64; n];
    let mut active = vec![true; n];
    // Each cluster is represented by its lowest original row index.
    let mut parent: Vec<usize> = (0..n).collect();
    let mut nn = vec![usize::MAX; n];
    let mut nn_dist = vec![f64::INFINITY; n];
    for i in 0..n {
        refresh_nn(i, &dist, &active, &mut nn, &mut nn_dist);
    }

    let mut remaining = n;
    while remaining > target {
        // Closest pair overall, lowest index first on ties.
        let mut a = usize::MAX;
        let mut best = f64::INFINITY;
        for i in 0..n {
            if active[i] && nn[i] != usize::MAX && nn_dist[i] < best {
                best = nn_dist[i];
                a = i;
            }
        }
        if a == usize::MAX {
            break;
        }
        let b = nn[a];
        let (keep, gone) = if a < b { (a, b) } else { (b, a) };

        // Lance-Williams update for Ward linkage.
        let (n_keep, n_gone) = (size[keep], size[gone]);
        let d_pair = dist[[keep, gone]];
        for k in 0..n {
            if !active[k] || k == keep || k == gone {
                continue;
            }
            let n_k = size[k];
            let d = ((n_keep + n_k) * dist[[keep, k]] + (n_gone + n_k) * dist[[gone, k]]
                - n_k * d_pair)
                / (n_keep + n_gone + n_k);
            dist[[keep, k]] = d;
            dist[[k, keep]] = d;
        }
        size[keep] = n_keep + n_gone;
        active[gone] = false;
        parent[gone] = keep;
        remaining -= 1;

        for k in 0..n {
            if !active[k] {
                continue;
            }
            if k == keep || nn[k] == keep || nn[k] == gone {
                refresh_nn(k, &dist, &active, &mut nn, &mut nn_dist);
            } else if dist[[k, keep]] < nn_dist[k] {
                nn[k] = keep;
                nn_dist[k] = dist[[k, keep]];
            }
        }
    }

    let mut label_of_root = vec![usize::MAX; n];
    let mut next = 0;
    (0..n)
        .map(|i| {
            let root = find_root(&parent, i);
            if label_of_root[root] == usize::MAX {
                label_of_root[root] = next;
                next += 1;
            }
            label_of_root[root]
        })
        .collect()
}

fn refresh_nn(i: usize, dist: &Array2<f64>, active: &[bool], nn: &mut [usize], nn_dist: &mut [f64]) {
    nn[i] = usize::MAX;
    nn_dist[i] = f64::INFINITY;
    for j in 0..active.len() {
        if j != i && active[j] && dist[[i, j]] < nn_dist[i] {
            nn[i] = j;
            nn_dist[i] = dist[[i, j]];
        }
    }
}

fn find_root(parent: &[usize], mut i: usize) -> usize {
    while parent[i] != i {
        i = parent[i];
    }
    i
}
