//! Affinity propagation.
//!
//! Similarity is negative squared distance; every customer's
//! preference is the median similarity, so the data picks the number of
//! exemplars. Responsibilities and availabilities are exchanged with
//! damping until the exemplar set holds still for
//! `convergence_iterations` rounds.

use super::{
    linalg::{pairwise_sq_dists, rows_to_vecs},
    params::AffinityPropagationParams,
    to_labels, AlgorithmSpec, Fitted, ModelState,
};
use crate::{
    config::AffinityTuning,
    error::{SegError, SegResult},
    rng::AlgorithmRng,
};
use ndarray::{Array2, Axis};
use std::collections::VecDeque;

pub fn fit(
    x: &Array2<f64>,
    params: &AffinityPropagationParams,
    tuning: &AffinityTuning,
    mut rng: AlgorithmRng,
) -> SegResult<Fitted> {
    let n = x.nrows();
    let mut s = pairwise_sq_dists(x).mapv(|d| -d);

    let mut flat: Vec<f64> = s.iter().copied().collect();
    flat.sort_by(f64::total_cmp);
    let preference = median(&flat);

    if n == 1 || all_offdiag_equal(&s) {
        // Degenerate similarity: either one exemplar per customer or one overall.
        let labels: Vec<usize> = if n > 1 && preference > s[[0, 1]] {
            (0..n).collect()
        } else {
            vec![0; n]
        };
        let k = labels.iter().max().map_or(0, |m| m + 1);
        return Ok(finish(x, params, labels, (0..k).collect()));
    }

    for i in 0..n {
        s[[i, i]] = preference;
    }
    // Tiny seeded jitter breaks ties between equally good exemplars.
    let tiny = f64::MIN_POSITIVE * 100.0;
    for v in s.iter_mut() {
        *v += (f64::EPSILON * *v + tiny) * rng.standard_normal();
    }

    let damping = params.damping;
    let mut r = Array2::<f64>::zeros((n, n));
    let mut a = Array2::<f64>::zeros((n, n));
    let mut history: VecDeque<Vec<bool>> = VecDeque::with_capacity(tuning.convergence_iterations);
    let mut exemplar = vec![false; n];
    let mut converged = false;

    for it in 0..tuning.max_iterations {
        // Responsibilities.
        for i in 0..n {
            let (mut first, mut first_k, mut second) = (f64::NEG_INFINITY, 0, f64::NEG_INFINITY);
            for k in 0..n {
                let v = a[[i, k]] + s[[i, k]];
                if v > first {
                    second = first;
                    first = v;
                    first_k = k;
                } else if v > second {
                    second = v;
                }
            }
            for k in 0..n {
                let competitor = if k == first_k { second } else { first };
                let update = s[[i, k]] - competitor;
                r[[i, k]] = damping * r[[i, k]] + (1.0 - damping) * update;
            }
        }

        // Availabilities.
        for k in 0..n {
            let positive: f64 = (0..n)
                .filter(|&i| i != k)
                .map(|i| r[[i, k]].max(0.0))
                .sum();
            for i in 0..n {
                let update = if i == k {
                    positive
                } else {
                    (r[[k, k]] + positive - r[[i, k]].max(0.0)).min(0.0)
                };
                a[[i, k]] = damping * a[[i, k]] + (1.0 - damping) * update;
            }
        }

        for (k, e) in exemplar.iter_mut().enumerate() {
            *e = a[[k, k]] + r[[k, k]] > 0.0;
        }
        if history.len() == tuning.convergence_iterations {
            history.pop_front();
        }
        history.push_back(exemplar.clone());

        let count = exemplar.iter().filter(|e| **e).count();
        if history.len() == tuning.convergence_iterations
            && count > 0
            && history.iter().all(|h| *h == exemplar)
        {
            log::debug!("affinity_propagation: converged after {} iterations", it + 1);
            converged = true;
            break;
        }
    }

    let mut exemplars: Vec<usize> = (0..n).filter(|&k| exemplar[k]).collect();
    if exemplars.is_empty() {
        return Err(SegError::computation(
            "affinity_propagation",
            format!(
                "no exemplars emerged after {} iterations (damping={})",
                tuning.max_iterations, damping
            ),
        ));
    }
    if !converged {
        log::warn!(
            "affinity_propagation: did not converge in {} iterations; using {} current exemplars",
            tuning.max_iterations,
            exemplars.len()
        );
    }

    // Refine: within each group, the member most similar to the rest becomes exemplar.
    let assign = |exemplars: &[usize]| -> Vec<usize> {
        (0..n)
            .map(|i| {
                if let Some(pos) = exemplars.iter().position(|&e| e == i) {
                    return pos;
                }
                let mut best = 0;
                for (c, &e) in exemplars.iter().enumerate() {
                    if s[[i, e]] > s[[i, exemplars[best]]] {
                        best = c;
                    }
                }
                best
            })
            .collect()
    };
    let groups = assign(&exemplars);
    for (c, slot) in exemplars.iter_mut().enumerate() {
        let members: Vec<usize> = (0..n).filter(|&i| groups[i] == c).collect();
        let mut best = *slot;
        let mut best_score = f64::NEG_INFINITY;
        for &j in &members {
            let score: f64 = members.iter().map(|&i| s[[i, j]]).sum();
            if score > best_score {
                best_score = score;
                best = j;
            }
        }
        *slot = best;
    }

    let groups = assign(&exemplars);
    // Number clusters by ascending exemplar index.
    let mut order: Vec<usize> = (0..exemplars.len()).collect();
    order.sort_by_key(|&c| exemplars[c]);
    let mut rank = vec![0; exemplars.len()];
    for (pos, &c) in order.iter().enumerate() {
        rank[c] = pos;
    }
    let labels: Vec<usize> = groups.iter().map(|&c| rank[c]).collect();
    let indices: Vec<usize> = order.iter().map(|&c| exemplars[c]).collect();

    Ok(finish(x, params, labels, indices))
}

fn finish(
    x: &Array2<f64>,
    params: &AffinityPropagationParams,
    labels: Vec<usize>,
    indices: Vec<usize>,
) -> Fitted {
    let centers = x.select(Axis(0), &indices);
    Fitted {
        labels: to_labels(labels),
        state: ModelState::Exemplars {
            indices,
            centers: rows_to_vecs(&centers),
        },
        resolved: AlgorithmSpec::AffinityPropagation(params.clone()),
    }
}

fn median(sorted: &[f64]) -> f64 {
    let len = sorted.len();
    if len == 0 {
        return 0.0;
    }
    if len % 2 == 1 {
        sorted[len / 2]
    } else {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    }
}

fn all_offdiag_equal(s: &Array2<f64>) -> bool {
    let n = s.nrows();
    if n < 2 {
        return true;
    }
    let first = s[[0, 1]];
    (0..n).all(|i| (0..n).all(|j| i == j || s[[i, j]] == first))
}
