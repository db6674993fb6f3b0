//! Mean shift with a flat kernel. Every customer seeds a window that
//! climbs to its local density peak; peaks within one bandwidth of a
//! stronger peak are merged into it.

use super::{
    linalg::{nearest, pairwise_sq_dists, rows_to_vecs, sq_dist},
    params::MeanShiftParams,
    to_labels, AlgorithmSpec, Fitted, ModelState,
};
use crate::{
    config::MeanShiftTuning,
    error::{SegError, SegResult},
};
use ndarray::{Array1, Array2, Axis};

pub fn fit(x: &Array2<f64>, params: &MeanShiftParams, tuning: &MeanShiftTuning) -> SegResult<Fitted> {
    let bandwidth = match params.bandwidth {
        Some(b) => b,
        None => {
            let b = estimate_bandwidth(x, tuning.bandwidth_quantile);
            if !(b > 0.0) {
                return Err(SegError::computation(
                    "meanshift",
                    "estimated bandwidth is zero; pass an explicit bandwidth",
                ));
            }
            log::debug!("meanshift: estimated bandwidth {b:.4}");
            b
        }
    };

    let radius_sq = bandwidth * bandwidth;
    let stop = 1e-3 * bandwidth;

    // (peak, window population)
    let mut peaks: Vec<(Array1<f64>, usize)> = Vec::with_capacity(x.nrows());
    for seed in x.axis_iter(Axis(0)) {
        let mut center = seed.to_owned();
        let mut population = 0;
        for _ in 0..tuning.max_iterations {
            let (mean, count) = window_mean(x, &center, radius_sq);
            if count == 0 {
                break;
            }
            let shift = sq_dist(mean.view(), center.view()).sqrt();
            center = mean;
            population = count;
            if shift < stop {
                break;
            }
        }
        if population > 0 {
            peaks.push((center, population));
        }
    }

    // Strongest peak first; ties by position for a stable order.
    peaks.sort_by(|a, b| {
        b.1.cmp(&a.1).then_with(|| {
            a.0.iter()
                .zip(b.0.iter())
                .map(|(p, q)| p.total_cmp(q))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
    let kept = merge_peaks(peaks.into_iter().map(|(peak, _)| peak), radius_sq);
    if kept.is_empty() {
        return Err(SegError::computation("meanshift", "no density peak found"));
    }

    let mut centers = Array2::<f64>::zeros((kept.len(), x.ncols()));
    for (i, c) in kept.iter().enumerate() {
        centers.row_mut(i).assign(c);
    }
    let labels: Vec<usize> = x.axis_iter(Axis(0)).map(|row| nearest(row, &centers)).collect();

    Ok(Fitted {
        labels: to_labels(labels),
        state: ModelState::Centroids {
            centroids: rows_to_vecs(&centers),
        },
        resolved: AlgorithmSpec::MeanShift(MeanShiftParams {
            bandwidth: Some(bandwidth),
        }),
    })
}

/// Mean distance from each point to its k-th nearest neighbour,
/// self included, with k = max(1, n * quantile).
pub(super) fn estimate_bandwidth(x: &Array2<f64>, quantile: f64) -> f64 {
    let n = x.nrows();
    if n == 0 {
        return 0.0;
    }
    let k = ((n as f64 * quantile) as usize).clamp(1, n);
    let d = pairwise_sq_dists(x);
    let total: f64 = d
        .axis_iter(Axis(0))
        .map(|row| {
            let mut sorted = row.to_vec();
            sorted.sort_by(f64::total_cmp);
            sorted[k - 1].sqrt()
        })
        .sum();
    total / n as f64
}

/// Keeps a peak only if it lies strictly beyond `radius_sq` of every
/// peak kept before it.
fn merge_peaks(sorted: impl IntoIterator<Item = Array1<f64>>, radius_sq: f64) -> Vec<Array1<f64>> {
    let mut kept: Vec<Array1<f64>> = Vec::new();
    for peak in sorted {
        if kept.iter().all(|k| sq_dist(k.view(), peak.view()) > radius_sq) {
            kept.push(peak);
        }
    }
    kept
}

fn window_mean(x: &Array2<f64>, center: &Array1<f64>, radius_sq: f64) -> (Array1<f64>, usize) {
    let mut sum = Array1::<f64>::zeros(x.ncols());
    let mut count = 0;
    for row in x.axis_iter(Axis(0)) {
        if sq_dist(row, center.view()) <= radius_sq {
            sum += &row;
            count += 1;
        }
    }
    if count > 0 {
        sum /= count as f64;
    }
    (sum, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn two_blobs_give_two_centers() {
        let x = array![[0.0, 0.0], [0.1, 0.0], [0.0, 0.1], [6.0, 6.0], [6.1, 6.0], [6.0, 6.1]];
        let params = MeanShiftParams { bandwidth: Some(1.0) };
        let fitted = fit(&x, &params, &MeanShiftTuning::default()).unwrap();
        assert_eq!(fitted.labels[0], fitted.labels[2]);
        assert_eq!(fitted.labels[3], fitted.labels[5]);
        assert_ne!(fitted.labels[0], fitted.labels[3]);
    }

    #[test]
    fn peak_exactly_one_bandwidth_away_is_merged() {
        let peaks = vec![array![0.0, 0.0], array![2.0, 0.0], array![0.0, 5.0]];
        let kept = merge_peaks(peaks, 2.0 * 2.0);
        assert_eq!(kept, vec![array![0.0, 0.0], array![0.0, 5.0]]);
    }

    #[test]
    fn estimated_bandwidth_is_recorded() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [10.0], [11.0], [12.0], [13.0], [14.0]];
        let fitted = fit(&x, &MeanShiftParams { bandwidth: None }, &MeanShiftTuning::default()).unwrap();
        match fitted.resolved {
            AlgorithmSpec::MeanShift(p) => assert!(p.bandwidth.is_some_and(|b| b > 0.0)),
            other => panic!("unexpected spec {other:?}"),
        }
    }

    #[test]
    fn identical_points_cannot_estimate_a_bandwidth() {
        let x = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let err = fit(&x, &MeanShiftParams { bandwidth: None }, &MeanShiftTuning::default()).unwrap_err();
        assert!(matches!(err, SegError::Computation { .. }));
    }
}
