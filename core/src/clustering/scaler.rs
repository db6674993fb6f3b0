//! Per-run standardization to zero mean / unit variance.

use crate::error::{SegError, SegResult};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Fitted column statistics. Built fresh for every run, never shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    /// Population standard deviation; 1.0 for constant columns.
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Constant columns get scale 1.0, so they standardize to all zeros
    /// instead of dividing by zero. Non-finite input is a computation error.
    pub fn fit(x: &Array2<f64>) -> SegResult<Self> {
        if x.nrows() == 0 {
            return Err(SegError::NoData("feature matrix has no rows".into()));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(SegError::computation(
                "standardization",
                "feature matrix contains non-finite values",
            ));
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| SegError::computation("standardization", "empty matrix"))?;
        let std = x.std_axis(Axis(0), 0.0);

        let scale: Vec<f64> = std
            .iter()
            .enumerate()
            .map(|(j, &s)| {
                if s > f64::EPSILON * mean[j].abs().max(1.0) {
                    s
                } else {
                    log::debug!("standardization: column {j} is constant");
                    1.0
                }
            })
            .collect();

        Ok(Self {
            mean: mean.to_vec(),
            scale,
        })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mean = Array1::from(self.mean.clone());
        let scale = Array1::from(self.scale.clone());
        (x - &mean) / &scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn columns_have_zero_mean_and_unit_variance() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        let z = scaler.transform(&x);
        for col in z.axis_iter(Axis(1)) {
            assert!(col.mean().unwrap().abs() < 1e-12);
            assert!((col.std(0.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn constant_column_becomes_zeros() {
        let x = array![[5.0, 0.0], [7.0, 0.0], [9.0, 0.0]];
        let z = StandardScaler::fit(&x).unwrap().transform(&x);
        assert!(z.column(1).iter().all(|v| *v == 0.0));
        assert!(z.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let x = array![[1.0, f64::NAN], [2.0, 3.0]];
        assert!(StandardScaler::fit(&x).is_err());
    }
}
