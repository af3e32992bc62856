//! Accumulation of Monte-Carlo realizations.

use crate::amounts::FloatValue;
use crate::errors::{HwpcError, HwpcResult};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Mean and empirical bounds of a vector quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub mean: Array1<FloatValue>,
    pub lower: Array1<FloatValue>,
    pub upper: Array1<FloatValue>,
    /// Probability level of the interval, e.g. 0.95
    pub probability: FloatValue,
}

/// Repeated realizations of a vector quantity
///
/// All realizations must have the same dimension as the first one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloEstimate {
    realizations: Vec<Array1<FloatValue>>,
}

impl MonteCarloEstimate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_realization(&mut self, realization: Array1<FloatValue>) -> HwpcResult<()> {
        if let Some(first) = self.realizations.first() {
            if first.len() != realization.len() {
                return Err(HwpcError::DimensionMismatch {
                    expected: first.len(),
                    actual: realization.len(),
                });
            }
        }
        self.realizations.push(realization);
        Ok(())
    }

    pub fn n_realizations(&self) -> usize {
        self.realizations.len()
    }

    /// Dimension of the estimated quantity, 0 if no realization was added
    pub fn dimension(&self) -> usize {
        self.realizations.first().map(|r| r.len()).unwrap_or(0)
    }

    /// Realizations stacked as rows: shape (n_realizations, dimension)
    pub fn as_matrix(&self) -> Array2<FloatValue> {
        let mut matrix = Array2::zeros((self.n_realizations(), self.dimension()));
        for (mut row, realization) in matrix.axis_iter_mut(Axis(0)).zip(&self.realizations) {
            row.assign(realization);
        }
        matrix
    }

    pub fn mean(&self) -> HwpcResult<Array1<FloatValue>> {
        self.as_matrix()
            .mean_axis(Axis(0))
            .ok_or_else(|| HwpcError::Error("No realization to estimate from".to_string()))
    }

    /// Unbiased sample variance of each component
    pub fn variance(&self) -> HwpcResult<Array1<FloatValue>> {
        if self.n_realizations() < 2 {
            return Err(HwpcError::Error(
                "At least two realizations are needed to estimate a variance".to_string(),
            ));
        }
        Ok(self.as_matrix().var_axis(Axis(0), 1.0))
    }

    /// Empirical percentile of each component, `p` in [0, 1]
    ///
    /// Uses the nearest-rank definition on the sorted realizations.
    pub fn percentile(&self, p: FloatValue) -> HwpcResult<Array1<FloatValue>> {
        if !(0.0..=1.0).contains(&p) {
            return Err(HwpcError::Error(format!(
                "Percentile must be within [0, 1], got {}",
                p
            )));
        }
        let n = self.n_realizations();
        if n == 0 {
            return Err(HwpcError::Error(
                "No realization to estimate from".to_string(),
            ));
        }
        // Guard against p * n landing just above an integer through rounding
        let rank = ((p * n as FloatValue - 1e-9).ceil().max(0.0) as usize).clamp(1, n) - 1;
        let matrix = self.as_matrix();
        Ok(matrix
            .axis_iter(Axis(1))
            .map(|column| {
                let mut values = column.to_vec();
                values.sort_by(|a, b| a.total_cmp(b));
                values[rank]
            })
            .collect())
    }

    /// Mean and two-sided empirical bounds at the given probability level
    pub fn confidence_interval(&self, probability: FloatValue) -> HwpcResult<ConfidenceInterval> {
        if !(0.0..1.0).contains(&probability) {
            return Err(HwpcError::Error(format!(
                "Confidence level must be within [0, 1), got {}",
                probability
            )));
        }
        let tail = (1.0 - probability) / 2.0;
        Ok(ConfidenceInterval {
            mean: self.mean()?,
            lower: self.percentile(tail)?,
            upper: self.percentile(1.0 - tail)?,
            probability,
        })
    }
}
