//! Min/max normalization between physical speeds and model units.
//!
//! The forecasting model consumes and produces values in [0, 1]. The
//! scaler's fitted parameters come from training-time historical data and
//! are loaded once, read-only.

use ndarray::{Array1, Array2};

use crate::error::PlanError;

/// Per-sensor-column affine scaler mapping raw mph into [0, 1] and back.
///
/// A global (single scale + offset) scaler is expressed as a one-column
/// fit applied to every column.
#[derive(Debug, Clone)]
pub struct MinMaxScaler {
    min: Array1<f64>,
    range: Array1<f64>,
}

impl MinMaxScaler {
    /// Scaler with explicit per-column minima and maxima.
    ///
    /// Columns where max <= min degenerate to a unit range so transform
    /// stays defined.
    pub fn new(min: Array1<f64>, max: Array1<f64>) -> Self {
        let range = (&max - &min).mapv(|r| if r > f64::EPSILON { r } else { 1.0 });
        Self { min, range }
    }

    /// Global scaler: one scale and offset applied to every sensor.
    pub fn global(min: f64, max: f64, n_columns: usize) -> Self {
        Self::new(
            Array1::from_elem(n_columns, min),
            Array1::from_elem(n_columns, max),
        )
    }

    /// Fits per-column minima and maxima from historical data.
    pub fn fit(data: &Array2<f64>) -> Self {
        let n_columns = data.ncols();
        let mut min = Array1::from_elem(n_columns, f64::INFINITY);
        let mut max = Array1::from_elem(n_columns, f64::NEG_INFINITY);

        for row in data.rows() {
            for (col, &value) in row.iter().enumerate() {
                if value < min[col] {
                    min[col] = value;
                }
                if value > max[col] {
                    max[col] = value;
                }
            }
        }

        Self::new(min, max)
    }

    pub fn n_columns(&self) -> usize {
        self.min.len()
    }

    /// Maps raw speeds into [0, 1]. Values outside the fitted range are
    /// clamped; normalized output outside the unit interval is a model
    /// contract violation and must never be produced here.
    pub fn transform(&self, raw: &Array2<f64>) -> Result<Array2<f64>, PlanError> {
        if raw.ncols() != self.n_columns() {
            return Err(PlanError::ShapeMismatch {
                expected: vec![raw.nrows(), self.n_columns()],
                actual: raw.shape().to_vec(),
            });
        }

        let mut out = raw.clone();
        for mut row in out.rows_mut() {
            for (col, value) in row.iter_mut().enumerate() {
                *value = ((*value - self.min[col]) / self.range[col]).clamp(0.0, 1.0);
            }
        }
        Ok(out)
    }

    /// Maps normalized values back to raw speed units. A width mismatch
    /// here is the recoverable denormalization failure callers degrade on.
    pub fn inverse_transform(&self, normalized: &Array2<f64>) -> Result<Array2<f64>, PlanError> {
        if normalized.ncols() != self.n_columns() {
            return Err(PlanError::DenormalizationFailed {
                fitted: self.n_columns(),
                actual: normalized.ncols(),
            });
        }

        let mut out = normalized.clone();
        for mut row in out.rows_mut() {
            for (col, value) in row.iter_mut().enumerate() {
                *value = *value * self.range[col] + self.min[col];
            }
        }
        Ok(out)
    }
}
