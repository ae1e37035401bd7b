//! Adapter between the planner and the opaque forecasting model.
//!
//! This is the only consumer of the model and the only place its shape
//! contracts are enforced: a window that does not match the model's fixed
//! expectations fails with the expected and actual shapes, never a silent
//! reshape or truncation.

use ndarray::{Array2, Array3, ArrayD, Axis};
use tracing::warn;

use crate::error::PlanError;
use crate::scaling::MinMaxScaler;
use crate::traits::ForecastModel;

/// Units of the values carried by a [`Forecast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedUnit {
    /// Physical miles per hour.
    Mph,
    /// Model-space [0, 1]; denormalization was requested but failed, and
    /// the caller should fall back to normalized-space metrics.
    Normalized,
}

/// Predicted `(horizon, n_sensors)` speeds for one input window.
#[derive(Debug, Clone)]
pub struct Forecast {
    pub values: Array2<f64>,
    pub unit: SpeedUnit,
}

/// Batched counterpart of [`Forecast`] with the rank of the input
/// preserved: rank-2 in, rank-2 out; rank-3 in, rank-3 out.
#[derive(Debug, Clone)]
pub struct DynForecast {
    pub values: ArrayD<f64>,
    pub unit: SpeedUnit,
}

pub struct ForecastAdapter<M> {
    model: M,
    scaler: MinMaxScaler,
}

impl<M: ForecastModel> ForecastAdapter<M> {
    pub fn new(model: M, scaler: MinMaxScaler) -> Self {
        Self { model, scaler }
    }

    pub fn input_steps(&self) -> usize {
        self.model.input_steps()
    }

    pub fn horizon(&self) -> usize {
        self.model.horizon()
    }

    pub fn n_sensors(&self) -> usize {
        self.model.n_sensors()
    }

    /// Predicts future speeds for a single normalized window.
    ///
    /// With `denormalize`, applies the inverse of the training-time
    /// normalization; if the scaler is incompatible the call still
    /// succeeds and the forecast is flagged [`SpeedUnit::Normalized`].
    pub fn predict(&self, window: &Array2<f64>, denormalize: bool) -> Result<Forecast, PlanError> {
        let expected_in = vec![self.model.input_steps(), self.model.n_sensors()];
        let actual_in = window.shape().to_vec();
        if actual_in != expected_in {
            return Err(PlanError::ShapeMismatch {
                expected: expected_in,
                actual: actual_in,
            });
        }

        let predicted = self.model.predict(window);

        let expected_out = vec![self.model.horizon(), self.model.n_sensors()];
        let actual_out = predicted.shape().to_vec();
        if actual_out != expected_out {
            return Err(PlanError::ShapeMismatch {
                expected: expected_out,
                actual: actual_out,
            });
        }

        if !denormalize {
            return Ok(Forecast {
                values: predicted,
                unit: SpeedUnit::Normalized,
            });
        }

        match self.scaler.inverse_transform(&predicted) {
            Ok(values) => Ok(Forecast {
                values,
                unit: SpeedUnit::Mph,
            }),
            Err(err) => {
                warn!(error = %err, "denormalization failed, returning normalized speeds");
                Ok(Forecast {
                    values: predicted,
                    unit: SpeedUnit::Normalized,
                })
            }
        }
    }

    /// Predicts for rank-2 (single window) or rank-3 (batched) input.
    ///
    /// The batch dimension is inferred from the rank and stripped from
    /// the output when the caller supplied a single window.
    pub fn predict_dyn(
        &self,
        input: &ArrayD<f64>,
        denormalize: bool,
    ) -> Result<DynForecast, PlanError> {
        match input.ndim() {
            2 => {
                let window = input
                    .view()
                    .into_dimensionality::<ndarray::Ix2>()
                    .map_err(|_| self.input_shape_mismatch(input))?
                    .to_owned();
                let forecast = self.predict(&window, denormalize)?;
                Ok(DynForecast {
                    values: forecast.values.into_dyn(),
                    unit: forecast.unit,
                })
            }
            3 => {
                let batch = input
                    .view()
                    .into_dimensionality::<ndarray::Ix3>()
                    .map_err(|_| self.input_shape_mismatch(input))?;

                let mut out = Array3::zeros((
                    batch.len_of(Axis(0)),
                    self.model.horizon(),
                    self.model.n_sensors(),
                ));
                // Denormalization failure degrades the whole batch: the
                // scaler either fits the grid width or it does not.
                let mut unit = SpeedUnit::Mph;
                for (i, window) in batch.axis_iter(Axis(0)).enumerate() {
                    let forecast = self.predict(&window.to_owned(), denormalize)?;
                    if forecast.unit == SpeedUnit::Normalized {
                        unit = SpeedUnit::Normalized;
                    }
                    out.index_axis_mut(Axis(0), i).assign(&forecast.values);
                }
                if !denormalize {
                    unit = SpeedUnit::Normalized;
                }
                Ok(DynForecast {
                    values: out.into_dyn(),
                    unit,
                })
            }
            _ => Err(self.input_shape_mismatch(input)),
        }
    }

    fn input_shape_mismatch(&self, input: &ArrayD<f64>) -> PlanError {
        PlanError::ShapeMismatch {
            expected: vec![self.model.input_steps(), self.model.n_sensors()],
            actual: input.shape().to_vec(),
        }
    }
}

/// Naive persistence baseline: repeats the final observed step across the
/// whole horizon. Reference implementation of the model seam; the trained
/// sequence model lives outside this crate.
#[derive(Debug, Clone)]
pub struct PersistenceModel {
    pub input_steps: usize,
    pub horizon: usize,
    pub n_sensors: usize,
}

impl PersistenceModel {
    pub fn new(input_steps: usize, horizon: usize, n_sensors: usize) -> Self {
        Self {
            input_steps,
            horizon,
            n_sensors,
        }
    }
}

impl Default for PersistenceModel {
    fn default() -> Self {
        Self::new(12, 12, 325)
    }
}

impl ForecastModel for PersistenceModel {
    fn input_steps(&self) -> usize {
        self.input_steps
    }

    fn horizon(&self) -> usize {
        self.horizon
    }

    fn n_sensors(&self) -> usize {
        self.n_sensors
    }

    fn predict(&self, window: &Array2<f64>) -> Array2<f64> {
        let last = window.row(window.nrows() - 1);
        let mut out = Array2::zeros((self.horizon, self.n_sensors));
        for mut row in out.rows_mut() {
            row.assign(&last);
        }
        out
    }
}
