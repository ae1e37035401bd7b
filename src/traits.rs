//! Seams to the planner's external collaborators.
//!
//! The forecasting model and the historical speed store are opaque to the
//! core: they are specified here at the interface boundary and injected
//! at construction time. Both are loaded once and treated as immutable,
//! so implementations only need `&self`.

use chrono::{DateTime, Utc};
use ndarray::Array2;

/// A pretrained sequence model over the sensor grid.
///
/// `predict` maps a normalized window of the last `input_steps`
/// observations onto `horizon` future steps, still in normalized units.
/// Deterministic for a fixed model version; no side effects. Shape
/// contracts are enforced by the forecast adapter, not here.
pub trait ForecastModel: Send + Sync {
    /// Time steps the model expects in its input window.
    fn input_steps(&self) -> usize;

    /// Future time steps predicted per call.
    fn horizon(&self) -> usize;

    /// Width of the sensor grid the model was trained on.
    fn n_sensors(&self) -> usize;

    /// Predicts `(horizon, n_sensors)` normalized speeds from an
    /// `(input_steps, n_sensors)` normalized window.
    fn predict(&self, window: &Array2<f64>) -> Array2<f64>;
}

/// Source of historical per-sensor speed readings.
///
/// Returns raw physical speeds (mph), newest reading last, covering the
/// `steps` intervals immediately preceding `anchor`. `None` means the
/// store could not produce a usable window; the window builder decides
/// whether a fallback applies.
pub trait HistorySource: Send + Sync {
    fn fetch(&self, anchor: DateTime<Utc>, steps: usize, n_sensors: usize)
    -> Option<Array2<f64>>;
}
