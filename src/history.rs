//! Historical speed windows for the forecasting model.
//!
//! Real readings come from a remote time-series store; when that store
//! cannot produce a usable window, a deterministic time-of-day profile
//! stands in (clearly flagged in the logs, never silent zeros).

use chrono::{DateTime, Timelike, Utc};
use ndarray::Array2;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::PlanError;
use crate::scaling::MinMaxScaler;
use crate::traits::HistorySource;

/// Connection settings for the remote history store.
#[derive(Debug, Clone)]
pub struct HistoryStoreConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for HistoryStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8600".to_string(),
            timeout_secs: 10,
        }
    }
}

/// HTTP client for a time-series store of per-sensor speed readings.
///
/// Transport or decode failures degrade to `None` so the window builder
/// can apply its fallback policy; the failure itself is logged here.
#[derive(Debug, Clone)]
pub struct RemoteHistoryStore {
    config: HistoryStoreConfig,
    client: reqwest::blocking::Client,
}

impl RemoteHistoryStore {
    pub fn new(config: HistoryStoreConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

impl HistorySource for RemoteHistoryStore {
    fn fetch(
        &self,
        anchor: DateTime<Utc>,
        steps: usize,
        n_sensors: usize,
    ) -> Option<Array2<f64>> {
        let url = format!(
            "{}/speeds?end={}&steps={}",
            self.config.base_url,
            anchor.timestamp(),
            steps
        );

        let response = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<SpeedHistoryResponse>());

        let rows = match response {
            Ok(body) => body.speeds,
            Err(err) => {
                warn!(error = %err, "history store request failed");
                return None;
            }
        };

        if rows.len() != steps || rows.iter().any(|row| row.len() != n_sensors) {
            warn!(
                rows = rows.len(),
                expected_steps = steps,
                "history store returned a malformed window"
            );
            return None;
        }

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((steps, n_sensors), flat).ok()
    }
}

#[derive(Debug, Deserialize)]
struct SpeedHistoryResponse {
    speeds: Vec<Vec<f64>>,
}

/// Deterministic time-of-day speed profile.
///
/// Stand-in for real historical data: rush hours run slower, off-peak
/// faster, with a sinusoidal drift across the window and a fixed
/// per-sensor offset. Identical inputs always produce identical windows.
#[derive(Debug, Clone)]
pub struct TimeOfDayProfile {
    /// Upper clamp for generated speeds in mph.
    pub max_speed_mph: f64,
}

impl Default for TimeOfDayProfile {
    fn default() -> Self {
        Self { max_speed_mph: 70.0 }
    }
}

impl TimeOfDayProfile {
    fn base_and_variation(hour: u32) -> (f64, f64) {
        if (7..=9).contains(&hour) || (16..=19).contains(&hour) {
            (40.0, 10.0)
        } else {
            (60.0, 15.0)
        }
    }

    /// Fixed per-sensor spread in [-5, 5] mph, stable across calls.
    fn sensor_offset(index: usize) -> f64 {
        ((index * 37) % 11) as f64 - 5.0
    }
}

impl HistorySource for TimeOfDayProfile {
    fn fetch(
        &self,
        anchor: DateTime<Utc>,
        steps: usize,
        n_sensors: usize,
    ) -> Option<Array2<f64>> {
        let (base, variation) = Self::base_and_variation(anchor.hour());

        let window = Array2::from_shape_fn((steps, n_sensors), |(step, sensor)| {
            let time_factor = (step as f64 / steps as f64 * std::f64::consts::PI).sin();
            let speed = base + variation * time_factor + Self::sensor_offset(sensor);
            speed.clamp(0.0, self.max_speed_mph)
        });

        Some(window)
    }
}

/// Builds the normalized input window the forecast adapter consumes.
///
/// Fetches raw speeds from the primary source, rejects malformed or
/// non-finite windows before they can reach the model, applies the
/// fallback profile when configured, and normalizes into [0, 1].
#[derive(Debug, Clone)]
pub struct WindowBuilder<H> {
    source: H,
    fallback: Option<TimeOfDayProfile>,
    scaler: MinMaxScaler,
    steps: usize,
    n_sensors: usize,
}

impl<H: HistorySource> WindowBuilder<H> {
    pub fn new(
        source: H,
        fallback: Option<TimeOfDayProfile>,
        scaler: MinMaxScaler,
        steps: usize,
        n_sensors: usize,
    ) -> Self {
        Self {
            source,
            fallback,
            scaler,
            steps,
            n_sensors,
        }
    }

    /// Normalized `(steps, n_sensors)` window covering the interval
    /// immediately preceding `anchor`.
    pub fn build(&self, anchor: DateTime<Utc>) -> Result<Array2<f64>, PlanError> {
        let raw = match self.source.fetch(anchor, self.steps, self.n_sensors) {
            Some(window) if Self::usable(&window, self.steps, self.n_sensors) => Some(window),
            Some(_) => {
                warn!("discarding history window with bad shape or non-finite values");
                None
            }
            None => None,
        };

        let raw = match raw {
            Some(window) => window,
            None => {
                let fallback = self.fallback.as_ref().ok_or(PlanError::InsufficientHistory {
                    required: self.steps,
                    available: 0,
                })?;
                warn!(anchor = %anchor, "history unavailable, using time-of-day profile");
                fallback
                    .fetch(anchor, self.steps, self.n_sensors)
                    .ok_or(PlanError::InsufficientHistory {
                        required: self.steps,
                        available: 0,
                    })?
            }
        };

        debug!(steps = self.steps, n_sensors = self.n_sensors, "history window assembled");
        self.scaler.transform(&raw)
    }

    fn usable(window: &Array2<f64>, steps: usize, n_sensors: usize) -> bool {
        window.dim() == (steps, n_sensors) && window.iter().all(|value| value.is_finite())
    }
}
