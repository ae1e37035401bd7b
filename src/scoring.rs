//! Turns per-sensor speed forecasts into segment-level traffic metrics.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::forecast::{Forecast, SpeedUnit};
use crate::sensors::Sensor;

/// Coarse traffic classification derived from predicted speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLevel {
    Light,
    Moderate,
    Heavy,
}

impl std::fmt::Display for TrafficLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TrafficLevel::Light => "light",
            TrafficLevel::Moderate => "moderate",
            TrafficLevel::Heavy => "heavy",
        };
        f.write_str(label)
    }
}

/// Thresholds and reference speeds for scoring.
///
/// The defaults reproduce the observed heuristics (heavy below 35 mph,
/// moderate below 50, free flow at 70); deployments may recalibrate.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub heavy_below_mph: f64,
    pub moderate_below_mph: f64,
    pub free_flow_mph: f64,
    /// Wall-clock minutes between forecast steps.
    pub step_minutes: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            heavy_below_mph: 35.0,
            moderate_below_mph: 50.0,
            free_flow_mph: 70.0,
            step_minutes: 5,
        }
    }
}

impl ScoringConfig {
    pub fn classify(&self, speed_mph: f64) -> TrafficLevel {
        if speed_mph < self.heavy_below_mph {
            TrafficLevel::Heavy
        } else if speed_mph < self.moderate_below_mph {
            TrafficLevel::Moderate
        } else {
            TrafficLevel::Light
        }
    }

    /// Congestion in [0, 1]: 0 is free flow, 1 is fully congested.
    /// Clamped so corrupted inputs (negative or outsized speeds) can
    /// never leak out-of-range scores into route aggregation.
    pub fn congestion(&self, avg_speed_mph: f64) -> f64 {
        (1.0 - avg_speed_mph / self.free_flow_mph).clamp(0.0, 1.0)
    }
}

/// One predicted reading: a sensor, a future time step and its speed.
#[derive(Debug, Clone, Serialize)]
pub struct PointForecast {
    pub sensor_id: u32,
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
    pub step: usize,
    pub speed_mph: f64,
    pub level: TrafficLevel,
}

/// Aggregated traffic metrics for one route segment.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentScore {
    pub avg_speed_mph: f64,
    pub min_speed_mph: f64,
    pub level: TrafficLevel,
    pub congestion_score: f64,
    pub points: Vec<PointForecast>,
}

/// Scores one segment from a forecast restricted to the segment's sensors.
///
/// Forecasts that stayed in normalized units (denormalization degrade)
/// are rescaled by the reference free-flow speed into approximate mph
/// before classification.
pub fn score_segment(
    forecast: &Forecast,
    sensors: &[&Sensor],
    segment_start: DateTime<Utc>,
    config: &ScoringConfig,
) -> SegmentScore {
    let rescale = match forecast.unit {
        SpeedUnit::Mph => 1.0,
        SpeedUnit::Normalized => config.free_flow_mph,
    };

    let mut points = Vec::with_capacity(forecast.values.nrows() * sensors.len());
    let mut sum = 0.0;
    let mut min_speed = f64::INFINITY;

    for (step, row) in forecast.values.rows().into_iter().enumerate() {
        let timestamp = segment_start + Duration::minutes(step as i64 * config.step_minutes);
        for sensor in sensors {
            let speed_mph = row[sensor.index] * rescale;
            sum += speed_mph;
            if speed_mph < min_speed {
                min_speed = speed_mph;
            }
            points.push(PointForecast {
                sensor_id: sensor.id,
                lat: sensor.lat,
                lng: sensor.lng,
                timestamp,
                step,
                speed_mph,
                level: config.classify(speed_mph),
            });
        }
    }

    let avg_speed = if points.is_empty() {
        0.0
    } else {
        sum / points.len() as f64
    };
    if !min_speed.is_finite() {
        min_speed = 0.0;
    }

    SegmentScore {
        avg_speed_mph: avg_speed,
        min_speed_mph: min_speed,
        level: config.classify(avg_speed),
        congestion_score: config.congestion(avg_speed),
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn sensor(id: u32, index: usize) -> Sensor {
        Sensor {
            id,
            index,
            lat: 37.5,
            lng: -122.2,
        }
    }

    fn start() -> DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339("2025-06-02T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_classify_thresholds() {
        let config = ScoringConfig::default();
        assert_eq!(config.classify(20.0), TrafficLevel::Heavy);
        assert_eq!(config.classify(34.9), TrafficLevel::Heavy);
        assert_eq!(config.classify(35.0), TrafficLevel::Moderate);
        assert_eq!(config.classify(49.9), TrafficLevel::Moderate);
        assert_eq!(config.classify(50.0), TrafficLevel::Light);
        assert_eq!(config.classify(65.0), TrafficLevel::Light);
    }

    #[test]
    fn test_congestion_clamped_for_pathological_speeds() {
        let config = ScoringConfig::default();
        assert_eq!(config.congestion(-50.0), 1.0);
        assert_eq!(config.congestion(0.0), 1.0);
        assert_eq!(config.congestion(700.0), 0.0);
        let mid = config.congestion(35.0);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_score_segment_averages_selected_sensors_only() {
        // Sensor 0 at 60 mph, sensor 1 at 20 mph, sensor 2 at 5 mph; the
        // segment only touches sensors 0 and 1.
        let mut values = Array2::zeros((2, 3));
        values.column_mut(0).fill(60.0);
        values.column_mut(1).fill(20.0);
        values.column_mut(2).fill(5.0);
        let forecast = Forecast {
            values,
            unit: SpeedUnit::Mph,
        };

        let s0 = sensor(1, 0);
        let s1 = sensor(2, 1);
        let score = score_segment(&forecast, &[&s0, &s1], start(), &ScoringConfig::default());

        assert!((score.avg_speed_mph - 40.0).abs() < 1e-9);
        assert!((score.min_speed_mph - 20.0).abs() < 1e-9);
        assert_eq!(score.level, TrafficLevel::Moderate);
        assert_eq!(score.points.len(), 4);
    }

    #[test]
    fn test_point_timestamps_advance_by_step_minutes() {
        let forecast = Forecast {
            values: Array2::from_elem((3, 1), 55.0),
            unit: SpeedUnit::Mph,
        };
        let s = sensor(1, 0);
        let score = score_segment(&forecast, &[&s], start(), &ScoringConfig::default());
        assert_eq!(score.points[0].timestamp, start());
        assert_eq!(score.points[2].timestamp, start() + Duration::minutes(10));
    }

    #[test]
    fn test_normalized_forecast_rescaled_by_free_flow() {
        let forecast = Forecast {
            values: Array2::from_elem((1, 1), 0.5),
            unit: SpeedUnit::Normalized,
        };
        let s = sensor(1, 0);
        let score = score_segment(&forecast, &[&s], start(), &ScoringConfig::default());
        assert!((score.avg_speed_mph - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_sensor_list_scores_fully_congested() {
        let forecast = Forecast {
            values: Array2::from_elem((2, 1), 60.0),
            unit: SpeedUnit::Mph,
        };
        let score = score_segment(&forecast, &[], start(), &ScoringConfig::default());
        assert_eq!(score.avg_speed_mph, 0.0);
        assert_eq!(score.congestion_score, 1.0);
    }
}
