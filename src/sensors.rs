//! Sensor registry and geographic sensor lookup.
//!
//! Maps lat/lng coordinates onto the fixed grid of traffic sensors the
//! forecasting model was trained on. The registry is loaded once at
//! startup and never mutated afterwards; lookups are pure.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PlanError;
use crate::haversine;

/// A fixed point in the traffic-monitoring grid.
///
/// `index` is the stable position used to index model tensors and is
/// unique within `[0, n_sensors)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: u32,
    pub index: usize,
    pub lat: f64,
    pub lng: f64,
}

/// Registry record as loaded from metadata: identifier, tensor index and
/// position. Positions may come from a separate source than the id/index
/// pairs; the caller joins them before construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorRecord {
    pub id: u32,
    pub index: usize,
    pub lat: f64,
    pub lng: f64,
}

/// Immutable collection of sensors with id and index lookups.
#[derive(Debug, Clone)]
pub struct SensorRegistry {
    sensors: Vec<Sensor>,
}

impl SensorRegistry {
    /// Builds a registry from metadata records, validating that indices
    /// cover `[0, len)` exactly once and that ids are unique.
    pub fn from_records(records: Vec<SensorRecord>) -> Result<Self, PlanError> {
        let n = records.len();
        let mut sensors: Vec<Option<Sensor>> = vec![None; n];
        let mut seen_ids = std::collections::HashSet::with_capacity(n);

        for record in records {
            if record.index >= n {
                return Err(PlanError::InvalidRegistry(format!(
                    "sensor {} has index {} outside [0, {})",
                    record.id, record.index, n
                )));
            }
            if !seen_ids.insert(record.id) {
                return Err(PlanError::InvalidRegistry(format!(
                    "duplicate sensor id {}",
                    record.id
                )));
            }
            let slot = &mut sensors[record.index];
            if slot.is_some() {
                return Err(PlanError::InvalidRegistry(format!(
                    "duplicate sensor index {}",
                    record.index
                )));
            }
            *slot = Some(Sensor {
                id: record.id,
                index: record.index,
                lat: record.lat,
                lng: record.lng,
            });
        }

        // Every index slot filled exactly once implies the bijection.
        let sensors = sensors
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| PlanError::InvalidRegistry("index gap in records".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(sensors = sensors.len(), "sensor registry loaded");
        Ok(Self { sensors })
    }

    /// Synthetic evenly spaced grid over the PEMS Bay bounding box.
    ///
    /// Fallback for when authoritative sensor positions are unavailable.
    /// Positions are approximate; the id/index mapping is still valid for
    /// model tensor access.
    pub fn approximate_grid(n_sensors: usize) -> Self {
        const LAT_RANGE: (f64, f64) = (37.3, 38.0);
        const LNG_RANGE: (f64, f64) = (-122.6, -121.9);

        warn!(
            n_sensors,
            "no sensor metadata available, using approximate Bay Area grid"
        );

        let n_lat = ((n_sensors as f64 * 1.2).sqrt()) as usize;
        let n_lng = n_sensors.div_ceil(n_lat.max(1));

        let mut sensors = Vec::with_capacity(n_sensors);
        'outer: for i in 0..n_lat {
            for j in 0..n_lng {
                let index = sensors.len();
                if index >= n_sensors {
                    break 'outer;
                }
                let lat_t = if n_lat > 1 { i as f64 / (n_lat - 1) as f64 } else { 0.0 };
                let lng_t = if n_lng > 1 { j as f64 / (n_lng - 1) as f64 } else { 0.0 };
                sensors.push(Sensor {
                    id: (index + 1) as u32,
                    index,
                    lat: LAT_RANGE.0 + (LAT_RANGE.1 - LAT_RANGE.0) * lat_t,
                    lng: LNG_RANGE.0 + (LNG_RANGE.1 - LNG_RANGE.0) * lng_t,
                });
            }
        }

        info!(sensors = sensors.len(), "approximate sensor grid created");
        Self { sensors }
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn by_index(&self, index: usize) -> Option<&Sensor> {
        self.sensors.get(index)
    }

    pub fn by_id(&self, id: u32) -> Option<&Sensor> {
        self.sensors.iter().find(|sensor| sensor.id == id)
    }

    /// Up to `k` sensors ordered by ascending great-circle distance from
    /// the given point. Equidistant sensors are ordered by ascending id so
    /// lookups stay deterministic regardless of load order.
    pub fn nearest(&self, lat: f64, lng: f64, k: usize) -> Result<Vec<&Sensor>, PlanError> {
        if self.sensors.is_empty() {
            return Err(PlanError::EmptyRegistry);
        }

        let mut by_distance: Vec<(f64, &Sensor)> = self
            .sensors
            .iter()
            .map(|sensor| {
                let dist = haversine::distance_km((lat, lng), (sensor.lat, sensor.lng));
                (dist, sensor)
            })
            .collect();

        by_distance.sort_by(|a, b| {
            a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id))
        });

        Ok(by_distance
            .into_iter()
            .take(k)
            .map(|(_, sensor)| sensor)
            .collect())
    }

    /// Sensors along a route, one list per consecutive waypoint pair.
    ///
    /// Each segment is sampled at `samples_per_segment` evenly spaced
    /// points (endpoints included); the nearest sensor to each sample is
    /// taken and consecutive repeats within a segment are collapsed.
    pub fn route_sensors(
        &self,
        points: &[(f64, f64)],
        samples_per_segment: usize,
    ) -> Result<Vec<Vec<&Sensor>>, PlanError> {
        if self.sensors.is_empty() {
            return Err(PlanError::EmptyRegistry);
        }

        let mut segments = Vec::new();
        for pair in points.windows(2) {
            let samples = haversine::interpolate(pair[0], pair[1], samples_per_segment);

            let mut segment: Vec<&Sensor> = Vec::new();
            for (lat, lng) in samples {
                let nearest = self.nearest(lat, lng, 1)?;
                let sensor = nearest[0];
                if segment.last().is_none_or(|prev| prev.id != sensor.id) {
                    segment.push(sensor);
                }
            }
            segments.push(segment);
        }

        Ok(segments)
    }
}
