//! Top-level route planner facade.
//!
//! Owns the process-wide immutable resources (sensor registry, forecast
//! adapter, window builder), injected once at construction. Requests are
//! evaluated to completion one at a time; nothing here mutates shared
//! state, so concurrent callers can share one planner.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PlanError;
use crate::forecast::ForecastAdapter;
use crate::history::WindowBuilder;
use crate::itinerary::{
    self, ItineraryDay, ItineraryOptions, Recommendation, Warning,
};
use crate::scoring::{ScoringConfig, TrafficLevel};
use crate::search::{self, RouteEvaluator, SearchOptions};
use crate::sensors::SensorRegistry;
use crate::traits::{ForecastModel, HistorySource};

/// A user-supplied stop on the trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Hours,
    Days,
}

/// One route-optimization request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRequest {
    pub waypoints: Vec<Waypoint>,
    pub start_time: DateTime<Utc>,
    pub duration: u32,
    pub duration_unit: DurationUnit,
}

impl TripRequest {
    pub fn duration_hours(&self) -> f64 {
        match self.duration_unit {
            DurationUnit::Hours => f64::from(self.duration),
            DurationUnit::Days => f64::from(self.duration) * 24.0,
        }
    }
}

/// One leg of the winning route, in wire form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSegmentSummary {
    pub id: String,
    pub from_location: Waypoint,
    pub to_location: Waypoint,
    /// Minutes.
    pub predicted_travel_time: i64,
    pub traffic_condition: TrafficLevel,
    pub congestion_score: f64,
}

/// The optimized route returned to the caller.
///
/// `optimized_order` is always a permutation of `0..n` over the request's
/// waypoint list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedRoute {
    pub optimized_order: Vec<usize>,
    pub recommended_start: DateTime<Utc>,
    /// Minutes.
    pub total_travel_time: i64,
    pub warnings: Vec<Warning>,
    pub recommendations: Vec<Recommendation>,
    pub itinerary: Vec<ItineraryDay>,
    pub segments: Vec<RouteSegmentSummary>,
}

/// All planner tunables with their documented defaults.
#[derive(Debug, Clone, Default)]
pub struct PlannerConfig {
    pub scoring: ScoringConfig,
    pub search: SearchOptions,
    pub itinerary: ItineraryOptions,
}

pub struct Planner<M, H> {
    registry: SensorRegistry,
    adapter: ForecastAdapter<M>,
    windows: WindowBuilder<H>,
    config: PlannerConfig,
}

impl<M: ForecastModel, H: HistorySource> Planner<M, H> {
    /// Builds a planner from its already-loaded resources.
    ///
    /// An empty registry, or a registry whose size disagrees with the
    /// model's grid width, is a startup failure: serving predictions
    /// from mismatched resources would index forecasts out of bounds.
    pub fn new(
        registry: SensorRegistry,
        adapter: ForecastAdapter<M>,
        windows: WindowBuilder<H>,
        config: PlannerConfig,
    ) -> Result<Self, PlanError> {
        if registry.is_empty() {
            return Err(PlanError::EmptyRegistry);
        }
        if registry.len() != adapter.n_sensors() {
            return Err(PlanError::InvalidRegistry(format!(
                "registry has {} sensors but the model grid is {} wide",
                registry.len(),
                adapter.n_sensors()
            )));
        }
        Ok(Self {
            registry,
            adapter,
            windows,
            config,
        })
    }

    /// Finds the minimum-congestion waypoint ordering and assembles the
    /// full schedule for it.
    pub fn optimize(&self, request: &TripRequest) -> Result<OptimizedRoute, PlanError> {
        info!(
            waypoints = request.waypoints.len(),
            start = %request.start_time,
            "optimizing route"
        );

        let coords: Vec<(f64, f64)> = request
            .waypoints
            .iter()
            .map(|wp| (wp.lat, wp.lng))
            .collect();

        let evaluator = RouteEvaluator {
            registry: &self.registry,
            windows: &self.windows,
            adapter: &self.adapter,
            scoring: &self.config.scoring,
            options: &self.config.search,
        };
        let outcome = search::search(
            &evaluator,
            &coords,
            request.start_time,
            request.duration_hours(),
        )?;
        let best = outcome.best();

        let ordered_names: Vec<String> = best
            .order
            .iter()
            .map(|&i| request.waypoints[i].name.clone())
            .collect();

        let itinerary_days = itinerary::build_itinerary(
            &ordered_names,
            best,
            request.start_time,
            &self.config.itinerary,
        );
        let warnings = itinerary::route_warnings(&ordered_names, best, &self.config.itinerary);
        let recommendations = itinerary::route_recommendations(&outcome, &self.config.itinerary);

        // Shift the suggested departure earlier when the whole route is
        // congested above the warning threshold.
        let recommended_start =
            if best.congestion_score > self.config.itinerary.congestion_threshold {
                request.start_time - Duration::hours(1)
            } else {
                request.start_time
            };

        let segments = best
            .segments
            .iter()
            .enumerate()
            .map(|(idx, segment)| RouteSegmentSummary {
                id: format!("seg_{}", idx),
                from_location: request.waypoints[segment.from].clone(),
                to_location: request.waypoints[segment.to].clone(),
                predicted_travel_time: segment.travel_minutes,
                traffic_condition: segment.score.level,
                congestion_score: segment.score.congestion_score,
            })
            .collect();

        Ok(OptimizedRoute {
            optimized_order: best.order.clone(),
            recommended_start,
            total_travel_time: (best.travel_time_hours * 60.0).round() as i64,
            warnings,
            recommendations,
            itinerary: itinerary_days,
            segments,
        })
    }

    /// Traffic-unaware nearest-neighbor ordering; the cheap fallback when
    /// the exhaustive forecast comparison is not warranted.
    pub fn heuristic_order(&self, waypoints: &[Waypoint]) -> Vec<usize> {
        let coords: Vec<(f64, f64)> = waypoints.iter().map(|wp| (wp.lat, wp.lng)).collect();
        search::nearest_neighbor_order(&coords, 0)
    }
}
