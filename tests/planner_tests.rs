//! End-to-end planner tests
//!
//! Exercise the optimize() operation over a small sensor grid with the
//! deterministic time-of-day history profile and the persistence model.

use traffic_planner::error::PlanError;
use traffic_planner::forecast::{ForecastAdapter, PersistenceModel};
use traffic_planner::history::WindowBuilder;
use traffic_planner::planner::{
    DurationUnit, Planner, PlannerConfig, TripRequest, Waypoint,
};
use traffic_planner::scaling::MinMaxScaler;
use traffic_planner::sensors::{SensorRecord, SensorRegistry};
use traffic_planner::traits::HistorySource;

use chrono::{DateTime, Duration, Utc};
use ndarray::Array2;

// ============================================================================
// Test Fixtures
// ============================================================================

const N_SENSORS: usize = 9;

/// History source reporting the same speed at every sensor and step.
/// Makes candidate scores depend only on geometry, so ranking outcomes
/// are exactly predictable.
#[derive(Clone)]
struct ConstantSpeed(f64);

impl HistorySource for ConstantSpeed {
    fn fetch(&self, _: DateTime<Utc>, steps: usize, n_sensors: usize) -> Option<Array2<f64>> {
        Some(Array2::from_elem((steps, n_sensors), self.0))
    }
}

fn bay_registry() -> SensorRegistry {
    // Compact grid spanning SF, Oakland and Berkeley.
    let mut records = Vec::new();
    let lats = [37.75, 37.82, 37.88];
    let lngs = [-122.45, -122.30, -122.20];
    for (i, &lat) in lats.iter().enumerate() {
        for (j, &lng) in lngs.iter().enumerate() {
            let index = i * lngs.len() + j;
            records.push(SensorRecord {
                id: (index + 1) as u32,
                index,
                lat,
                lng,
            });
        }
    }
    SensorRegistry::from_records(records).unwrap()
}

fn test_planner(config: PlannerConfig) -> Planner<PersistenceModel, ConstantSpeed> {
    let scaler = MinMaxScaler::global(0.0, 70.0, N_SENSORS);
    let adapter = ForecastAdapter::new(PersistenceModel::new(12, 12, N_SENSORS), scaler.clone());
    let windows = WindowBuilder::new(ConstantSpeed(55.0), None, scaler, 12, N_SENSORS);
    Planner::new(bay_registry(), adapter, windows, config).unwrap()
}

fn waypoint(id: &str, name: &str, lat: f64, lng: f64) -> Waypoint {
    Waypoint {
        id: id.to_string(),
        name: name.to_string(),
        lat,
        lng,
    }
}

fn bay_trip() -> Vec<Waypoint> {
    vec![
        waypoint("sf", "San Francisco", 37.7749, -122.4194),
        waypoint("oak", "Oakland", 37.8044, -122.2712),
        waypoint("berk", "Berkeley", 37.8715, -122.2730),
    ]
}

fn start_at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

fn request(waypoints: Vec<Waypoint>, start: &str, hours: u32) -> TripRequest {
    TripRequest {
        waypoints,
        start_time: start_at(start),
        duration: hours,
        duration_unit: DurationUnit::Hours,
    }
}

fn assert_permutation(order: &[usize], n: usize) {
    let mut sorted = order.to_vec();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..n).collect::<Vec<_>>(), "order {:?} is not a permutation", order);
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn three_waypoints_morning_trip() {
    let planner = test_planner(PlannerConfig::default());
    let route = planner
        .optimize(&request(bay_trip(), "2025-06-02T08:00:00Z", 8))
        .unwrap();

    assert_eq!(route.optimized_order.len(), 3);
    assert_permutation(&route.optimized_order, 3);

    // With a flat speed field, congestion is identical for every ordering
    // and the tie-break on travel time picks a geographically sensible
    // order: Oakland sits between San Francisco and Berkeley.
    assert_eq!(route.optimized_order[1], 1);

    assert_eq!(route.segments.len(), 2);
    assert_eq!(route.segments[0].id, "seg_0");
    assert!(route.total_travel_time > 0);
    assert!(!route.itinerary.is_empty());

    // First scheduled event is the departure from the first stop.
    let first_stop = &route.itinerary[0].stops[0];
    assert_eq!(first_stop.time, "08:00");
}

#[test]
fn optimized_order_is_permutation_for_various_sizes() {
    let planner = test_planner(PlannerConfig::default());
    let stops = [
        waypoint("a", "A", 37.75, -122.45),
        waypoint("b", "B", 37.80, -122.30),
        waypoint("c", "C", 37.85, -122.25),
        waypoint("d", "D", 37.88, -122.20),
    ];

    for n in 2..=4 {
        let route = planner
            .optimize(&request(stops[..n].to_vec(), "2025-06-02T10:00:00Z", 8))
            .unwrap();
        assert_permutation(&route.optimized_order, n);
    }
}

#[test]
fn single_waypoint_is_a_client_error() {
    let planner = test_planner(PlannerConfig::default());
    let result = planner.optimize(&request(
        vec![waypoint("sf", "San Francisco", 37.7749, -122.4194)],
        "2025-06-02T08:00:00Z",
        8,
    ));

    match result {
        Err(err @ PlanError::InsufficientWaypoints { got: 1 }) => {
            assert!(err.is_client_error());
        }
        other => panic!("expected InsufficientWaypoints, got {:?}", other),
    }
}

#[test]
fn waypoint_count_is_bounded() {
    let planner = test_planner(PlannerConfig::default());
    let many: Vec<Waypoint> = (0..9)
        .map(|i| {
            waypoint(
                &format!("wp{}", i),
                &format!("Stop {}", i),
                37.7 + 0.02 * i as f64,
                -122.4 + 0.02 * i as f64,
            )
        })
        .collect();

    let result = planner.optimize(&request(many, "2025-06-02T08:00:00Z", 8));
    match result {
        Err(err @ PlanError::TooManyWaypoints { got: 9, max: 8 }) => {
            assert!(err.is_client_error());
        }
        other => panic!("expected TooManyWaypoints, got {:?}", other),
    }
}

#[test]
fn empty_registry_is_fatal_at_construction() {
    let scaler = MinMaxScaler::global(0.0, 70.0, N_SENSORS);
    let adapter = ForecastAdapter::new(PersistenceModel::new(12, 12, N_SENSORS), scaler.clone());
    let windows = WindowBuilder::new(ConstantSpeed(55.0), None, scaler, 12, N_SENSORS);
    let registry = SensorRegistry::from_records(Vec::new()).unwrap();

    let result = Planner::new(registry, adapter, windows, PlannerConfig::default());
    assert!(matches!(result, Err(PlanError::EmptyRegistry)));
}

#[test]
fn registry_wider_than_model_grid_is_fatal_at_construction() {
    // A 9-sensor registry against a model trained on a 4-sensor grid
    // would index forecast rows out of bounds during scoring; the
    // mismatch must be rejected before any request is served.
    let narrow = 4;
    let scaler = MinMaxScaler::global(0.0, 70.0, narrow);
    let adapter = ForecastAdapter::new(PersistenceModel::new(12, 12, narrow), scaler.clone());
    let windows = WindowBuilder::new(ConstantSpeed(55.0), None, scaler, 12, narrow);

    let result = Planner::new(bay_registry(), adapter, windows, PlannerConfig::default());
    assert!(matches!(result, Err(PlanError::InvalidRegistry(_))));
}

#[test]
fn uncongested_route_keeps_requested_start() {
    let planner = test_planner(PlannerConfig::default());
    let start = "2025-06-02T13:00:00Z";
    let route = planner.optimize(&request(bay_trip(), start, 8)).unwrap();

    assert_eq!(route.recommended_start, start_at(start));
    assert!(route.warnings.is_empty());
}

#[test]
fn congested_route_shifts_recommended_start() {
    // Raising the reference free-flow speed pushes every congestion score
    // past the warning threshold without touching the forecast pipeline.
    let mut config = PlannerConfig::default();
    config.scoring.free_flow_mph = 400.0;
    let planner = test_planner(config);

    let start = "2025-06-02T08:00:00Z";
    let route = planner.optimize(&request(bay_trip(), start, 8)).unwrap();

    assert_eq!(
        route.recommended_start,
        start_at(start) - Duration::hours(1)
    );
    assert!(
        route
            .recommendations
            .iter()
            .any(|r| r.message.contains("starting earlier")),
        "expected a start-time recommendation"
    );
}

#[test]
fn heuristic_order_visits_every_stop() {
    let planner = test_planner(PlannerConfig::default());
    let order = planner.heuristic_order(&bay_trip());
    assert_permutation(&order, 3);
    assert_eq!(order[0], 0);
}
