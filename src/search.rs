//! Exhaustive route-order search over traffic forecasts.
//!
//! Every permutation of the waypoint set is scored; no pruning. Waypoint
//! counts stay small (human trip planning), so n! evaluation is tractable
//! and finds the true minimum-congestion order under the scoring model.
//! Candidates are independent of each other and evaluated in parallel.

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::PlanError;
use crate::forecast::ForecastAdapter;
use crate::haversine;
use crate::history::WindowBuilder;
use crate::scoring::{self, ScoringConfig, SegmentScore, TrafficLevel};
use crate::sensors::SensorRegistry;
use crate::traits::{ForecastModel, HistorySource};

/// Sentinel travel time for candidates whose average speed is ~zero.
/// Ranks such candidates last without dividing by zero.
pub const INFEASIBLE_TRAVEL_TIME_HOURS: f64 = 999.0;

const MIN_AVG_SPEED_MPH: f64 = 1e-3;

/// Tunables for the permutation search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Interpolated sample points per segment for sensor mapping.
    pub samples_per_segment: usize,
    /// How far the running clock advances per segment when anchoring
    /// historical windows.
    pub segment_advance_minutes: i64,
    /// Hard cap on waypoints; n! forecast calls must stay tractable.
    pub max_waypoints: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            samples_per_segment: 5,
            segment_advance_minutes: 15,
            max_waypoints: 8,
        }
    }
}

/// One scored leg of a candidate route.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredSegment {
    /// Original waypoint index the leg departs from.
    pub from: usize,
    /// Original waypoint index the leg arrives at.
    pub to: usize,
    pub distance_miles: f64,
    /// Predicted minutes for the leg at its average forecast speed.
    pub travel_minutes: i64,
    pub score: SegmentScore,
}

/// One fully scored waypoint ordering.
#[derive(Debug, Clone, Serialize)]
pub struct RouteCandidate {
    /// Indices into the caller's waypoint list.
    pub order: Vec<usize>,
    pub segments: Vec<ScoredSegment>,
    pub total_distance_miles: f64,
    pub avg_speed_mph: f64,
    pub travel_time_hours: f64,
    pub congestion_score: f64,
    pub heavy_segments: usize,
    pub fits_duration: bool,
    pub is_optimal: bool,
}

/// A permutation that could not be scored, with the reason.
#[derive(Debug, Clone)]
pub struct FailedCandidate {
    pub order: Vec<usize>,
    pub error: PlanError,
}

/// Ranked search result: best candidate first, plus the failures that
/// were isolated along the way.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub candidates: Vec<RouteCandidate>,
    pub failures: Vec<FailedCandidate>,
}

impl SearchOutcome {
    pub fn best(&self) -> &RouteCandidate {
        // Non-empty by construction: search fails with NoViableRoute
        // before an empty outcome can be built.
        &self.candidates[0]
    }
}

/// Scores individual orderings against the forecast pipeline.
pub struct RouteEvaluator<'a, M, H> {
    pub registry: &'a SensorRegistry,
    pub windows: &'a WindowBuilder<H>,
    pub adapter: &'a ForecastAdapter<M>,
    pub scoring: &'a ScoringConfig,
    pub options: &'a SearchOptions,
}

impl<M: ForecastModel, H: HistorySource> RouteEvaluator<'_, M, H> {
    /// Scores one ordering of the waypoint coordinates.
    ///
    /// The historical window for each segment is anchored at a running
    /// clock that advances by a fixed duration per segment.
    pub fn evaluate(
        &self,
        order: &[usize],
        coords: &[(f64, f64)],
        start_time: DateTime<Utc>,
        duration_hours: f64,
    ) -> Result<RouteCandidate, PlanError> {
        let ordered: Vec<(f64, f64)> = order.iter().map(|&i| coords[i]).collect();
        let segment_sensors = self
            .registry
            .route_sensors(&ordered, self.options.samples_per_segment)?;

        let mut clock = start_time;
        let mut segments = Vec::with_capacity(segment_sensors.len());
        for (i, sensors) in segment_sensors.iter().enumerate() {
            let window = self.windows.build(clock)?;
            let forecast = self.adapter.predict(&window, true)?;
            let score = scoring::score_segment(&forecast, sensors, clock, self.scoring);

            let distance_miles =
                haversine::km_to_miles(haversine::distance_km(ordered[i], ordered[i + 1]));
            let travel_minutes = if score.avg_speed_mph > MIN_AVG_SPEED_MPH {
                (distance_miles / score.avg_speed_mph * 60.0).round() as i64
            } else {
                (INFEASIBLE_TRAVEL_TIME_HOURS * 60.0) as i64
            };

            segments.push(ScoredSegment {
                from: order[i],
                to: order[i + 1],
                distance_miles,
                travel_minutes,
                score,
            });
            clock += Duration::minutes(self.options.segment_advance_minutes);
        }

        let total_distance_miles = haversine::route_distance_miles(&ordered);
        let avg_speed_mph = mean(segments.iter().map(|s| s.score.avg_speed_mph));
        let congestion_score = mean(segments.iter().map(|s| s.score.congestion_score));
        let heavy_segments = segments
            .iter()
            .filter(|s| s.score.level == TrafficLevel::Heavy)
            .count();

        let travel_time_hours = if avg_speed_mph > MIN_AVG_SPEED_MPH {
            total_distance_miles / avg_speed_mph
        } else {
            INFEASIBLE_TRAVEL_TIME_HOURS
        };

        debug!(
            order = ?order,
            congestion = congestion_score,
            travel_time_hours,
            "candidate evaluated"
        );

        Ok(RouteCandidate {
            order: order.to_vec(),
            segments,
            total_distance_miles,
            avg_speed_mph,
            travel_time_hours,
            congestion_score,
            heavy_segments,
            fits_duration: travel_time_hours <= duration_hours,
            is_optimal: false,
        })
    }
}

/// Evaluates every ordering of `coords` and ranks the survivors by
/// (congestion ascending, travel time ascending).
///
/// A single candidate's failure is recorded and excluded from ranking;
/// the search only fails outright when no candidate survives.
pub fn search<M: ForecastModel, H: HistorySource>(
    evaluator: &RouteEvaluator<'_, M, H>,
    coords: &[(f64, f64)],
    start_time: DateTime<Utc>,
    duration_hours: f64,
) -> Result<SearchOutcome, PlanError> {
    let n = coords.len();
    if n < 2 {
        return Err(PlanError::InsufficientWaypoints { got: n });
    }
    if n > evaluator.options.max_waypoints {
        return Err(PlanError::TooManyWaypoints {
            got: n,
            max: evaluator.options.max_waypoints,
        });
    }

    let orders = permutations(n);
    info!(
        waypoints = n,
        permutations = orders.len(),
        "comparing route permutations"
    );

    let results: Vec<Result<RouteCandidate, PlanError>> = orders
        .par_iter()
        .map(|order| evaluator.evaluate(order, coords, start_time, duration_hours))
        .collect();

    let mut candidates = Vec::new();
    let mut failures = Vec::new();
    for (order, result) in orders.into_iter().zip(results) {
        match result {
            Ok(candidate) => candidates.push(candidate),
            Err(error) => failures.push(FailedCandidate { order, error }),
        }
    }

    if candidates.is_empty() {
        return Err(PlanError::NoViableRoute {
            attempted: failures.len(),
        });
    }

    // Lexicographic rank: among equally congested routes, prefer the
    // faster one. Stable sort keeps enumeration order on full ties.
    candidates.sort_by(|a, b| {
        a.congestion_score
            .total_cmp(&b.congestion_score)
            .then(a.travel_time_hours.total_cmp(&b.travel_time_hours))
    });
    candidates[0].is_optimal = true;

    Ok(SearchOutcome {
        candidates,
        failures,
    })
}

/// All orderings of `0..n` in lexicographic order.
pub fn permutations(n: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(n);
    let mut used = vec![false; n];
    extend(&mut current, &mut used, n, &mut out);
    out
}

fn extend(current: &mut Vec<usize>, used: &mut [bool], n: usize, out: &mut Vec<Vec<usize>>) {
    if current.len() == n {
        out.push(current.clone());
        return;
    }
    for i in 0..n {
        if !used[i] {
            used[i] = true;
            current.push(i);
            extend(current, used, n, out);
            current.pop();
            used[i] = false;
        }
    }
}

/// Nearest-neighbor ordering: fast, traffic-unaware, not optimal.
///
/// Separate fallback path for route construction when the forecast
/// pipeline is not worth the n! evaluations.
pub fn nearest_neighbor_order(coords: &[(f64, f64)], start: usize) -> Vec<usize> {
    let n = coords.len();
    if n == 0 {
        return Vec::new();
    }

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut current = start.min(n - 1);
    visited[current] = true;
    order.push(current);

    for _ in 1..n {
        let mut nearest = None;
        let mut min_dist = f64::INFINITY;
        for (i, &coord) in coords.iter().enumerate() {
            if visited[i] {
                continue;
            }
            let dist = haversine::distance_km(coords[current], coord);
            if dist < min_dist {
                min_dist = dist;
                nearest = Some(i);
            }
        }
        if let Some(next) = nearest {
            visited[next] = true;
            order.push(next);
            current = next;
        }
    }

    order
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 { 0.0 } else { sum / count as f64 }
}
