//! Day-bucketed schedules, warnings and recommendations for the winning
//! route.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::scoring::TrafficLevel;
use crate::search::{RouteCandidate, ScoredSegment, SearchOutcome};

/// Schedule assembly tunables.
#[derive(Debug, Clone)]
pub struct ItineraryOptions {
    /// Minutes spent at each stop between arrival and departure.
    pub dwell_minutes: i64,
    /// Congestion score above which warnings and start-time shifts kick in.
    pub congestion_threshold: f64,
}

impl Default for ItineraryOptions {
    fn default() -> Self {
        Self {
            dwell_minutes: 60,
            congestion_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StopKind {
    Depart,
    Arrive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One arrival or departure event in the schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryStop {
    /// Wall-clock "HH:MM".
    pub time: String,
    #[serde(rename = "type")]
    pub kind: StopKind,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_level: Option<TrafficLevel>,
}

/// One calendar day of the schedule.
#[derive(Debug, Clone, Serialize)]
pub struct ItineraryDay {
    pub day: u32,
    /// "YYYY-MM-DD".
    pub date: String,
    pub stops: Vec<ItineraryStop>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// Builds the stop-by-stop schedule for the winning candidate.
///
/// `names` are the waypoint display names already in winning order. A new
/// day bucket starts whenever the running clock crosses a calendar-day
/// boundary; the departure after the final stop is omitted.
pub fn build_itinerary(
    names: &[String],
    candidate: &RouteCandidate,
    start: DateTime<Utc>,
    options: &ItineraryOptions,
) -> Vec<ItineraryDay> {
    let mut days: Vec<ItineraryDay> = Vec::new();
    let mut stops: Vec<ItineraryStop> = Vec::new();
    let mut day_number = 1;
    let mut clock = start;
    let mut day_date = clock.date_naive();

    if let Some(first) = names.first() {
        stops.push(ItineraryStop {
            time: clock.format("%H:%M").to_string(),
            kind: StopKind::Depart,
            location: first.clone(),
            travel_time: None,
            insight: Some("Starting your journey".to_string()),
            traffic_level: None,
        });
    }

    for (pos, name) in names.iter().enumerate().skip(1) {
        let segment = &candidate.segments[pos - 1];
        clock += Duration::minutes(segment.travel_minutes);
        roll_day(&mut days, &mut stops, &mut day_number, &mut day_date, clock.date_naive());

        stops.push(ItineraryStop {
            time: clock.format("%H:%M").to_string(),
            kind: StopKind::Arrive,
            location: name.clone(),
            travel_time: Some(segment.travel_minutes),
            insight: Some(advisory(segment.score.level, segment.travel_minutes)),
            traffic_level: Some(segment.score.level),
        });

        if pos < names.len() - 1 {
            clock += Duration::minutes(options.dwell_minutes);
            roll_day(&mut days, &mut stops, &mut day_number, &mut day_date, clock.date_naive());

            stops.push(ItineraryStop {
                time: clock.format("%H:%M").to_string(),
                kind: StopKind::Depart,
                location: name.clone(),
                travel_time: None,
                insight: None,
                traffic_level: None,
            });
        }
    }

    if !stops.is_empty() {
        days.push(ItineraryDay {
            day: day_number,
            date: day_date.format("%Y-%m-%d").to_string(),
            stops,
        });
    }

    days
}

fn roll_day(
    days: &mut Vec<ItineraryDay>,
    stops: &mut Vec<ItineraryStop>,
    day_number: &mut u32,
    day_date: &mut NaiveDate,
    now: NaiveDate,
) {
    if now == *day_date {
        return;
    }
    if !stops.is_empty() {
        days.push(ItineraryDay {
            day: *day_number,
            date: day_date.format("%Y-%m-%d").to_string(),
            stops: std::mem::take(stops),
        });
    }
    *day_number += 1;
    *day_date = now;
}

/// Advisory text shown alongside an arrival.
pub fn advisory(level: TrafficLevel, travel_minutes: i64) -> String {
    match level {
        TrafficLevel::Light => {
            format!("Smooth traffic expected. {} min travel time.", travel_minutes)
        }
        TrafficLevel::Moderate => {
            format!("Moderate traffic. Allow {} min for this segment.", travel_minutes)
        }
        TrafficLevel::Heavy => {
            format!("Heavy congestion. Expect delays. {}+ min travel time.", travel_minutes)
        }
    }
}

/// Warnings for segments classified heavy or scoring above the
/// congestion threshold. Heavy segments are high severity; congested but
/// not heavy segments are medium.
pub fn route_warnings(
    names: &[String],
    candidate: &RouteCandidate,
    options: &ItineraryOptions,
) -> Vec<Warning> {
    candidate
        .segments
        .iter()
        .enumerate()
        .filter_map(|(idx, segment)| warning_for(names, idx, segment, options))
        .collect()
}

fn warning_for(
    names: &[String],
    idx: usize,
    segment: &ScoredSegment,
    options: &ItineraryOptions,
) -> Option<Warning> {
    let heavy = segment.score.level == TrafficLevel::Heavy;
    let congested = segment.score.congestion_score > options.congestion_threshold;
    if !heavy && !congested {
        return None;
    }

    let location = names.get(idx + 1).cloned();
    let near = location.as_deref().unwrap_or("this segment");
    let label = if heavy { "Heavy" } else { "Moderate" };
    Some(Warning {
        severity: if heavy { Severity::High } else { Severity::Medium },
        message: format!(
            "{} congestion expected near {}. Average speed: {:.1} mph",
            label, near, segment.score.avg_speed_mph
        ),
        location,
    })
}

/// Recommendations derived from the full ranked comparison.
pub fn route_recommendations(
    outcome: &SearchOutcome,
    options: &ItineraryOptions,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();
    let best = outcome.best();

    if outcome.candidates.len() > 1 {
        let worst = &outcome.candidates[outcome.candidates.len() - 1];
        let saved_hours = worst.travel_time_hours - best.travel_time_hours;
        if saved_hours > 0.5 {
            recommendations.push(Recommendation {
                kind: "timing".to_string(),
                message: format!(
                    "This route saves {:.1} hours compared to the worst alternative",
                    saved_hours
                ),
            });
        }
    }

    if best.congestion_score > options.congestion_threshold {
        recommendations.push(Recommendation {
            kind: "timing".to_string(),
            message: "Consider starting earlier or later to avoid peak traffic".to_string(),
        });
    }

    recommendations
}
