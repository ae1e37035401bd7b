//! traffic-planner core
//!
//! Reorders a small set of trip waypoints to minimize predicted traffic
//! congestion. Sensor-grid speed forecasts from a pretrained sequence
//! model feed an exhaustive permutation search; the winning ordering is
//! turned into a day-bucketed itinerary with warnings and
//! recommendations.

pub mod error;
pub mod traits;
pub mod haversine;
pub mod sensors;
pub mod scaling;
pub mod history;
pub mod forecast;
pub mod scoring;
pub mod search;
pub mod itinerary;
pub mod planner;
