//! Great-circle geometry helpers.
//!
//! Distances use the haversine formula on a spherical-earth approximation.
//! Accurate enough for nearest-sensor lookup and rough trip distances;
//! road geometry is deliberately out of scope.

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

const KM_PER_MILE: f64 = 1.609_344;

/// Haversine distance between two (lat, lng) points in kilometers.
pub fn distance_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

pub fn km_to_miles(km: f64) -> f64 {
    km / KM_PER_MILE
}

/// Total polyline length in miles, summed over consecutive point pairs.
pub fn route_distance_miles(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|pair| km_to_miles(distance_km(pair[0], pair[1])))
        .sum()
}

/// `n` evenly spaced points from `from` to `to`, endpoints included.
///
/// With `n == 1` only the start point is returned.
pub fn interpolate(from: (f64, f64), to: (f64, f64), n: usize) -> Vec<(f64, f64)> {
    if n <= 1 {
        return vec![from];
    }

    let steps = (n - 1) as f64;
    (0..n)
        .map(|i| {
            let t = i as f64 / steps;
            (
                from.0 + (to.0 - from.0) * t,
                from.1 + (to.1 - from.1) * t,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        let dist = distance_km((37.7749, -122.4194), (37.7749, -122.4194));
        assert!(dist < 0.001, "Same point should have ~0 distance");
    }

    #[test]
    fn test_symmetric() {
        let sf = (37.7749, -122.4194);
        let oakland = (37.8044, -122.2712);
        let ab = distance_km(sf, oakland);
        let ba = distance_km(oakland, sf);
        assert!((ab - ba).abs() < 1e-9, "Distance should be symmetric");
    }

    #[test]
    fn test_known_distance() {
        // San Francisco to Oakland, roughly 13 km across the bay.
        let dist = distance_km((37.7749, -122.4194), (37.8044, -122.2712));
        assert!(dist > 10.0 && dist < 16.0, "SF to Oakland should be ~13km, got {}", dist);
    }

    #[test]
    fn test_km_to_miles() {
        let miles = km_to_miles(KM_PER_MILE * 10.0);
        assert!((miles - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_route_distance_sums_segments() {
        let points = vec![(37.0, -122.0), (37.5, -122.0), (38.0, -122.0)];
        let total = route_distance_miles(&points);
        let first = km_to_miles(distance_km(points[0], points[1]));
        let second = km_to_miles(distance_km(points[1], points[2]));
        assert!((total - (first + second)).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_endpoints() {
        let points = interpolate((37.0, -122.0), (38.0, -121.0), 5);
        assert_eq!(points.len(), 5);
        assert_eq!(points[0], (37.0, -122.0));
        assert_eq!(points[4], (38.0, -121.0));
    }

    #[test]
    fn test_interpolate_midpoint() {
        let points = interpolate((0.0, 0.0), (2.0, 4.0), 3);
        assert!((points[1].0 - 1.0).abs() < 1e-9);
        assert!((points[1].1 - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_single_point() {
        let points = interpolate((1.0, 2.0), (3.0, 4.0), 1);
        assert_eq!(points, vec![(1.0, 2.0)]);
    }
}
