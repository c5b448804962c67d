//! Geographic calculations

use crate::types::Coordinates;

/// Earth radius in miles
const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Road distance coefficient (straight line to road)
pub const ROAD_COEFFICIENT: f64 = 1.3;

/// Calculate Haversine distance between two points in miles
pub fn haversine_miles(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_MILES * c
}

/// Linear interpolation between two points; `fraction` is clamped to 0..=1
pub fn interpolate(from: &Coordinates, to: &Coordinates, fraction: f64) -> Coordinates {
    let t = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
    Coordinates {
        lat: from.lat + (to.lat - from.lat) * t,
        lng: from.lng + (to.lng - from.lng) * t,
    }
}

/// Great-circle length of a polyline in miles
pub fn polyline_length_miles(points: &[Coordinates]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_miles(&pair[0], &pair[1]))
        .sum()
}

/// Point `miles` along a polyline. Returns `None` for an empty polyline;
/// distances past the end land on the last point.
pub fn point_along_route(points: &[Coordinates], miles: f64) -> Option<Coordinates> {
    let first = points.first()?;
    if miles <= 0.0 {
        return Some(*first);
    }

    let mut travelled = 0.0;
    for pair in points.windows(2) {
        let segment = haversine_miles(&pair[0], &pair[1]);
        if travelled + segment >= miles {
            if segment <= 0.0 {
                return Some(pair[1]);
            }
            return Some(interpolate(&pair[0], &pair[1], (miles - travelled) / segment));
        }
        travelled += segment;
    }

    points.last().copied()
}
