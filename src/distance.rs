// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// Mean radius of Earth, in meters.
/// Source: https://en.wikipedia.org/wiki/Earth_radius#Arithmetic_mean_radius
pub const EARTH_RADIUS: f64 = 6_371_008.8;

/// Mean diameter of Earth, in meters.
const EARTH_DIAMETER: f64 = EARTH_RADIUS + EARTH_RADIUS;

/// A WGS84 position. Longitude comes first, as in GeoJSON.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    #[inline]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Returns true if the position is finite, with longitude in \[-180, 180\]
    /// and latitude in \[-90, 90\].
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }

    /// Fails with [ValidationError::Coordinate](crate::ValidationError::Coordinate)
    /// if the position is not [valid](Point::is_valid).
    pub fn validate(&self) -> Result<(), crate::ValidationError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(crate::ValidationError::Coordinate {
                lon: self.lon,
                lat: self.lat,
            })
        }
    }

    /// Checks whether two positions are the same vertex of a polyline,
    /// allowing for rounding of stored coordinates.
    pub(crate) fn coincides(&self, other: &Point) -> bool {
        (self.lon - other.lon).abs() < 1e-9 && (self.lat - other.lat).abs() < 1e-9
    }
}

/// Calculates the great-circle distance between two lon-lat positions
/// on Earth using the `haversine formula <https://en.wikipedia.org/wiki/Haversine_formula>`_.
/// Returns the result in meters.
pub fn earth_distance(a: Point, b: Point) -> f64 {
    let lat1 = a.lat.to_radians();
    let lon1 = a.lon.to_radians();
    let lat2 = b.lat.to_radians();
    let lon2 = b.lon.to_radians();

    let sin_dlat_half = ((lat2 - lat1) * 0.5).sin();
    let sin_dlon_half = ((lon2 - lon1) * 0.5).sin();

    let h = sin_dlat_half * sin_dlat_half + lat1.cos() * lat2.cos() * sin_dlon_half * sin_dlon_half;

    EARTH_DIAMETER * h.sqrt().min(1.0).asin()
}

/// Sums [earth_distance] over consecutive positions of a polyline.
pub fn polyline_length(points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|pair| earth_distance(pair[0], pair[1]))
        .sum()
}

/// Lower bound on the distance from `p` to any position with latitude on the
/// other side of `lat`. The shortest way to change latitude runs along a meridian.
pub(crate) fn distance_to_parallel(p: Point, lat: f64) -> f64 {
    EARTH_RADIUS * (p.lat - lat).to_radians().abs()
}

/// Lower bound on the distance from `p` to any position with longitude on the
/// other side of `lon`, which is the cross-track distance to that meridian.
pub(crate) fn distance_to_meridian(p: Point, lon: f64) -> f64 {
    let dlon = (p.lon - lon).to_radians().abs();
    let lat = p.lat.to_radians();
    if dlon >= std::f64::consts::FRAC_PI_2 {
        // Closest point of the meridian is a pole
        EARTH_RADIUS * (std::f64::consts::FRAC_PI_2 - lat.abs())
    } else {
        EARTH_RADIUS * (dlon.sin() * lat.cos()).min(1.0).asin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_almost_eq {
        ($a:expr, $b:expr, $eps:expr) => {
            assert!(
                (($a - $b).abs() < $eps),
                "assertion failed: {} ≈ {}",
                $a,
                $b
            )
        };
    }

    #[test]
    fn earth_distance_known_values() {
        // Stockholm Centralstation to Slussen, roughly 1.4 km
        let centralen = Point::new(18.0586, 59.3306);
        let slussen = Point::new(18.0717, 59.3199);
        assert_almost_eq!(earth_distance(centralen, slussen), 1_403.0, 5.0);

        // One degree of latitude
        assert_almost_eq!(
            earth_distance(Point::new(0.0, 0.0), Point::new(0.0, 1.0)),
            111_195.0,
            1.0
        );

        assert_eq!(earth_distance(slussen, slussen), 0.0);
    }

    #[test]
    fn polyline_length_sums_segments() {
        let line = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(0.0, 2.0),
        ];
        assert_almost_eq!(polyline_length(&line), 2.0 * 111_195.0, 2.0);
        assert_eq!(polyline_length(&line[..1]), 0.0);
    }

    #[test]
    fn axis_distances_are_lower_bounds() {
        let p = Point::new(18.0, 59.3);
        for q in [
            Point::new(18.01, 59.31),
            Point::new(17.9, 59.5),
            Point::new(18.3, 59.0),
        ] {
            assert!(distance_to_parallel(p, q.lat) <= earth_distance(p, q));
            assert!(distance_to_meridian(p, q.lon) <= earth_distance(p, q) + 1e-6);
        }
    }

    #[test]
    fn validity() {
        assert!(Point::new(180.0, -90.0).is_valid());
        assert!(!Point::new(180.5, 0.0).is_valid());
        assert!(!Point::new(0.0, f64::NAN).is_valid());
        assert!(Point::new(0.0, 91.0).validate().is_err());
    }
}
