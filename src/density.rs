// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Point-density aggregates: street-lighting buffers around displayed features
//! and square-grid averages for heatmaps.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::path::PathBuf;

use serde::de::IgnoredAny;

use crate::dataset::{self, Compression};
use crate::kd::{KDTree, Located};
use crate::{geojson, LoadError, Point, ValidationError};

/// Default radius of a density buffer, in meters.
pub const DEFAULT_DENSITY_RADIUS: f64 = 100.0;

/// Default size of a heatmap cell, in degrees.
pub const DEFAULT_CELL_SIZE: f64 = 0.01;

/// A WGS84 bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Creates a bounding box, ensuring all coordinates are valid and
    /// the minimums don't exceed the maximums.
    pub fn new(
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> Result<Self, ValidationError> {
        let valid = Point::new(min_lon, min_lat).is_valid()
            && Point::new(max_lon, max_lat).is_valid()
            && min_lon <= max_lon
            && min_lat <= max_lat;

        if valid {
            Ok(Self {
                min_lon,
                min_lat,
                max_lon,
                max_lat,
            })
        } else {
            Err(ValidationError::BoundingBox([
                min_lon, min_lat, max_lon, max_lat,
            ]))
        }
    }

    /// Checks if a position is inside the box or on its boundary.
    pub fn contains(&self, p: Point) -> bool {
        p.lon >= self.min_lon && p.lon <= self.max_lon && p.lat >= self.min_lat && p.lat <= self.max_lat
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = ValidationError;

    /// Converts a `[min_lon, min_lat, max_lon, max_lat]` array, as used by GeoJSON.
    fn try_from(a: [f64; 4]) -> Result<Self, Self::Error> {
        Self::new(a[0], a[1], a[2], a[3])
    }
}

/// External provider of points (e.g. street lights) within a bounding box.
pub trait PointSource {
    type Error: std::fmt::Display;

    fn points_in(&self, bbox: &BoundingBox) -> Result<Vec<Point>, Self::Error>;
}

impl PointSource for [Point] {
    type Error = Infallible;

    fn points_in(&self, bbox: &BoundingBox) -> Result<Vec<Point>, Self::Error> {
        Ok(self.iter().copied().filter(|&p| bbox.contains(p)).collect())
    }
}

impl PointSource for Vec<Point> {
    type Error = Infallible;

    fn points_in(&self, bbox: &BoundingBox) -> Result<Vec<Point>, Self::Error> {
        self.as_slice().points_in(bbox)
    }
}

/// [PointSource] reading a GeoJSON FeatureCollection from disk on every request.
/// Non-Point geometries and all properties are ignored.
#[derive(Debug, Clone)]
pub struct GeoJsonPoints {
    pub path: PathBuf,
    pub compression: Compression,
}

impl PointSource for GeoJsonPoints {
    type Error = LoadError;

    fn points_in(&self, bbox: &BoundingBox) -> Result<Vec<Point>, Self::Error> {
        let reader = dataset::open(&self.path, self.compression)?;
        let fc: geojson::FeatureCollection<IgnoredAny> = serde_json::from_reader(reader)?;
        Ok(fc
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref()?.as_point())
            .filter(|&p| p.is_valid() && bbox.contains(p))
            .collect())
    }
}

/// Number of external points strictly inside a circular buffer around a centroid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityZone {
    pub centroid: Point,
    pub radius: f64,
    pub count: usize,
}

impl DensityZone {
    /// Maps the count to a map overlay opacity: `0.01 + 0.05 × count`, capped at 0.5.
    pub fn opacity(&self) -> f64 {
        (0.01 + 0.05 * self.count as f64).min(0.5)
    }
}

#[derive(Debug, Clone, Copy)]
struct Indexed {
    idx: usize,
    position: Point,
}

impl Located for Indexed {
    fn id(&self) -> i64 {
        self.idx as i64
    }

    fn position(&self) -> Point {
        self.position
    }
}

fn validate_radius(radius: f64) -> Result<(), ValidationError> {
    if radius.is_finite() && radius >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::Radius(radius))
    }
}

/// Counts, for every centroid, the `points` within `bbox` which are strictly closer
/// than `radius` meters. Zones are returned in the order of centroids.
pub fn light_density(
    centroids: &[Point],
    bbox: &BoundingBox,
    radius: f64,
    points: &[Point],
) -> Result<Vec<DensityZone>, ValidationError> {
    validate_radius(radius)?;
    for c in centroids {
        c.validate()?;
    }

    let index = KDTree::from_iter(
        points
            .iter()
            .copied()
            .filter(|&p| p.is_valid() && bbox.contains(p))
            .enumerate()
            .map(|(idx, position)| Indexed { idx, position }),
    );

    Ok(centroids
        .iter()
        .map(|&centroid| {
            let count = match index {
                Some(ref index) => index
                    .find_within(centroid, radius)
                    .into_iter()
                    .filter(|&(_, distance)| distance < radius)
                    .count(),
                None => 0,
            };
            DensityZone {
                centroid,
                radius,
                count,
            }
        })
        .collect())
}

/// Like [light_density], but fetches the points from a [PointSource].
/// Failures of the source are logged and treated as if it returned no points.
pub fn light_density_from<S: PointSource + ?Sized>(
    source: &S,
    centroids: &[Point],
    bbox: &BoundingBox,
    radius: f64,
) -> Result<Vec<DensityZone>, ValidationError> {
    let points = match source.points_in(bbox) {
        Ok(points) => points,
        Err(e) => {
            log::warn!("point source failed, assuming no points: {}", e);
            Vec::default()
        }
    };
    light_density(centroids, bbox, radius, &points)
}

/// A square cell of a heatmap with the mean of values sampled inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub bbox: BoundingBox,
    pub value: f64,
    pub samples: usize,
}

/// Averages values over a square grid of `cell_size` degrees, aligned at (0, 0).
/// Cells without any samples are not returned; others are ordered south-to-north,
/// then west-to-east.
pub fn grid_average(
    samples: &[(Point, f64)],
    cell_size: f64,
) -> Result<Vec<GridCell>, ValidationError> {
    if !cell_size.is_finite() || cell_size <= 0.0 {
        return Err(ValidationError::CellSize(cell_size));
    }

    let mut cells: BTreeMap<(i64, i64), (f64, usize)> = BTreeMap::default();
    for &(p, value) in samples {
        if !p.is_valid() || !value.is_finite() {
            continue;
        }

        let key = (
            (p.lat / cell_size).floor() as i64,
            (p.lon / cell_size).floor() as i64,
        );
        let cell = cells.entry(key).or_default();
        cell.0 += value;
        cell.1 += 1;
    }

    Ok(cells
        .into_iter()
        .map(|((row, col), (sum, count))| GridCell {
            bbox: BoundingBox {
                min_lon: col as f64 * cell_size,
                min_lat: row as f64 * cell_size,
                max_lon: (col + 1) as f64 * cell_size,
                max_lat: (row + 1) as f64 * cell_size,
            },
            value: sum / count as f64,
            samples: count,
        })
        .collect())
}
