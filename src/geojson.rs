// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Typed [GeoJSON](https://datatracker.ietf.org/doc/html/rfc7946) documents exchanged
//! at the boundary of the crate: feature datasets are decoded with these types,
//! and every query result is encoded with them.

use serde::{Deserialize, Serialize};

use crate::density::{DensityZone, GridCell};
use crate::feature::{Attributes, Neighbor};
use crate::filter::FilteredFeature;
use crate::network::Route;
use crate::{FeatureKind, Point};

/// GeoJSON position: longitude, latitude and (ignored) altitude.
pub type Position = Vec<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureCollectionType {
    FeatureCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureType {
    Feature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    MultiPoint(Vec<Position>),
    LineString(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    pub fn point(p: Point) -> Self {
        Self::Point(position(p))
    }

    /// Creates a LineString out of a single polyline, or a MultiLineString out
    /// of multiple polylines. Returns `None` if there are no polylines.
    pub fn lines(segments: &[Vec<Point>]) -> Option<Self> {
        match segments {
            [] => None,
            [line] => Some(Self::LineString(line.iter().copied().map(position).collect())),
            _ => Some(Self::MultiLineString(
                segments
                    .iter()
                    .map(|line| line.iter().copied().map(position).collect())
                    .collect(),
            )),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Point(_) => "Point",
            Self::MultiPoint(_) => "MultiPoint",
            Self::LineString(_) => "LineString",
            Self::MultiLineString(_) => "MultiLineString",
            Self::Polygon(_) => "Polygon",
            Self::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Returns the position of a Point geometry. Positions with less than
    /// 2 coordinates are reported as NaN.
    pub fn as_point(&self) -> Option<Point> {
        match self {
            Self::Point(coords) => Some(Point::new(
                coords.first().copied().unwrap_or(f64::NAN),
                coords.get(1).copied().unwrap_or(f64::NAN),
            )),
            _ => None,
        }
    }
}

fn position(p: Point) -> Position {
    vec![p.lon, p.lat]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature<P> {
    #[serde(rename = "type")]
    pub type_: FeatureType,
    pub geometry: Option<Geometry>,
    pub properties: P,
}

impl<P> Feature<P> {
    pub fn new(geometry: Option<Geometry>, properties: P) -> Self {
        Self {
            type_: FeatureType::Feature,
            geometry,
            properties,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection<P> {
    #[serde(rename = "type")]
    pub type_: FeatureCollectionType,
    pub features: Vec<Feature<P>>,
}

impl<P> FeatureCollection<P> {
    pub fn new(features: Vec<Feature<P>>) -> Self {
        Self {
            type_: FeatureCollectionType::FeatureCollection,
            features,
        }
    }
}

impl<P> FromIterator<Feature<P>> for FeatureCollection<P> {
    fn from_iter<I: IntoIterator<Item = Feature<P>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Per-feature aggregates attached to filtered features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingProperties {
    pub avg_rating: Option<f64>,
    pub avg_safety: Option<f64>,
    pub avg_availability: Option<f64>,
    pub all_working: Option<bool>,
}

/// Properties of a pump or a parking spot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureProperties<'a> {
    pub fid: i64,
    pub kind: FeatureKind,
    #[serde(flatten)]
    pub attributes: &'a Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub ratings: Option<RatingProperties>,
}

impl<'a> From<&'a crate::Feature> for Feature<FeatureProperties<'a>> {
    fn from(f: &'a crate::Feature) -> Self {
        Feature::new(
            Some(Geometry::point(f.position)),
            FeatureProperties {
                fid: f.id,
                kind: f.kind(),
                attributes: &f.attributes,
                distance: None,
                ratings: None,
            },
        )
    }
}

impl<'a> From<&Neighbor<'a>> for Feature<FeatureProperties<'a>> {
    fn from(n: &Neighbor<'a>) -> Self {
        let mut f = Feature::from(n.feature);
        f.properties.distance = Some(n.distance);
        f
    }
}

impl<'a> From<&FilteredFeature<'a>> for Feature<FeatureProperties<'a>> {
    fn from(m: &FilteredFeature<'a>) -> Self {
        let mut f = Feature::from(&m.neighbor);
        f.properties.ratings = Some(RatingProperties {
            avg_rating: m.averages.vibe,
            avg_safety: m.averages.safety,
            avg_availability: m.averages.availability,
            all_working: m.all_working,
        });
        f
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteProperties {
    pub length_m: f64,
    pub total_cost: f64,
    pub edges_in_path: usize,
    pub travel_time_min: f64,
}

/// Converts a [Route] into a Feature with a LineString (or MultiLineString, if
/// the merged path is not contiguous) geometry. `speed` is used to estimate the
/// travel time, in meters per second.
pub fn route_feature(route: &Route, speed: f64) -> Feature<RouteProperties> {
    Feature::new(
        Geometry::lines(&route.geometry),
        RouteProperties {
            length_m: route.length,
            total_cost: route.cost,
            edges_in_path: route.edges.len(),
            travel_time_min: route.travel_time(speed),
        },
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensityProperties {
    #[serde(rename = "lightCount")]
    pub light_count: usize,
    pub radius: f64,
    pub opacity: f64,
}

impl From<&DensityZone> for Feature<DensityProperties> {
    fn from(z: &DensityZone) -> Self {
        Feature::new(
            Some(Geometry::point(z.centroid)),
            DensityProperties {
                light_count: z.count,
                radius: z.radius,
                opacity: z.opacity(),
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridProperties {
    pub value: f64,
    pub samples: usize,
}

impl From<&GridCell> for Feature<GridProperties> {
    fn from(c: &GridCell) -> Self {
        let b = &c.bbox;
        let ring = vec![
            vec![b.min_lon, b.min_lat],
            vec![b.max_lon, b.min_lat],
            vec![b.max_lon, b.max_lat],
            vec![b.min_lon, b.max_lat],
            vec![b.min_lon, b.min_lat],
        ];
        Feature::new(
            Some(Geometry::Polygon(vec![ring])),
            GridProperties {
                value: c.value,
                samples: c.samples,
            },
        )
    }
}
