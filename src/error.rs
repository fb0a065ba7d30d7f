// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use crate::rating::Dimension;
use crate::FeatureKind;

/// Rejected input. Whatever operation returned it has not modified any state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("coordinate out of range: ({lon}, {lat})")]
    Coordinate { lon: f64, lat: f64 },

    #[error("{dimension} rating out of range: {value} (expected 1..=5)")]
    OutOfRange { dimension: Dimension, value: u8 },

    #[error("{payload} rating submitted for a {kind}")]
    KindMismatch {
        kind: FeatureKind,
        payload: FeatureKind,
    },

    #[error("unknown {kind}: {id}")]
    UnknownFeature { kind: FeatureKind, id: i64 },

    #[error("invalid hour bucket: {start}..{end}")]
    HourBucket { start: u32, end: u32 },

    #[error("radius must be finite and not negative: {0}")]
    Radius(f64),

    #[error("grid cell size must be finite and positive: {0}")]
    CellSize(f64),

    #[error("invalid bounding box: {0:?}")]
    BoundingBox([f64; 4]),
}

/// Problems with a dataset loaded at startup.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("{kind} {id}: invalid coordinates ({lon}, {lat})")]
    InvalidCoordinate {
        kind: &'static str,
        id: i64,
        lon: f64,
        lat: f64,
    },

    #[error("{kind} {id}: expected a Point geometry, got {got}")]
    UnsupportedGeometry {
        kind: FeatureKind,
        id: i64,
        got: &'static str,
    },

    #[error("{id}: expected a {expected}, got a {got}")]
    KindMismatch {
        id: i64,
        expected: FeatureKind,
        got: FeatureKind,
    },

    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: i64 },

    #[error("edge {edge}: unknown vertex {vertex}")]
    UnknownVertex { edge: i64, vertex: i64 },

    #[error("edge {0}: cost is NaN")]
    InvalidCost(i64),

    #[error("rating log line {line}: {source}")]
    InvalidRating {
        line: usize,
        #[source]
        source: ValidationError,
    },

    #[error("can't guess the format of {0}")]
    UnknownFormat(PathBuf),
}
