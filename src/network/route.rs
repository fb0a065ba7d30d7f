// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use serde::Serialize;

use super::Vertex;
use crate::Point;

/// Default cycling speed, 15 km/h, in meters per second.
pub const DEFAULT_CYCLING_SPEED: f64 = 15.0 / 3.6;

/// Estimates the time, in minutes, to ride `length` meters at `speed` meters per second.
pub fn estimate_travel_time(length: f64, speed: f64) -> f64 {
    length / speed / 60.0
}

/// An edge of a [Route], in the direction it was traversed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TraversedEdge {
    pub id: i64,
    /// True if the edge was traversed from its source to its target.
    pub forward: bool,
    pub cost: f64,
    pub length: f64,
}

/// The cheapest path between two vertices of a [Network](super::Network).
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub start: Vertex,
    pub end: Vertex,
    pub edges: Vec<TraversedEdge>,

    /// Sum of traversal costs of all edges.
    pub cost: f64,

    /// Sum of lengths of all edges, in meters.
    pub length: f64,

    /// Merged geometry of the path, in traversal order. Contains a single
    /// line if the path is contiguous, and is empty if start equals end.
    pub geometry: Vec<Vec<Point>>,
}

impl Route {
    pub fn edges_in_path(&self) -> usize {
        self.edges.len()
    }

    /// Estimates the riding time in minutes, see [estimate_travel_time].
    pub fn travel_time(&self, speed: f64) -> f64 {
        estimate_travel_time(self.length, speed)
    }
}

/// Concatenates polylines into as few lines as possible, without reordering them.
/// A polyline starting where the previous one ended continues it, with the shared
/// position kept only once.
pub(super) fn merge_lines<I: IntoIterator<Item = Vec<Point>>>(parts: I) -> Vec<Vec<Point>> {
    let mut lines: Vec<Vec<Point>> = Vec::default();

    for part in parts {
        let Some(first) = part.first() else { continue };

        match lines.last_mut() {
            Some(line) if line.last().is_some_and(|last| last.coincides(first)) => {
                line.extend_from_slice(&part[1..]);
            }
            _ => lines.push(part),
        }
    }

    lines
}
