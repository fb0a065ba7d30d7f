// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use crate::Point;

/// Represents an [OSM node](https://wiki.openstreetmap.org/wiki/Node).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub id: i64,
    pub position: Point,
}

/// Represents an [OSM way](https://wiki.openstreetmap.org/wiki/Way).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Way {
    pub id: i64,
    pub nodes: Vec<i64>,
    pub tags: HashMap<String, String>,
}

/// OSM elements relevant for building a road network. Relations are skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Node(Node),
    Way(Way),
}
