// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::time::Duration;

use crate::ValidationError;

/// Recommended number of allowed vertex expansions in
/// [shortest_path](super::Network::shortest_path) before
/// [RouteError::StepLimitExceeded] is returned.
pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

/// Recommended wall-clock limit of a single route search.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Error conditions which may occur during [shortest_path](super::Network::shortest_path).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteError {
    /// The network has no vertices to snap to.
    #[error("no vertex found: the road network is empty")]
    NoVertexFound,

    /// A vertex referenced by id doesn't exist in the network.
    #[error("unknown vertex: {0}")]
    UnknownVertex(i64),

    /// The two vertices are not connected. This is a regular "no route"
    /// answer, not a failure of the search.
    #[error("no path from vertex {from} to vertex {to}")]
    NoPathFound { from: i64, to: i64 },

    /// Route search has exceeded its limit of steps.
    ///
    /// Concluding that no route exists requires traversing the whole reachable
    /// part of the network, which can result in a denial-of-service. The step limit
    /// protects against resource exhaustion.
    #[error("step limit exceeded")]
    StepLimitExceeded,

    /// Route search has exceeded its time limit.
    #[error("route search timed out")]
    Timeout,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Per-request bounds of a route search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOptions {
    pub step_limit: usize,
    pub timeout: Option<Duration>,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}
