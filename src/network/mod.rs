// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Directed, weighted road network and the bicycle router running over it.

use std::collections::btree_map::{BTreeMap, Entry};
use std::collections::BTreeSet;

use serde::Serialize;

use crate::distance::polyline_length;
use crate::kd::{KDTree, Located};
use crate::{LoadError, Point};

mod dijkstra;
mod error;
mod route;

pub use error::{RouteError, RouteOptions, DEFAULT_STEP_LIMIT, DEFAULT_TIMEOUT};
pub use route::{estimate_travel_time, Route, TraversedEdge, DEFAULT_CYCLING_SPEED};

/// A node of the [Network], usually a street intersection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vertex {
    pub id: i64,
    pub position: Point,
}

impl Located for Vertex {
    fn id(&self) -> i64 {
        self.id
    }

    fn position(&self) -> Point {
        self.position
    }
}

/// A street segment between two [Vertices](Vertex).
///
/// The edge may be traversed from `source` to `target` at `cost`, and from `target`
/// to `source` at `reverse_cost`. An infinite cost marks a forbidden direction
/// (e.g. against a one-way street). Costs are never negative or NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub id: i64,
    pub source: i64,
    pub target: i64,
    pub cost: f64,
    pub reverse_cost: f64,

    /// Length of the geometry, in meters.
    pub length: f64,

    /// Polyline from the source to the target vertex.
    pub geometry: Vec<Point>,
}

impl Edge {
    /// Returns the cost of traversing the edge in the given direction.
    pub fn cost_in(&self, forward: bool) -> f64 {
        if forward {
            self.cost
        } else {
            self.reverse_cost
        }
    }
}

/// An outgoing traversable direction of an [Edge].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub to: i64,
    pub cost: f64,
    /// Index into [Network::edges].
    pub edge: usize,
    pub forward: bool,
}

/// Represents a road network as a set of [Vertices](Vertex) and directed,
/// weighted [Edges](Edge) between them.
///
/// The network is read-only once built (see [NetworkBuilder] and [crate::osm]),
/// and may be freely shared between threads.
#[derive(Debug, Default, Clone)]
pub struct Network {
    vertices: BTreeMap<i64, (Vertex, Vec<Link>)>,
    edges: Vec<Edge>,
    index: Option<KDTree<Vertex>>,
}

impl Network {
    /// Returns the number of vertices in the network.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns an iterator over all [Vertices](Vertex), ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values().map(|(v, _)| v)
    }

    /// Returns all [Edges](Edge) in the network.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Retrieves a [Vertex] with the provided id.
    pub fn get_vertex(&self, id: i64) -> Option<Vertex> {
        self.vertices.get(&id).map(|&(v, _)| v)
    }

    /// Gets all traversable directions out of a vertex with a given id.
    pub fn get_links(&self, from_id: i64) -> &[Link] {
        self.vertices
            .get(&from_id)
            .map(|(_, links)| links.as_slice())
            .unwrap_or_default()
    }

    /// Gets the cheapest cost of going directly from one vertex to another.
    /// If no such edge exists, returns [f64::INFINITY].
    pub fn cost_between(&self, from_id: i64, to_id: i64) -> f64 {
        self.get_links(from_id)
            .iter()
            .filter(|l| l.to == to_id)
            .map(|l| l.cost)
            .fold(f64::INFINITY, f64::min)
    }

    /// Finds the closest [Vertex] to the given position.
    /// Equidistant vertices are resolved in favor of the smaller id.
    pub fn snap_to_vertex(&self, p: Point) -> Result<Vertex, RouteError> {
        p.validate()?;
        match self.index {
            Some(ref index) => Ok(*index.find_nearest(p).0),
            None => Err(RouteError::NoVertexFound),
        }
    }

    /// Snaps both positions to their closest vertices and finds the cheapest
    /// [Route] between them, see [Network::route_between].
    pub fn shortest_path(
        &self,
        start: Point,
        end: Point,
        options: &RouteOptions,
    ) -> Result<Route, RouteError> {
        let from = self.snap_to_vertex(start)?;
        let to = self.snap_to_vertex(end)?;
        self.route_between(from.id, to.id, options)
    }

    /// Finds the cheapest [Route] between two vertices, respecting the
    /// direction-specific edge costs.
    ///
    /// A route from a vertex to itself has no edges, zero cost and zero length.
    /// Fails with [RouteError::NoPathFound] if the vertices are not connected.
    /// `options` limit the time and number of vertex expansions of the search.
    pub fn route_between(
        &self,
        from_id: i64,
        to_id: i64,
        options: &RouteOptions,
    ) -> Result<Route, RouteError> {
        let links = dijkstra::find_path(self, from_id, to_id, options)?;
        let start = self
            .get_vertex(from_id)
            .ok_or(RouteError::UnknownVertex(from_id))?;
        let end = self
            .get_vertex(to_id)
            .ok_or(RouteError::UnknownVertex(to_id))?;

        let mut edges = Vec::with_capacity(links.len());
        let mut parts = Vec::with_capacity(links.len());
        for link in links {
            let e = &self.edges[link.edge];
            edges.push(TraversedEdge {
                id: e.id,
                forward: link.forward,
                cost: link.cost,
                length: e.length,
            });

            let mut part = e.geometry.clone();
            if !link.forward {
                part.reverse();
            }
            parts.push(part);
        }

        Ok(Route {
            start,
            end,
            cost: edges.iter().map(|e| e.cost).sum(),
            length: edges.iter().map(|e| e.length).sum(),
            edges,
            geometry: route::merge_lines(parts),
        })
    }
}

/// Collects vertices and edges of a [Network], validating them on [build](NetworkBuilder::build).
#[derive(Debug, Default, Clone)]
pub struct NetworkBuilder {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, id: i64, position: Point) -> &mut Self {
        self.vertices.push(Vertex { id, position });
        self
    }

    /// Adds an edge. A negative cost marks a direction as not traversable.
    /// An empty `geometry` is replaced by a straight line between the source
    /// and target vertices. The length of the edge is computed from its geometry.
    pub fn add_edge(
        &mut self,
        id: i64,
        source: i64,
        target: i64,
        cost: f64,
        reverse_cost: f64,
        geometry: Vec<Point>,
    ) -> &mut Self {
        self.edges.push(Edge {
            id,
            source,
            target,
            cost,
            reverse_cost,
            length: 0.0,
            geometry,
        });
        self
    }

    /// Validates the collected data and builds a [Network] with a spatial index
    /// over its vertices.
    pub fn build(self) -> Result<Network, LoadError> {
        let mut vertices: BTreeMap<i64, (Vertex, Vec<Link>)> = BTreeMap::default();
        for v in self.vertices {
            if !v.position.is_valid() {
                return Err(LoadError::InvalidCoordinate {
                    kind: "vertex",
                    id: v.id,
                    lon: v.position.lon,
                    lat: v.position.lat,
                });
            }

            match vertices.entry(v.id) {
                Entry::Vacant(e) => {
                    e.insert((v, Vec::default()));
                }
                Entry::Occupied(_) => {
                    return Err(LoadError::DuplicateId {
                        kind: "vertex",
                        id: v.id,
                    })
                }
            }
        }

        let mut edge_ids = BTreeSet::default();
        let mut edges = Vec::with_capacity(self.edges.len());
        for mut e in self.edges {
            if !edge_ids.insert(e.id) {
                return Err(LoadError::DuplicateId {
                    kind: "edge",
                    id: e.id,
                });
            }

            let (source, target) = match (vertices.get(&e.source), vertices.get(&e.target)) {
                (Some(&(s, _)), Some(&(t, _))) => (s, t),
                (None, _) => {
                    return Err(LoadError::UnknownVertex {
                        edge: e.id,
                        vertex: e.source,
                    })
                }
                (_, None) => {
                    return Err(LoadError::UnknownVertex {
                        edge: e.id,
                        vertex: e.target,
                    })
                }
            };

            e.cost = normalize_cost(e.id, e.cost)?;
            e.reverse_cost = normalize_cost(e.id, e.reverse_cost)?;
            if e.geometry.is_empty() {
                e.geometry = vec![source.position, target.position];
            }
            e.length = polyline_length(&e.geometry);
            edges.push(e);
        }

        for (idx, e) in edges.iter().enumerate() {
            for forward in [true, false] {
                let cost = e.cost_in(forward);
                if !cost.is_finite() {
                    continue;
                }

                let (from, to) = if forward {
                    (e.source, e.target)
                } else {
                    (e.target, e.source)
                };
                if let Some((_, links)) = vertices.get_mut(&from) {
                    links.push(Link {
                        to,
                        cost,
                        edge: idx,
                        forward,
                    });
                }
            }
        }

        let index = KDTree::from_iter(vertices.values().map(|&(v, _)| v));
        log::info!(
            "built road network with {} vertices and {} edges",
            vertices.len(),
            edges.len()
        );

        Ok(Network {
            vertices,
            edges,
            index,
        })
    }
}

fn normalize_cost(edge: i64, cost: f64) -> Result<f64, LoadError> {
    if cost.is_nan() {
        Err(LoadError::InvalidCost(edge))
    } else if cost < 0.0 {
        Ok(f64::INFINITY)
    } else {
        Ok(cost)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

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

    //   A ──2── B ──3── C
    //
    //   D ──1── E
    fn abc_network() -> Network {
        let mut b = NetworkBuilder::new();
        b.add_vertex(1, Point::new(18.00, 59.30))
            .add_vertex(2, Point::new(18.01, 59.30))
            .add_vertex(3, Point::new(18.02, 59.30))
            .add_vertex(4, Point::new(18.00, 59.40))
            .add_vertex(5, Point::new(18.01, 59.40))
            .add_edge(10, 1, 2, 2.0, 2.0, vec![])
            .add_edge(11, 2, 3, 3.0, 3.0, vec![])
            .add_edge(12, 4, 5, 1.0, 1.0, vec![]);
        b.build().unwrap()
    }

    #[test]
    fn shortest_path_abc() {
        let n = abc_network();
        let r = n
            .shortest_path(
                Point::new(18.0, 59.3001),
                Point::new(18.0201, 59.3),
                &RouteOptions::default(),
            )
            .unwrap();

        assert_eq!(r.start.id, 1);
        assert_eq!(r.end.id, 3);
        assert_eq!(r.edges.iter().map(|e| e.id).collect::<Vec<_>>(), vec![10, 11]);
        assert_eq!(r.cost, 5.0);
        assert_eq!(r.edges_in_path(), 2);

        // Length is independent of cost: roughly 2 × 570 m
        let expected = polyline_length(&[
            Point::new(18.00, 59.30),
            Point::new(18.01, 59.30),
            Point::new(18.02, 59.30),
        ]);
        assert_almost_eq!(r.length, expected, 1e-6);
        assert_eq!(
            r.geometry,
            vec![vec![
                Point::new(18.00, 59.30),
                Point::new(18.01, 59.30),
                Point::new(18.02, 59.30),
            ]],
        );
    }

    #[test]
    fn shortest_path_same_point() {
        let n = abc_network();
        let p = Point::new(18.01, 59.30);
        let r = n.shortest_path(p, p, &RouteOptions::default()).unwrap();
        assert_eq!(r.start.id, 2);
        assert_eq!(r.end.id, 2);
        assert_eq!(r.cost, 0.0);
        assert_eq!(r.length, 0.0);
        assert!(r.edges.is_empty());
        assert!(r.geometry.is_empty());
    }

    #[test]
    fn shortest_path_disconnected() {
        let n = abc_network();
        assert_eq!(
            n.route_between(1, 5, &RouteOptions::default()),
            Err(RouteError::NoPathFound { from: 1, to: 5 }),
        );
        assert_eq!(
            n.route_between(1, 99, &RouteOptions::default()),
            Err(RouteError::UnknownVertex(99)),
        );
    }

    #[test]
    fn shortest_path_one_way() {
        //     ┌──1──▶ B ──1──┐
        //   A                 C
        //     └──────5───────┘
        let mut b = NetworkBuilder::new();
        b.add_vertex(1, Point::new(0.0, 0.0))
            .add_vertex(2, Point::new(0.01, 0.01))
            .add_vertex(3, Point::new(0.02, 0.0))
            .add_edge(1, 1, 2, 1.0, -1.0, vec![])
            .add_edge(2, 2, 3, 1.0, -1.0, vec![])
            .add_edge(3, 1, 3, 5.0, 5.0, vec![]);
        let n = b.build().unwrap();

        let there = n.route_between(1, 3, &RouteOptions::default()).unwrap();
        assert_eq!(there.cost, 2.0);
        assert_eq!(there.edges.len(), 2);

        let back = n.route_between(3, 1, &RouteOptions::default()).unwrap();
        assert_eq!(back.cost, 5.0);
        assert_eq!(
            back.edges,
            vec![TraversedEdge {
                id: 3,
                forward: false,
                cost: 5.0,
                length: n.edges()[2].length,
            }],
        );
        assert_eq!(back.geometry, vec![vec![Point::new(0.02, 0.0), Point::new(0.0, 0.0)]]);

        assert_eq!(n.cost_between(2, 1), f64::INFINITY);
        assert_eq!(n.cost_between(1, 2), 1.0);
    }

    #[test]
    fn shortest_path_asymmetric_costs() {
        let mut b = NetworkBuilder::new();
        b.add_vertex(1, Point::new(0.0, 0.0))
            .add_vertex(2, Point::new(0.01, 0.0))
            .add_edge(1, 1, 2, 1.0, 4.0, vec![]);
        let n = b.build().unwrap();

        assert_eq!(n.route_between(1, 2, &RouteOptions::default()).unwrap().cost, 1.0);
        assert_eq!(n.route_between(2, 1, &RouteOptions::default()).unwrap().cost, 4.0);
    }

    #[test]
    fn step_limit() {
        let n = abc_network();
        let options = RouteOptions {
            step_limit: 1,
            timeout: None,
        };
        assert_eq!(
            n.route_between(1, 3, &options),
            Err(RouteError::StepLimitExceeded)
        );
    }

    #[test]
    fn timeout() {
        // 40×40 grid with unit costs; the opposite corner is the last vertex reached
        const SIDE: i64 = 40;
        let id = |row: i64, col: i64| row * SIDE + col + 1;

        let mut b = NetworkBuilder::new();
        for row in 0..SIDE {
            for col in 0..SIDE {
                b.add_vertex(
                    id(row, col),
                    Point::new(18.0 + col as f64 * 0.001, 59.3 + row as f64 * 0.001),
                );
            }
        }

        let mut edge_id = 0;
        for row in 0..SIDE {
            for col in 0..SIDE {
                if col + 1 < SIDE {
                    edge_id += 1;
                    b.add_edge(edge_id, id(row, col), id(row, col + 1), 1.0, 1.0, vec![]);
                }
                if row + 1 < SIDE {
                    edge_id += 1;
                    b.add_edge(edge_id, id(row, col), id(row + 1, col), 1.0, 1.0, vec![]);
                }
            }
        }
        let n = b.build().unwrap();

        let options = RouteOptions {
            step_limit: DEFAULT_STEP_LIMIT,
            timeout: Some(Duration::ZERO),
        };
        assert_eq!(
            n.route_between(id(0, 0), id(SIDE - 1, SIDE - 1), &options),
            Err(RouteError::Timeout)
        );

        let options = RouteOptions {
            step_limit: DEFAULT_STEP_LIMIT,
            timeout: None,
        };
        let r = n.route_between(id(0, 0), id(SIDE - 1, SIDE - 1), &options).unwrap();
        assert_eq!(r.edges.len(), 2 * (SIDE as usize - 1));
    }

    #[test]
    fn snap_to_vertex() {
        let n = abc_network();
        assert_eq!(n.snap_to_vertex(Point::new(18.011, 59.399)).unwrap().id, 5);
        assert!(matches!(
            n.snap_to_vertex(Point::new(200.0, 0.0)),
            Err(RouteError::Validation(_)),
        ));
        assert_eq!(
            Network::default().snap_to_vertex(Point::new(18.0, 59.3)),
            Err(RouteError::NoVertexFound),
        );
    }

    #[test]
    fn build_rejects_bad_input() {
        let mut b = NetworkBuilder::new();
        b.add_vertex(1, Point::new(0.0, 0.0)).add_edge(1, 1, 2, 1.0, 1.0, vec![]);
        assert!(matches!(
            b.build(),
            Err(LoadError::UnknownVertex { edge: 1, vertex: 2 }),
        ));

        let mut b = NetworkBuilder::new();
        b.add_vertex(1, Point::new(0.0, 0.0))
            .add_vertex(2, Point::new(0.0, 0.1))
            .add_edge(7, 1, 2, f64::NAN, 1.0, vec![]);
        assert!(matches!(b.build(), Err(LoadError::InvalidCost(7))));

        let mut b = NetworkBuilder::new();
        b.add_vertex(1, Point::new(0.0, 0.0)).add_vertex(1, Point::new(0.0, 0.1));
        assert!(matches!(b.build(), Err(LoadError::DuplicateId { id: 1, .. })));
    }
}
