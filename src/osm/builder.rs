// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::{HashMap, HashSet};

use super::model::{Feature, Node, Way};
use super::Options;
use crate::distance::polyline_length;
use crate::network::{Network, NetworkBuilder};
use crate::{LoadError, Point};

/// A run of a way accepted by the [Profile](super::Profile), with references
/// to unknown nodes already removed. Ways leaving the bounding box are cut
/// into one run per stretch inside the box.
struct RoutableWay {
    id: i64,
    nodes: Vec<i64>,
    penalty: f64,
    forward: bool,
    backward: bool,
}

/// Helper object used for storing state related to converting [OSM features](Feature)
/// into a [Network].
///
/// Ways are "noded": split at every node shared by more than one way
/// (or visited twice by the same way) and at way ends, so that vertices
/// of the network are intersections and dead ends, while all other nodes only
/// contribute to edge geometries.
pub(super) struct NetworkLoader<'a> {
    options: &'a Options<'a>,
    nodes: HashMap<i64, Point>,
    outside: HashSet<i64>,
    ways: Vec<RoutableWay>,
}

impl<'a> NetworkLoader<'a> {
    pub(super) fn new(options: &'a Options<'a>) -> Self {
        Self {
            options,
            nodes: HashMap::default(),
            outside: HashSet::default(),
            ways: Vec::default(),
        }
    }

    /// Add all features from the provided iterator.
    pub(super) fn add_features<I, E>(&mut self, features: I) -> Result<(), LoadError>
    where
        I: IntoIterator<Item = Result<Feature, E>>,
        LoadError: From<E>,
    {
        for f in features {
            match f? {
                Feature::Node(n) => self.add_node(n),
                Feature::Way(w) => self.add_way(w),
            }
        }
        Ok(())
    }

    fn add_node(&mut self, n: Node) {
        let in_bbox = self
            .options
            .bbox
            .map_or(true, |bbox| bbox.contains(n.position));
        if in_bbox {
            self.nodes.insert(n.id, n.position);
        } else {
            self.outside.insert(n.id);
        }
    }

    fn add_way(&mut self, w: Way) {
        let penalty = self.options.profile.way_penalty(&w.tags);
        if !penalty.is_finite() || penalty < 1.0 {
            return;
        }

        let (forward, backward) = self.options.profile.way_direction(&w.tags);
        if !forward && !backward {
            return;
        }

        // Nodes outside of the bbox cut the way, nodes absent from the data are skipped
        let mut runs: Vec<Vec<i64>> = Vec::new();
        let mut run: Vec<i64> = Vec::new();
        let mut missing = 0;
        for &node_id in &w.nodes {
            if self.nodes.contains_key(&node_id) {
                run.push(node_id);
            } else if self.outside.contains(&node_id) {
                runs.push(std::mem::take(&mut run));
            } else {
                missing += 1;
            }
        }
        runs.push(run);

        if missing > 0 {
            log::warn!("way {} references {} missing nodes", w.id, missing);
        }

        runs.retain(|run| run.len() >= 2);
        if runs.is_empty() && self.options.bbox.is_none() {
            log::warn!("way {} has less than 2 known nodes - skipping", w.id);
        }

        for nodes in runs {
            self.ways.push(RoutableWay {
                id: w.id,
                nodes,
                penalty,
                forward,
                backward,
            });
        }
    }

    /// Returns the number of references to every node, with way ends counted twice.
    fn node_uses(&self) -> HashMap<i64, u32> {
        let mut uses: HashMap<i64, u32> = HashMap::default();
        for w in &self.ways {
            for &node_id in &w.nodes {
                *uses.entry(node_id).or_default() += 1;
            }
            if let (Some(&first), Some(&last)) = (w.nodes.first(), w.nodes.last()) {
                *uses.entry(first).or_default() += 1;
                *uses.entry(last).or_default() += 1;
            }
        }
        uses
    }

    /// Splits all ways into edges and builds the [Network].
    pub(super) fn finish(self) -> Result<Network, LoadError> {
        let uses = self.node_uses();
        let is_vertex = |node_id: &i64| uses.get(node_id).is_some_and(|&c| c > 1);

        let mut b = NetworkBuilder::new();
        let mut vertices: Vec<i64> = uses.keys().cloned().filter(is_vertex).collect();
        vertices.sort_unstable();
        for &node_id in &vertices {
            b.add_vertex(node_id, self.nodes[&node_id]);
        }

        let mut edge_id: i64 = 0;
        for w in &self.ways {
            let mut start = 0;
            for end in 1..w.nodes.len() {
                if !is_vertex(&w.nodes[end]) {
                    continue;
                }

                let geometry: Vec<Point> = w.nodes[start..=end]
                    .iter()
                    .map(|node_id| self.nodes[node_id])
                    .collect();
                let cost = w.penalty * polyline_length(&geometry);

                edge_id += 1;
                b.add_edge(
                    edge_id,
                    w.nodes[start],
                    w.nodes[end],
                    if w.forward { cost } else { -1.0 },
                    if w.backward { cost } else { -1.0 },
                    geometry,
                );
                start = end;
            }

            log::debug!("way {} split into edges up to {}", w.id, edge_id);
        }

        b.build()
    }
}
