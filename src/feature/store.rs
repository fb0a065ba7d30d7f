// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::btree_map::{BTreeMap, Entry as MapEntry};

use crate::kd::{KDTree, Located};
use crate::{Feature, FeatureKind, LoadError, Point};

/// A [Feature] returned by a spatial query, with its distance (in meters)
/// from the query position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<'a> {
    pub feature: &'a Feature,
    pub distance: f64,
}

/// Position of a feature, as stored in the spatial index.
#[derive(Debug, Clone, Copy)]
struct Entry {
    id: i64,
    position: Point,
}

impl Located for Entry {
    fn id(&self) -> i64 {
        self.id
    }

    fn position(&self) -> Point {
        self.position
    }
}

#[derive(Debug, Default)]
struct Layer {
    features: BTreeMap<i64, Feature>,
    index: Option<KDTree<Entry>>,
}

impl Layer {
    fn resolve<'a>(&'a self, found: Vec<(&Entry, f64)>) -> Vec<Neighbor<'a>> {
        found
            .into_iter()
            .filter_map(|(entry, distance)| {
                self.features
                    .get(&entry.id)
                    .map(|feature| Neighbor { feature, distance })
            })
            .collect()
    }
}

/// Holds all [Features](Feature), separately for every [FeatureKind], and answers
/// spatial queries over them.
///
/// The store is filled once, at startup, and is read-only afterwards.
/// Distances are great-circle distances in meters; results are ordered by
/// ascending distance, with ties broken by ascending feature id.
#[derive(Debug, Default)]
pub struct FeatureStore {
    pumps: Layer,
    parking: Layer,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn layer(&self, kind: FeatureKind) -> &Layer {
        match kind {
            FeatureKind::Pump => &self.pumps,
            FeatureKind::Parking => &self.parking,
        }
    }

    /// Replaces all features of a given kind and rebuilds the spatial index.
    /// Returns the number of loaded features.
    ///
    /// Fails if any feature has invalid coordinates, has attributes of a different kind,
    /// or if feature ids are not unique. The store is not modified on failure.
    pub fn load<I: IntoIterator<Item = Feature>>(
        &mut self,
        kind: FeatureKind,
        features: I,
    ) -> Result<usize, LoadError> {
        let mut by_id = BTreeMap::default();

        for f in features {
            if f.kind() != kind {
                return Err(LoadError::KindMismatch {
                    id: f.id,
                    expected: kind,
                    got: f.kind(),
                });
            }

            if !f.position.is_valid() {
                return Err(LoadError::InvalidCoordinate {
                    kind: kind.as_str(),
                    id: f.id,
                    lon: f.position.lon,
                    lat: f.position.lat,
                });
            }

            match by_id.entry(f.id) {
                MapEntry::Vacant(e) => {
                    e.insert(f);
                }
                MapEntry::Occupied(e) => {
                    return Err(LoadError::DuplicateId {
                        kind: kind.as_str(),
                        id: *e.key(),
                    });
                }
            }
        }

        let index = KDTree::from_iter(by_id.values().map(|f: &Feature| Entry {
            id: f.id,
            position: f.position,
        }));
        let count = by_id.len();
        log::info!("loaded {} {} features", count, kind);

        let layer = match kind {
            FeatureKind::Pump => &mut self.pumps,
            FeatureKind::Parking => &mut self.parking,
        };
        *layer = Layer {
            features: by_id,
            index,
        };

        Ok(count)
    }

    /// Returns the number of features of a given kind.
    pub fn len(&self, kind: FeatureKind) -> usize {
        self.layer(kind).features.len()
    }

    /// Returns true if there are no features of a given kind.
    pub fn is_empty(&self, kind: FeatureKind) -> bool {
        self.layer(kind).features.is_empty()
    }

    /// Retrieves a [Feature] by its kind and id.
    pub fn get(&self, kind: FeatureKind, id: i64) -> Option<&Feature> {
        self.layer(kind).features.get(&id)
    }

    /// Returns an iterator over all [Features](Feature) of a given kind, ordered by id.
    pub fn all(&self, kind: FeatureKind) -> impl Iterator<Item = &Feature> {
        self.layer(kind).features.values()
    }

    /// Returns up to `k` features of a given kind closest to `p`.
    pub fn nearest(&self, kind: FeatureKind, p: Point, k: usize) -> Vec<Neighbor<'_>> {
        let layer = self.layer(kind);
        match layer.index {
            Some(ref index) => layer.resolve(index.find_k_nearest(p, k)),
            None => Vec::default(),
        }
    }

    /// Returns all features of a given kind no further than `radius` meters from `p`.
    pub fn within(&self, kind: FeatureKind, p: Point, radius: f64) -> Vec<Neighbor<'_>> {
        let layer = self.layer(kind);
        match layer.index {
            Some(ref index) => layer.resolve(index.find_within(p, radius)),
            None => Vec::default(),
        }
    }
}
