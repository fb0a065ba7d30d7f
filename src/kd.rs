// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::cmp::Ordering;

use crate::distance::{distance_to_meridian, distance_to_parallel};
use crate::{earth_distance, Point};

/// Anything which can be stored in a [KDTree]: a position with a stable id.
/// Ids are used to break ties between equidistant items.
pub trait Located {
    fn id(&self) -> i64;
    fn position(&self) -> Point;
}

/// KDTree implements the [k-d tree data structure](https://en.wikipedia.org/wiki/K-d_tree),
/// which is used to speed up nearest-neighbor and radius searches over features and
/// network vertices.
///
/// The tree splits on latitude and longitude alternately, like a planar tree,
/// but all distances (including the ones used for pruning) are computed on the sphere.
/// The pruning bounds are exact for data which doesn't cross the antimeridian.
#[derive(Debug, Clone)]
pub struct KDTree<T> {
    pivot: T,
    left: Option<Box<KDTree<T>>>,
    right: Option<Box<KDTree<T>>>,
}

/// Orders search results by ascending distance, then by ascending id.
pub fn by_distance_then_id<T: Located>(a: &(&T, f64), b: &(&T, f64)) -> Ordering {
    a.1.total_cmp(&b.1).then_with(|| a.0.id().cmp(&b.0.id()))
}

impl<T: Located> KDTree<T> {
    /// Finds the closest item to the given position, together with its distance in meters.
    /// Equidistant items are resolved in favor of the smaller id.
    pub fn find_nearest(&self, p: Point) -> (&T, f64) {
        self.find_nearest_impl(p, false)
    }

    fn find_nearest_impl(&self, p: Point, lon_divides: bool) -> (&T, f64) {
        // Start by assuming that pivot is the closest
        let mut best = (&self.pivot, earth_distance(p, self.pivot.position()));

        let (first, second) = self.branches(p, lon_divides);

        if let Some(branch) = first {
            let alt = branch.find_nearest_impl(p, !lon_divides);
            if by_distance_then_id(&alt, &best) == Ordering::Less {
                best = alt;
            }
        }

        // A closer item is possible in the second branch if and only if
        // the splitting axis is not further than the current best candidate.
        if let Some(branch) = second {
            if self.distance_to_axis(p, lon_divides) <= best.1 {
                let alt = branch.find_nearest_impl(p, !lon_divides);
                if by_distance_then_id(&alt, &best) == Ordering::Less {
                    best = alt;
                }
            }
        }

        best
    }

    /// Finds up to `k` items closest to the given position, ordered by
    /// [distance and id](by_distance_then_id).
    pub fn find_k_nearest(&self, p: Point, k: usize) -> Vec<(&T, f64)> {
        let mut found = Vec::with_capacity(k.min(1024));
        if k > 0 {
            self.find_k_nearest_impl(p, k, false, &mut found);
        }
        found
    }

    fn find_k_nearest_impl<'a>(
        &'a self,
        p: Point,
        k: usize,
        lon_divides: bool,
        found: &mut Vec<(&'a T, f64)>,
    ) {
        insert_bounded(found, (&self.pivot, earth_distance(p, self.pivot.position())), k);

        let (first, second) = self.branches(p, lon_divides);

        if let Some(branch) = first {
            branch.find_k_nearest_impl(p, k, !lon_divides, found);
        }

        if let Some(branch) = second {
            let worst = if found.len() < k {
                f64::INFINITY
            } else {
                found[found.len() - 1].1
            };

            if self.distance_to_axis(p, lon_divides) <= worst {
                branch.find_k_nearest_impl(p, k, !lon_divides, found);
            }
        }
    }

    /// Finds all items no further than `radius` meters from the given position, ordered by
    /// [distance and id](by_distance_then_id).
    pub fn find_within(&self, p: Point, radius: f64) -> Vec<(&T, f64)> {
        let mut found = Vec::default();
        self.find_within_impl(p, radius, false, &mut found);
        found.sort_by(by_distance_then_id);
        found
    }

    fn find_within_impl<'a>(
        &'a self,
        p: Point,
        radius: f64,
        lon_divides: bool,
        found: &mut Vec<(&'a T, f64)>,
    ) {
        let dist = earth_distance(p, self.pivot.position());
        if dist <= radius {
            found.push((&self.pivot, dist));
        }

        let (first, second) = self.branches(p, lon_divides);

        if let Some(branch) = first {
            branch.find_within_impl(p, radius, !lon_divides, found);
        }

        if let Some(branch) = second {
            if self.distance_to_axis(p, lon_divides) <= radius {
                branch.find_within_impl(p, radius, !lon_divides, found);
            }
        }
    }

    /// Returns the branch on the same side of the splitting axis as `p` first.
    fn branches(&self, p: Point, lon_divides: bool) -> (Option<&Self>, Option<&Self>) {
        let pivot = self.pivot.position();
        let first_left = if lon_divides {
            p.lon < pivot.lon
        } else {
            p.lat < pivot.lat
        };

        if first_left {
            (self.left.as_deref(), self.right.as_deref())
        } else {
            (self.right.as_deref(), self.left.as_deref())
        }
    }

    fn distance_to_axis(&self, p: Point, lon_divides: bool) -> f64 {
        let pivot = self.pivot.position();
        if lon_divides {
            distance_to_meridian(p, pivot.lon)
        } else {
            distance_to_parallel(p, pivot.lat)
        }
    }

    /// Returns the number of items in the tree.
    pub fn len(&self) -> usize {
        1 + self.left.as_ref().map_or(0, |b| b.len()) + self.right.as_ref().map_or(0, |b| b.len())
    }
}

impl<T: Located + Clone> KDTree<T> {
    /// Builds a k-d tree from an iterable of items. Returns `None` if there are no items.
    pub fn from_iter<I: IntoIterator<Item = T>>(items: I) -> Option<Self> {
        let mut items = items.into_iter().collect::<Vec<_>>();
        Self::build(items.as_mut_slice())
    }

    /// Builds a k-d tree from a mutable slice of items. Items will be reordered
    /// in the slice to facilitate building the tree.
    pub fn build(items: &mut [T]) -> Option<Self> {
        Self::build_impl(items, false)
    }

    fn build_impl(items: &mut [T], lon_divides: bool) -> Option<Self> {
        match items.len() {
            0 => None,
            1 => Some(Self {
                pivot: items[0].clone(),
                left: None,
                right: None,
            }),
            _ => {
                if lon_divides {
                    items.sort_by(|a, b| a.position().lon.total_cmp(&b.position().lon));
                } else {
                    items.sort_by(|a, b| a.position().lat.total_cmp(&b.position().lat));
                }
                let median = items.len() / 2;
                let pivot = items[median].clone();
                let (left, right_and_pivot) = items.split_at_mut(median);
                let right = &mut right_and_pivot[1..];
                Some(Self {
                    pivot,
                    left: Self::build_impl(left, !lon_divides).map(Box::new),
                    right: Self::build_impl(right, !lon_divides).map(Box::new),
                })
            }
        }
    }
}

fn insert_bounded<'a, T: Located>(found: &mut Vec<(&'a T, f64)>, item: (&'a T, f64), k: usize) {
    let idx = found.partition_point(|probe| by_distance_then_id(probe, &item) == Ordering::Less);
    if idx < k {
        found.insert(idx, item);
        found.truncate(k);
    }
}
