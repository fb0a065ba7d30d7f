// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

use super::{Link, Network, RouteError, RouteOptions};

/// How many expansions happen between two checks of the clock.
const CLOCK_CHECK_INTERVAL: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct QueueItem {
    at: i64,
    cost: f64,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // NOTE: We revert the order of comparison,
        // as lower costs are considered better ("higher"),
        // and Rust's BinaryHeap is a max-heap.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.at.cmp(&self.at))
    }
}

fn reconstruct_path(came_from: &HashMap<i64, (i64, Link)>, mut last: i64) -> Vec<Link> {
    let mut path = Vec::default();

    while let Some(&(prev, link)) = came_from.get(&last) {
        path.push(link);
        last = prev;
    }

    path.reverse();
    return path;
}

/// Uses [Dijkstra's algorithm](https://en.wikipedia.org/wiki/Dijkstra%27s_algorithm)
/// to find the cheapest sequence of [Links](Link) between two vertices of the network.
///
/// Returns an empty vector if `from_id == to_id`.
pub(super) fn find_path(
    n: &Network,
    from_id: i64,
    to_id: i64,
    options: &RouteOptions,
) -> Result<Vec<Link>, RouteError> {
    n.get_vertex(from_id)
        .ok_or(RouteError::UnknownVertex(from_id))?;
    n.get_vertex(to_id).ok_or(RouteError::UnknownVertex(to_id))?;

    let started = Instant::now();
    let mut queue: BinaryHeap<QueueItem> = BinaryHeap::default();
    let mut came_from: HashMap<i64, (i64, Link)> = HashMap::default();
    let mut known_costs: HashMap<i64, f64> = HashMap::default();
    let mut steps: usize = 0;

    queue.push(QueueItem {
        at: from_id,
        cost: 0.0,
    });
    known_costs.insert(from_id, 0.0);

    while let Some(item) = queue.pop() {
        if item.at == to_id {
            log::debug!(
                "path {} -> {} found after {} steps, cost {}",
                from_id,
                to_id,
                steps,
                item.cost
            );
            return Ok(reconstruct_path(&came_from, to_id));
        }

        // Multiple items for the same vertex might be kept in the queue.
        if item.cost > known_costs.get(&item.at).cloned().unwrap_or(f64::INFINITY) {
            continue;
        }

        steps += 1;
        if steps > options.step_limit {
            return Err(RouteError::StepLimitExceeded);
        }
        if steps % CLOCK_CHECK_INTERVAL == 0 {
            if let Some(timeout) = options.timeout {
                if started.elapsed() > timeout {
                    return Err(RouteError::Timeout);
                }
            }
        }

        for &link in n.get_links(item.at) {
            let neighbor_cost = item.cost + link.cost;
            if neighbor_cost
                >= known_costs
                    .get(&link.to)
                    .cloned()
                    .unwrap_or(f64::INFINITY)
            {
                continue;
            }

            came_from.insert(link.to, (item.at, link));
            known_costs.insert(link.to, neighbor_cost);
            queue.push(QueueItem {
                at: link.to,
                cost: neighbor_cost,
            });
        }
    }

    log::debug!(
        "no path {} -> {}, {} vertices reachable",
        from_id,
        to_id,
        steps
    );
    Err(RouteError::NoPathFound {
        from: from_id,
        to: to_id,
    })
}
