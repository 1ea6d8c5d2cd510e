//! Best-first graph traversal.
//!
//! The single expansion primitive behind both queries and insertion:
//! starting from the entrypoint, greedily expand the closest unexpanded
//! node until the frontier cannot improve the result set. Traversal only
//! reads the tables and has no side effects, so an abandoned traversal
//! is always safe.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use crate::distance::Metric;
use crate::element::Element;
use crate::table::{AdjacencyTable, VectorTable};

/// A visited node ordered by distance, ties by ascending internal ID.
///
/// The lexicographic `(distance, id)` order makes both heap disciplines
/// deterministic: the frontier pops the lowest id among equidistant
/// nodes, and the bounded result set evicts the highest.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    dist: f32,
    id: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist && self.id == other.id
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist.total_cmp(&other.dist).then(self.id.cmp(&other.id))
    }
}

/// Greedy best-first expansion from `entrypoint`.
///
/// Returns up to `ef` `(distance, internal_id)` pairs sorted by ascending
/// distance, ties by ascending id. An index with no entrypoint yields an
/// empty result.
pub(crate) fn traverse<T: Element>(
    vectors: &VectorTable<T>,
    adjacency: &AdjacencyTable,
    entrypoint: Option<u32>,
    query: &[f32],
    ef: usize,
    metric: Metric,
) -> Vec<(f32, u32)> {
    let Some(entry) = entrypoint else {
        return Vec::new();
    };
    if ef == 0 {
        return Vec::new();
    }

    let mut scratch = vec![0.0f32; query.len()];
    let mut dist_to = |id: u32| {
        vectors.read_into(id as usize, &mut scratch);
        metric.distance(query, &scratch)
    };

    let mut visited: HashSet<u32> = HashSet::new();
    // Min-heap of unexpanded nodes.
    let mut frontier: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
    // Max-heap of the best `ef` nodes seen; peek is the current worst.
    let mut results: BinaryHeap<Candidate> = BinaryHeap::new();

    let seed = Candidate { dist: dist_to(entry), id: entry };
    visited.insert(entry);
    frontier.push(Reverse(seed));
    results.push(seed);

    while let Some(Reverse(current)) = frontier.pop() {
        if results.len() >= ef {
            let worst = results.peek().map_or(f32::INFINITY, |c| c.dist);
            if current.dist > worst {
                break;
            }
        }

        for neighbor in adjacency.row(current.id as usize) {
            if !visited.insert(neighbor) {
                continue;
            }
            let cand = Candidate { dist: dist_to(neighbor), id: neighbor };
            frontier.push(Reverse(cand));

            if results.len() < ef {
                results.push(cand);
            } else if let Some(&worst) = results.peek() {
                if cand.dist < worst.dist {
                    results.pop();
                    results.push(cand);
                }
            }
        }
    }

    let mut out: Vec<(f32, u32)> = results.into_iter().map(|c| (c.dist, c.id)).collect();
    out.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    out
}
