//! Index construction and search parameters.

use crate::distance::Metric;

/// Tunables for a disk index.
///
/// Defaults favor recall over build speed at typical embedding
/// dimensions; lower `max_degree` and the ef bounds for faster, coarser
/// indices.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Maximum out-degree per node; fixes the adjacency row width on disk.
    pub max_degree: usize,
    /// Traversal bound at query time.
    pub ef_search: usize,
    /// Traversal bound at insertion time.
    pub ef_construction: usize,
    /// Distance metric. Not persisted; reopen under the same metric.
    pub metric: Metric,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            max_degree: 32,
            ef_search: 128,
            ef_construction: 256,
            metric: Metric::L2,
        }
    }
}

impl IndexOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_degree(mut self, max_degree: usize) -> Self {
        self.max_degree = max_degree;
        self
    }

    #[must_use]
    pub fn ef_search(mut self, ef_search: usize) -> Self {
        self.ef_search = ef_search;
        self
    }

    #[must_use]
    pub fn ef_construction(mut self, ef_construction: usize) -> Self {
        self.ef_construction = ef_construction;
        self
    }

    #[must_use]
    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let opts = IndexOptions::default();
        assert_eq!(opts.max_degree, 32);
        assert!(opts.ef_construction >= opts.ef_search);
        assert_eq!(opts.metric, Metric::L2);
    }

    #[test]
    fn builder_chains() {
        let opts = IndexOptions::new().max_degree(16).ef_search(50);
        assert_eq!(opts.max_degree, 16);
        assert_eq!(opts.ef_search, 50);
        assert_eq!(opts.ef_construction, 256);
    }
}
