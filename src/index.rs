//! The disk-resident graph index.
//!
//! A flat proximity graph over memory-mapped tables. Internal IDs are
//! dense 0-based slot indices into both tables; callers see 1-based
//! external IDs that stay valid across restarts. Deleted slots are
//! tombstoned (free-listed, payload zeroed, row cleared) and reused by
//! later inserts.
//!
//! All mutations commit a metadata snapshot before returning, so reopen
//! always recovers to the last successful operation. Back-patching
//! during insert is best-effort between commits: a crash mid-insert
//! loses at most some reverse edges, never graph validity.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::IndexOptions;
use crate::distance::Metric;
use crate::element::Element;
use crate::error::{IndexError, Result};
use crate::keymap::KeyMap;
use crate::meta::Metadata;
use crate::table::{AdjacencyTable, VectorTable};
use crate::traverse::traverse;

/// Slots allocated at creation; also the growth-step floor.
const INITIAL_CAPACITY: usize = 1024;

/// The five on-disk paths derived from a caller prefix.
#[derive(Debug, Clone)]
pub(crate) struct IndexPaths {
    pub vec: PathBuf,
    pub adj: PathBuf,
    pub meta: PathBuf,
    pub forward: PathBuf,
    pub reverse: PathBuf,
}

impl IndexPaths {
    pub fn for_prefix(prefix: &Path) -> Self {
        let make = |suffix: &str| {
            let mut s: OsString = prefix.as_os_str().to_os_string();
            s.push(suffix);
            PathBuf::from(s)
        };
        Self {
            vec: make(".vec"),
            adj: make(".adj"),
            meta: make(".meta"),
            forward: make(".forward.redb"),
            reverse: make(".reverse.redb"),
        }
    }

    fn all(&self) -> [&Path; 5] {
        [&self.vec, &self.adj, &self.meta, &self.forward, &self.reverse]
    }
}

/// A disk-resident dynamic ANN index over element type `T`.
///
/// One handle exclusively owns the mapped files under its prefix; at
/// most one writer per index directory.
pub struct DiskIndex<T: Element> {
    vectors: VectorTable<T>,
    adjacency: AdjacencyTable,
    meta: Metadata,
    keys: KeyMap,
    meta_path: PathBuf,
    ef_search: usize,
    ef_construction: usize,
    metric: Metric,
}

impl<T: Element> DiskIndex<T> {
    /// Create a fresh index under `prefix`.
    pub fn create(prefix: impl AsRef<Path>, dim: usize, opts: IndexOptions) -> Result<Self> {
        if dim == 0 {
            return Err(IndexError::InvalidParameter("dimension must be positive".into()));
        }
        if opts.max_degree == 0 {
            return Err(IndexError::InvalidParameter("max_degree must be positive".into()));
        }

        let paths = IndexPaths::for_prefix(prefix.as_ref());
        let vectors = VectorTable::<T>::create(&paths.vec, dim, INITIAL_CAPACITY)?;
        let adjacency = AdjacencyTable::create(&paths.adj, opts.max_degree, INITIAL_CAPACITY)?;
        let meta = Metadata::new(dim as u32, opts.max_degree as u32, T::TAG);
        meta.commit(&paths.meta)?;
        let keys = KeyMap::open(&paths.forward, &paths.reverse)?;

        debug!(prefix = %prefix.as_ref().display(), dim, max_degree = opts.max_degree, "index created");
        Ok(Self {
            vectors,
            adjacency,
            meta,
            keys,
            meta_path: paths.meta,
            ef_search: opts.ef_search,
            ef_construction: opts.ef_construction,
            metric: opts.metric,
        })
    }

    /// Reopen an existing index under `prefix` with default tunables.
    pub fn open(prefix: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(prefix, IndexOptions::default())
    }

    /// Reopen an existing index; `max_degree` and the dimension come
    /// from the stored metadata, the remaining tunables from `opts`.
    pub fn open_with_options(prefix: impl AsRef<Path>, opts: IndexOptions) -> Result<Self> {
        let paths = IndexPaths::for_prefix(prefix.as_ref());
        for path in paths.all() {
            if !path.exists() {
                return Err(IndexError::MissingFile(path.to_path_buf()));
            }
        }

        let meta = Metadata::load(&paths.meta)?;
        if meta.element != T::TAG {
            return Err(IndexError::Corrupted(format!(
                "index stores {} elements, opened as {}",
                meta.element,
                T::TAG
            )));
        }

        let vectors = VectorTable::<T>::open(&paths.vec, meta.dim as usize)?;
        let adjacency = AdjacencyTable::open(&paths.adj, meta.max_degree as usize)?;
        let needed = meta.num_points as usize;
        if vectors.capacity() < needed || adjacency.capacity() < needed {
            return Err(IndexError::Corrupted(format!(
                "tables hold {}/{} slots but metadata claims {} points",
                vectors.capacity(),
                adjacency.capacity(),
                needed
            )));
        }

        let keys = KeyMap::open(&paths.forward, &paths.reverse)?;
        debug!(prefix = %prefix.as_ref().display(), num_points = meta.num_points, "index opened");
        Ok(Self {
            vectors,
            adjacency,
            meta,
            keys,
            meta_path: paths.meta,
            ef_search: opts.ef_search,
            ef_construction: opts.ef_construction,
            metric: opts.metric,
        })
    }

    /// Insert a vector, returning `(effective_key, external_id)`.
    ///
    /// Without an explicit key, the stringified external id becomes the
    /// key. External ids are `internal + 1`.
    pub fn insert(&mut self, vector: &[f32], key: Option<&str>) -> Result<(String, u64)> {
        self.check_dim(vector)?;

        // Pick the slot without committing: growth can fail, and a
        // failed insert must leave the allocation state untouched.
        let reused = self.meta.free_list.last().copied();
        let slot = reused.unwrap_or(self.meta.num_points) as usize;
        self.vectors.ensure_capacity(slot + 1)?;
        self.adjacency.ensure_capacity(slot + 1)?;
        match reused {
            Some(_) => {
                self.meta.free_list.pop();
            }
            None => self.meta.num_points += 1,
        }

        // Store quantized, and use the quantized form for all distances
        // so insertion sees exactly what later queries will see.
        let quantized: Vec<f32> = vector.iter().map(|&v| T::from_f32(v).to_f32()).collect();
        self.vectors.write(slot, &quantized);

        let ext_id = slot as u64 + 1;
        let effective_key = key.map_or_else(|| ext_id.to_string(), str::to_string);

        // Bootstrap: the first live node seeds the graph.
        if self.meta.entrypoint.is_none() {
            self.adjacency.clear_row(slot);
            self.meta.entrypoint = Some(slot as u32);
            self.meta.commit(&self.meta_path)?;
            self.keys.register(&effective_key, ext_id)?;
            return Ok((effective_key, ext_id));
        }

        // Candidate discovery over the current graph.
        let ef = (self.meta.max_degree as usize).max(self.ef_construction);
        let mut candidates = traverse(
            &self.vectors,
            &self.adjacency,
            self.meta.entrypoint,
            &quantized,
            ef,
            self.metric,
        );
        candidates.retain(|&(_, id)| id as usize != slot);
        candidates.truncate(self.meta.max_degree as usize);

        // Forward edges: traversal output is already distance-sorted.
        let forward: Vec<u32> = candidates.iter().map(|&(_, id)| id).collect();
        self.adjacency.set_row(slot, &forward);

        // Back-patch each chosen neighbor, pruning to max_degree.
        for &neighbor in &forward {
            let mut row = self.adjacency.row(neighbor as usize);
            if !row.contains(&(slot as u32)) {
                row.push(slot as u32);
            }
            let pruned = self.pruned_by_distance(neighbor as usize, &row);
            self.adjacency.set_row(neighbor as usize, &pruned);
        }

        self.meta.commit(&self.meta_path)?;
        self.keys.register(&effective_key, ext_id)?;
        Ok((effective_key, ext_id))
    }

    /// Delete by external id.
    pub fn delete(&mut self, ext_id: u64) -> Result<()> {
        let slot = self.resolve_live(ext_id)?;
        let tombstoned: HashSet<u32> = self.meta.free_list.iter().copied().collect();

        // Scrub the target from every live row. Back-patch pruning can
        // leave in-edges the target's own row does not mirror, so the
        // target's neighbor list alone is not enough to find them all.
        for s in 0..self.meta.num_points as usize {
            if s == slot || tombstoned.contains(&(s as u32)) {
                continue;
            }
            let row = self.adjacency.row(s);
            if row.contains(&(slot as u32)) {
                let kept: Vec<u32> = row.into_iter().filter(|&id| id != slot as u32).collect();
                self.adjacency.set_row(s, &kept);
            }
        }

        self.adjacency.clear_row(slot);

        if self.meta.entrypoint == Some(slot as u32) {
            let next = (0..self.meta.num_points)
                .find(|&s| s as usize != slot && !tombstoned.contains(&s));
            debug!(old = slot, new = ?next, "entrypoint repaired");
            self.meta.entrypoint = next;
        }

        self.meta.free_list.push(slot as u32);
        self.vectors.zero(slot);
        self.meta.commit(&self.meta_path)?;
        self.keys.unregister(ext_id)?;
        Ok(())
    }

    /// Delete by user key; unknown keys return `false` without mutation.
    pub fn delete_by_key(&mut self, key: &str) -> Result<bool> {
        match self.keys.id_for(key)? {
            Some(ext_id) => {
                self.delete(ext_id)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Top-k search: `(optional_key, external_id)` pairs, nearest first.
    pub fn search(&self, query: &[f32], topk: usize) -> Result<Vec<(Option<String>, u64)>> {
        if topk == 0 {
            return Err(IndexError::InvalidParameter("topk must be positive".into()));
        }
        self.check_dim(query)?;

        let quantized: Vec<f32> = query.iter().map(|&v| T::from_f32(v).to_f32()).collect();
        let ef = topk.max(self.ef_search);
        let mut found = traverse(
            &self.vectors,
            &self.adjacency,
            self.meta.entrypoint,
            &quantized,
            ef,
            self.metric,
        );
        found.truncate(topk);

        let mut out = Vec::with_capacity(found.len());
        for (_, id) in found {
            let ext_id = u64::from(id) + 1;
            out.push((self.keys.key_for(ext_id)?, ext_id));
        }
        Ok(out)
    }

    /// Fetch a live vector by external id, converted back to f32.
    pub fn get_vector_by_id(&self, ext_id: u64) -> Result<Vec<f32>> {
        let slot = self.resolve_live(ext_id)?;
        Ok(self.vectors.read(slot))
    }

    /// Fetch a live vector by user key.
    pub fn get_vector_by_key(&self, key: &str) -> Result<Vec<f32>> {
        let ext_id = self
            .keys
            .id_for(key)?
            .ok_or_else(|| IndexError::KeyNotFound(key.to_string()))?;
        self.get_vector_by_id(ext_id)
    }

    /// Out-neighbors of a live node, as external ids.
    pub fn neighbors(&self, ext_id: u64) -> Result<Vec<u64>> {
        let slot = self.resolve_live(ext_id)?;
        Ok(self
            .adjacency
            .row(slot)
            .into_iter()
            .map(|id| u64::from(id) + 1)
            .collect())
    }

    /// Highest allocated slot count; never decreases.
    pub fn num_points(&self) -> u64 {
        u64::from(self.meta.num_points)
    }

    /// Number of live (searchable) vectors.
    pub fn len(&self) -> usize {
        self.meta.live_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dim(&self) -> usize {
        self.meta.dim as usize
    }

    pub fn max_degree(&self) -> usize {
        self.meta.max_degree as usize
    }

    /// The traversal seed, as an internal slot index. `None` iff empty.
    pub fn entrypoint(&self) -> Option<u32> {
        self.meta.entrypoint
    }

    /// Tombstoned slots awaiting reuse, oldest first.
    pub fn free_slots(&self) -> &[u32] {
        &self.meta.free_list
    }

    /// Flush the mapped tables and consume the handle. Metadata was
    /// already committed by the last mutation.
    pub fn close(self) -> Result<()> {
        self.vectors.flush()?;
        self.adjacency.flush()?;
        Ok(())
    }

    fn check_dim(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.meta.dim as usize {
            return Err(IndexError::DimensionMismatch {
                expected: self.meta.dim as usize,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Map an external id to its slot, rejecting out-of-range and
    /// tombstoned ids.
    fn resolve_live(&self, ext_id: u64) -> Result<usize> {
        if ext_id == 0 || ext_id > u64::from(self.meta.num_points) {
            return Err(IndexError::InvalidId(ext_id));
        }
        let slot = (ext_id - 1) as u32;
        if self.meta.free_list.contains(&slot) {
            return Err(IndexError::AlreadyDeleted(ext_id));
        }
        Ok(slot as usize)
    }

    /// Order `ids` by ascending distance to `owner` (ties by ascending
    /// id) and keep the closest `max_degree`.
    fn pruned_by_distance(&self, owner: usize, ids: &[u32]) -> Vec<u32> {
        let owner_vec = self.vectors.read(owner);
        let mut scratch = vec![0.0f32; owner_vec.len()];
        let mut scored: Vec<(f32, u32)> = ids
            .iter()
            .map(|&id| {
                self.vectors.read_into(id as usize, &mut scratch);
                (self.metric.distance(&owner_vec, &scratch), id)
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(self.meta.max_degree as usize);
        scored.into_iter().map(|(_, id)| id).collect()
    }
}
