//! Metadata snapshot.
//!
//! A small self-describing record written after every mutation:
//! `{num_points, dim, max_degree, free_list, entrypoint, element}`. The
//! record is committed by writing a sibling temp file and renaming it
//! into place, so a crash mid-commit leaves the previous snapshot
//! intact and reopen recovers to the last committed state.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IndexError, Result};

/// Sentinel for "no entrypoint" in the serialized record.
const NO_ENTRYPOINT: i64 = -1;

/// In-memory index metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Highest ever allocated slot index plus one. Never decreases.
    pub num_points: u32,
    /// Vector dimensionality.
    pub dim: u32,
    /// Adjacency row width.
    pub max_degree: u32,
    /// Tombstoned slots awaiting reuse, in push order.
    pub free_list: Vec<u32>,
    /// Traversal seed; `None` iff no live node exists.
    pub entrypoint: Option<u32>,
    /// Element type tag (`"f16"`, `"f32"`, `"f64"`).
    pub element: String,
}

/// On-disk shape of [`Metadata`]; `entrypoint = -1` encodes `None`.
#[derive(Serialize, Deserialize)]
struct MetaRecord {
    num_points: u32,
    dim: u32,
    max_degree: u32,
    free_list: Vec<u32>,
    entrypoint: i64,
    element: String,
}

impl Metadata {
    pub fn new(dim: u32, max_degree: u32, element: &str) -> Self {
        Self {
            num_points: 0,
            dim,
            max_degree,
            free_list: Vec::new(),
            entrypoint: None,
            element: element.to_string(),
        }
    }

    /// Number of live (non-tombstoned) slots.
    pub fn live_count(&self) -> usize {
        self.num_points as usize - self.free_list.len()
    }

    /// Commit a snapshot to `path` via temp-file-and-rename.
    pub fn commit(&self, path: &Path) -> Result<()> {
        let record = MetaRecord {
            num_points: self.num_points,
            dim: self.dim,
            max_degree: self.max_degree,
            free_list: self.free_list.clone(),
            entrypoint: self.entrypoint.map_or(NO_ENTRYPOINT, i64::from),
            element: self.element.clone(),
        };
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| IndexError::Corrupted(format!("metadata encode: {e}")))?;

        let tmp = path.with_extension("meta.tmp");
        {
            let mut f = File::create(&tmp)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        debug!(
            num_points = self.num_points,
            free = self.free_list.len(),
            "metadata snapshot committed"
        );
        Ok(())
    }

    /// Load the last committed snapshot from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let record: MetaRecord = serde_json::from_slice(&bytes)
            .map_err(|e| IndexError::Corrupted(format!("metadata decode: {e}")))?;

        let entrypoint = match record.entrypoint {
            NO_ENTRYPOINT => None,
            ep if ep >= 0 && (ep as u64) < u64::from(record.num_points) => Some(ep as u32),
            ep => {
                return Err(IndexError::Corrupted(format!(
                    "entrypoint {ep} out of range for {} points",
                    record.num_points
                )))
            }
        };
        if record.free_list.iter().any(|&id| id >= record.num_points) {
            return Err(IndexError::Corrupted("free list references unallocated slot".into()));
        }

        Ok(Self {
            num_points: record.num_points,
            dim: record.dim,
            max_degree: record.max_degree,
            free_list: record.free_list,
            entrypoint,
            element: record.element,
        })
    }
}
