//! warren: a disk-resident dynamic approximate nearest neighbor index.
//!
//! A flat proximity graph in the LM-DiskANN family: adjacency rows and
//! vector payloads live in memory-mapped files, so working-set RAM stays
//! small even when the point set is much larger than memory. The index
//! supports online insertion, online deletion with slot reuse, and top-k
//! queries, with stable 1-based external IDs that survive restarts.
//!
//! # Layout on disk
//!
//! Five files under a caller-supplied prefix `P`:
//!
//! | File | Contents |
//! |------|----------|
//! | `P.vec` | dense vector matrix, little-endian elements |
//! | `P.adj` | fixed-width adjacency rows of i32, `-1` = empty cell |
//! | `P.meta` | snapshot of {num_points, dim, max_degree, free_list, entrypoint} |
//! | `P.forward.redb` | user key -> external id |
//! | `P.reverse.redb` | external id -> user key |
//!
//! Every mutation commits a fresh metadata snapshot (temp file + rename)
//! before returning, so reopening always recovers the last completed
//! operation.
//!
//! # Usage
//!
//! ```no_run
//! use warren::{DiskIndex, IndexOptions};
//!
//! # fn main() -> warren::Result<()> {
//! let mut index = DiskIndex::<f32>::create("/tmp/demo/idx", 128, IndexOptions::default())?;
//!
//! let (key, id) = index.insert(&vec![0.1; 128], Some("doc-1"))?;
//! let hits = index.search(&vec![0.1; 128], 10)?;
//! assert_eq!(hits[0], (Some(key), id));
//!
//! index.delete(id)?;
//! index.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Model and limits
//!
//! - Single writer, no internal synchronization; one handle owns the
//!   mapped files for its lifetime.
//! - Recall is tunable (`max_degree`, `ef_search`, `ef_construction`)
//!   but not contractual; this is approximate search.
//! - The element width (`f16`/`f32`/`f64` via [`Element`]) is pinned at
//!   creation; the distance metric is a runtime choice and must match
//!   across sessions.

pub mod any;
pub mod config;
pub mod distance;
pub mod element;
pub mod error;
pub mod index;
pub mod keymap;
pub mod meta;
pub mod table;

mod traverse;

pub use any::{AnyIndex, ElementType};
pub use config::IndexOptions;
pub use distance::Metric;
pub use element::Element;
pub use error::{IndexError, Result};
pub use index::DiskIndex;
pub use keymap::{KeyMap, KeyStore, RedbStore};
