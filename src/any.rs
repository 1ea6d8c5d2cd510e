//! Element-type-erased index handle.
//!
//! `DiskIndex<T>` is monomorphic over its storage width; `AnyIndex`
//! wraps the three instantiations behind one enum so callers can pick
//! the width at runtime (the on-disk width is pinned at creation and
//! checked against metadata on open).

use std::path::Path;

use half::f16;

use crate::config::IndexOptions;
use crate::error::Result;
use crate::index::DiskIndex;

/// Storage element width, chosen at index creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// IEEE binary16.
    F16,
    /// IEEE binary32.
    F32,
    /// IEEE binary64.
    F64,
}

/// A disk index over any of the three element widths.
pub enum AnyIndex {
    F16(DiskIndex<f16>),
    F32(DiskIndex<f32>),
    F64(DiskIndex<f64>),
}

macro_rules! delegate {
    ($self:ident, $index:ident => $body:expr) => {
        match $self {
            AnyIndex::F16($index) => $body,
            AnyIndex::F32($index) => $body,
            AnyIndex::F64($index) => $body,
        }
    };
}

impl AnyIndex {
    /// Create a fresh index storing `element`-width scalars.
    pub fn create(
        prefix: impl AsRef<Path>,
        dim: usize,
        element: ElementType,
        opts: IndexOptions,
    ) -> Result<Self> {
        Ok(match element {
            ElementType::F16 => Self::F16(DiskIndex::create(prefix, dim, opts)?),
            ElementType::F32 => Self::F32(DiskIndex::create(prefix, dim, opts)?),
            ElementType::F64 => Self::F64(DiskIndex::create(prefix, dim, opts)?),
        })
    }

    /// Reopen an existing index of the stated element width.
    pub fn open(prefix: impl AsRef<Path>, element: ElementType) -> Result<Self> {
        Self::open_with_options(prefix, element, IndexOptions::default())
    }

    pub fn open_with_options(
        prefix: impl AsRef<Path>,
        element: ElementType,
        opts: IndexOptions,
    ) -> Result<Self> {
        Ok(match element {
            ElementType::F16 => Self::F16(DiskIndex::open_with_options(prefix, opts)?),
            ElementType::F32 => Self::F32(DiskIndex::open_with_options(prefix, opts)?),
            ElementType::F64 => Self::F64(DiskIndex::open_with_options(prefix, opts)?),
        })
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Self::F16(_) => ElementType::F16,
            Self::F32(_) => ElementType::F32,
            Self::F64(_) => ElementType::F64,
        }
    }

    pub fn insert(&mut self, vector: &[f32], key: Option<&str>) -> Result<(String, u64)> {
        delegate!(self, index => index.insert(vector, key))
    }

    pub fn delete(&mut self, ext_id: u64) -> Result<()> {
        delegate!(self, index => index.delete(ext_id))
    }

    pub fn delete_by_key(&mut self, key: &str) -> Result<bool> {
        delegate!(self, index => index.delete_by_key(key))
    }

    pub fn search(&self, query: &[f32], topk: usize) -> Result<Vec<(Option<String>, u64)>> {
        delegate!(self, index => index.search(query, topk))
    }

    pub fn get_vector_by_id(&self, ext_id: u64) -> Result<Vec<f32>> {
        delegate!(self, index => index.get_vector_by_id(ext_id))
    }

    pub fn get_vector_by_key(&self, key: &str) -> Result<Vec<f32>> {
        delegate!(self, index => index.get_vector_by_key(key))
    }

    pub fn num_points(&self) -> u64 {
        delegate!(self, index => index.num_points())
    }

    pub fn len(&self) -> usize {
        delegate!(self, index => index.len())
    }

    pub fn is_empty(&self) -> bool {
        delegate!(self, index => index.is_empty())
    }

    pub fn dim(&self) -> usize {
        delegate!(self, index => index.dim())
    }

    pub fn close(self) -> Result<()> {
        delegate!(self, index => index.close())
    }
}
