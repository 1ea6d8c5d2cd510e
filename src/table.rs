//! Memory-mapped vector and adjacency tables.
//!
//! Both tables are dense matrices over fixed-width slots: the vector
//! table holds `dim` elements of `T` per slot, the adjacency table holds
//! `max_degree` little-endian `i32` cells per slot with `-1` marking an
//! empty cell. Slot `i` starts at byte `i * slot_bytes`, giving O(1)
//! random access to any node.
//!
//! Growth extends the file (zero-filling the appended bytes) and remaps.
//! Remapping invalidates any borrowed view of the old mapping; both grow
//! paths take `&mut self`, so the borrow checker rules out survivors.

use std::fs::{File, OpenOptions};
use std::marker::PhantomData;
use std::path::Path;

use memmap2::MmapMut;
use smallvec::SmallVec;
use tracing::debug;

use crate::element::Element;
use crate::error::{IndexError, Result};

/// Empty-cell sentinel in the adjacency table.
pub const SENTINEL: i32 = -1;

/// Inline capacity for adjacency row reads; rows at the default degree
/// never spill to the heap.
pub type Row = SmallVec<[u32; 32]>;

/// Growth policy: double, with a floor of 1024 slots per step.
fn grown_capacity(current: usize, needed: usize) -> usize {
    needed.max(current + current.max(1024))
}

fn open_rw(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().read(true).write(true).open(path)?)
}

fn create_rw(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?)
}

/// Extend `file` to hold `capacity * slot_bytes` bytes and remap.
fn grow_mapping(file: &File, mmap: &mut MmapMut, capacity: usize, slot_bytes: usize) -> Result<()> {
    mmap.flush()?;
    file.set_len((capacity * slot_bytes) as u64)?;
    *mmap = unsafe { MmapMut::map_mut(file)? };
    Ok(())
}

fn map_existing(path: &Path, slot_bytes: usize) -> Result<(File, MmapMut, usize)> {
    let file = open_rw(path)?;
    let len = file.metadata()?.len() as usize;
    if len == 0 || len % slot_bytes != 0 {
        return Err(IndexError::Corrupted(format!(
            "{}: length {len} not a multiple of slot size {slot_bytes}",
            path.display()
        )));
    }
    let mmap = unsafe { MmapMut::map_mut(&file)? };
    Ok((file, mmap, len / slot_bytes))
}

/// The vector payload table: `capacity` slots of `dim` elements of `T`.
pub struct VectorTable<T: Element> {
    file: File,
    mmap: MmapMut,
    dim: usize,
    capacity: usize,
    _elem: PhantomData<T>,
}

impl<T: Element> VectorTable<T> {
    pub fn create(path: &Path, dim: usize, capacity: usize) -> Result<Self> {
        let file = create_rw(path)?;
        file.set_len((capacity * dim * T::WIDTH) as u64)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { file, mmap, dim, capacity, _elem: PhantomData })
    }

    pub fn open(path: &Path, dim: usize) -> Result<Self> {
        let (file, mmap, capacity) = map_existing(path, dim * T::WIDTH)?;
        Ok(Self { file, mmap, dim, capacity, _elem: PhantomData })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grow to hold at least `needed` slots. No-op if already large enough.
    pub fn ensure_capacity(&mut self, needed: usize) -> Result<()> {
        if needed <= self.capacity {
            return Ok(());
        }
        let new_capacity = grown_capacity(self.capacity, needed);
        debug!(from = self.capacity, to = new_capacity, "growing vector table");
        grow_mapping(&self.file, &mut self.mmap, new_capacity, self.dim * T::WIDTH)?;
        self.capacity = new_capacity;
        Ok(())
    }

    #[inline]
    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let bytes = self.dim * T::WIDTH;
        slot * bytes..(slot + 1) * bytes
    }

    /// Write a vector (converted to `T`) into `slot`.
    pub fn write(&mut self, slot: usize, values: &[f32]) {
        debug_assert!(slot < self.capacity);
        debug_assert_eq!(values.len(), self.dim);
        let range = self.slot_range(slot);
        let dst = &mut self.mmap[range];
        for (chunk, &v) in dst.chunks_exact_mut(T::WIDTH).zip(values) {
            T::from_f32(v).write_le(chunk);
        }
    }

    /// Decode `slot` into `out` as f32.
    pub fn read_into(&self, slot: usize, out: &mut [f32]) {
        debug_assert!(slot < self.capacity);
        debug_assert_eq!(out.len(), self.dim);
        let src = &self.mmap[self.slot_range(slot)];
        for (chunk, v) in src.chunks_exact(T::WIDTH).zip(out.iter_mut()) {
            *v = T::read_le(chunk).to_f32();
        }
    }

    /// Decode `slot` into a fresh vector.
    pub fn read(&self, slot: usize) -> Vec<f32> {
        let mut out = vec![0.0; self.dim];
        self.read_into(slot, &mut out);
        out
    }

    /// Zero the payload of `slot`.
    pub fn zero(&mut self, slot: usize) {
        debug_assert!(slot < self.capacity);
        let range = self.slot_range(slot);
        self.mmap[range].fill(0);
    }

    pub fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

/// The adjacency table: `capacity` rows of `max_degree` i32 cells.
pub struct AdjacencyTable {
    file: File,
    mmap: MmapMut,
    max_degree: usize,
    capacity: usize,
}

impl AdjacencyTable {
    pub fn create(path: &Path, max_degree: usize, capacity: usize) -> Result<Self> {
        let file = create_rw(path)?;
        file.set_len((capacity * max_degree * 4) as u64)?;
        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        fill_sentinels(&mut mmap);
        Ok(Self { file, mmap, max_degree, capacity })
    }

    pub fn open(path: &Path, max_degree: usize) -> Result<Self> {
        let (file, mmap, capacity) = map_existing(path, max_degree * 4)?;
        Ok(Self { file, mmap, max_degree, capacity })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grow to hold at least `needed` rows, sentinel-filling new rows.
    pub fn ensure_capacity(&mut self, needed: usize) -> Result<()> {
        if needed <= self.capacity {
            return Ok(());
        }
        let new_capacity = grown_capacity(self.capacity, needed);
        debug!(from = self.capacity, to = new_capacity, "growing adjacency table");
        let old_bytes = self.capacity * self.max_degree * 4;
        grow_mapping(&self.file, &mut self.mmap, new_capacity, self.max_degree * 4)?;
        fill_sentinels(&mut self.mmap[old_bytes..]);
        self.capacity = new_capacity;
        Ok(())
    }

    #[inline]
    fn row_range(&self, slot: usize) -> std::ops::Range<usize> {
        let bytes = self.max_degree * 4;
        slot * bytes..(slot + 1) * bytes
    }

    /// Read the compact neighbor list of `slot`, dropping sentinels.
    pub fn row(&self, slot: usize) -> Row {
        debug_assert!(slot < self.capacity);
        let src = &self.mmap[self.row_range(slot)];
        let mut out = Row::new();
        for cell in src.chunks_exact(4) {
            let id = i32::from_le_bytes([cell[0], cell[1], cell[2], cell[3]]);
            if id != SENTINEL {
                out.push(id as u32);
            }
        }
        out
    }

    /// Replace the row of `slot` with `ids`, padding with sentinels.
    ///
    /// Callers pass ids sorted by ascending distance to the owning node
    /// (ties by ascending id), so stored rows are deterministic.
    pub fn set_row(&mut self, slot: usize, ids: &[u32]) {
        debug_assert!(slot < self.capacity);
        debug_assert!(ids.len() <= self.max_degree);
        let range = self.row_range(slot);
        let dst = &mut self.mmap[range];
        for (cell, &id) in dst.chunks_exact_mut(4).zip(ids) {
            cell.copy_from_slice(&(id as i32).to_le_bytes());
        }
        for cell in dst.chunks_exact_mut(4).skip(ids.len()) {
            cell.copy_from_slice(&SENTINEL.to_le_bytes());
        }
    }

    /// Reset the row of `slot` to all sentinels.
    pub fn clear_row(&mut self, slot: usize) {
        self.set_row(slot, &[]);
    }

    pub fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

fn fill_sentinels(bytes: &mut [u8]) {
    for cell in bytes.chunks_exact_mut(4) {
        cell.copy_from_slice(&SENTINEL.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.vec");
        let mut table = VectorTable::<f32>::create(&path, 4, 8).unwrap();

        table.write(3, &[1.0, -2.0, 0.5, 9.0]);
        assert_eq!(table.read(3), vec![1.0, -2.0, 0.5, 9.0]);
        assert_eq!(table.read(0), vec![0.0; 4]);
    }

    #[test]
    fn vector_zero_clears_slot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.vec");
        let mut table = VectorTable::<f64>::create(&path, 3, 4).unwrap();

        table.write(1, &[1.0, 2.0, 3.0]);
        table.zero(1);
        assert_eq!(table.read(1), vec![0.0; 3]);
    }

    #[test]
    fn vector_grow_preserves_and_zero_fills() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.vec");
        let mut table = VectorTable::<f32>::create(&path, 2, 2).unwrap();

        table.write(0, &[7.0, 8.0]);
        table.ensure_capacity(3).unwrap();
        assert!(table.capacity() >= 3);
        assert_eq!(table.read(0), vec![7.0, 8.0]);
        assert_eq!(table.read(table.capacity() - 1), vec![0.0; 2]);
    }

    #[test]
    fn growth_policy_doubles_with_floor() {
        assert_eq!(grown_capacity(1024, 1025), 2048);
        assert_eq!(grown_capacity(4, 5), 1028);
        assert_eq!(grown_capacity(2048, 8192), 8192);
    }

    #[test]
    fn vector_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.vec");
        {
            let mut table = VectorTable::<f32>::create(&path, 2, 4).unwrap();
            table.write(2, &[0.25, 0.75]);
            table.flush().unwrap();
        }
        let table = VectorTable::<f32>::open(&path, 2).unwrap();
        assert_eq!(table.capacity(), 4);
        assert_eq!(table.read(2), vec![0.25, 0.75]);
    }

    #[test]
    fn open_rejects_misaligned_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.vec");
        std::fs::write(&path, [0u8; 7]).unwrap();
        assert!(matches!(
            VectorTable::<f32>::open(&path, 2),
            Err(IndexError::Corrupted(_))
        ));
    }

    #[test]
    fn adjacency_rows_start_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.adj");
        let table = AdjacencyTable::create(&path, 8, 4).unwrap();
        for slot in 0..4 {
            assert!(table.row(slot).is_empty());
        }
    }

    #[test]
    fn adjacency_set_row_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.adj");
        let mut table = AdjacencyTable::create(&path, 4, 4).unwrap();

        table.set_row(1, &[5, 0, 7]);
        assert_eq!(table.row(1).as_slice(), &[5, 0, 7]);

        table.set_row(1, &[2]);
        assert_eq!(table.row(1).as_slice(), &[2]);

        table.clear_row(1);
        assert!(table.row(1).is_empty());
    }

    #[test]
    fn adjacency_grow_sentinel_fills_new_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.adj");
        let mut table = AdjacencyTable::create(&path, 4, 2).unwrap();

        table.set_row(0, &[1]);
        table.ensure_capacity(10).unwrap();
        assert_eq!(table.row(0).as_slice(), &[1]);
        for slot in 2..table.capacity() {
            assert!(table.row(slot).is_empty(), "row {slot} not empty");
        }
    }
}
