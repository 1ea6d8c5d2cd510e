//! User-key dictionaries.
//!
//! The index keeps an optional bidirectional mapping between opaque
//! string keys and external IDs: a forward store (key -> id) and a
//! reverse store (id -> key). The stores are collaborators behind the
//! [`KeyStore`] trait; the index updates both directions on every
//! insert and delete, which is what keeps them in lockstep.
//!
//! The default backend is one single-table redb database per direction.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::{IndexError, Result};

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("kv");

/// A persistent byte-keyed dictionary.
///
/// Implementations must persist puts before returning and release file
/// locks promptly on drop.
pub trait KeyStore: Send {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    /// Remove `key`; returns whether it was present.
    fn delete(&self, key: &[u8]) -> Result<bool>;
    /// Visit every entry in key order.
    fn for_each(&self, f: &mut dyn FnMut(&[u8], &[u8])) -> Result<()>;
}

/// [`KeyStore`] backed by a single-table redb database.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;
        // Materialize the table so first reads don't race its creation.
        let tx = db.begin_write()?;
        tx.open_table(TABLE)?;
        tx.commit()?;
        Ok(Self { db })
    }
}

impl KeyStore for RedbStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(TABLE)?;
            table.insert(key, value)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(TABLE)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let tx = self.db.begin_write()?;
        let existed = {
            let mut table = tx.open_table(TABLE)?;
            let removed = table.remove(key)?.is_some();
            removed
        };
        tx.commit()?;
        Ok(existed)
    }

    fn for_each(&self, f: &mut dyn FnMut(&[u8], &[u8])) -> Result<()> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(TABLE)?;
        for entry in table.iter()? {
            let (k, v) = entry?;
            f(k.value(), v.value());
        }
        Ok(())
    }
}

/// The coupled forward/reverse dictionary pair.
pub struct KeyMap {
    forward: Box<dyn KeyStore>,
    reverse: Box<dyn KeyStore>,
}

impl KeyMap {
    /// Open the default redb pair at the given paths.
    pub fn open(forward_path: &Path, reverse_path: &Path) -> Result<Self> {
        Ok(Self {
            forward: Box::new(RedbStore::open(forward_path)?),
            reverse: Box::new(RedbStore::open(reverse_path)?),
        })
    }

    /// Couple two injected stores.
    pub fn new(forward: Box<dyn KeyStore>, reverse: Box<dyn KeyStore>) -> Self {
        Self { forward, reverse }
    }

    /// Record `key <-> ext_id` in both directions.
    ///
    /// A re-used key overwrites its forward entry, so the key resolves
    /// to the newest id; older ids stay reachable by id alone.
    pub fn register(&self, key: &str, ext_id: u64) -> Result<()> {
        self.forward.put(key.as_bytes(), &ext_id.to_le_bytes())?;
        self.reverse.put(&ext_id.to_le_bytes(), key.as_bytes())
    }

    /// Resolve a user key to its external id.
    pub fn id_for(&self, key: &str) -> Result<Option<u64>> {
        let Some(bytes) = self.forward.get(key.as_bytes())? else {
            return Ok(None);
        };
        let arr: [u8; 8] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| IndexError::Store(format!("malformed id entry for key {key:?}")))?;
        Ok(Some(u64::from_le_bytes(arr)))
    }

    /// Resolve an external id to its user key.
    pub fn key_for(&self, ext_id: u64) -> Result<Option<String>> {
        let Some(bytes) = self.reverse.get(&ext_id.to_le_bytes())? else {
            return Ok(None);
        };
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| IndexError::Store(format!("non-utf8 key for id {ext_id}")))
    }

    /// Drop both directions of the mapping for `ext_id`.
    ///
    /// The forward entry is removed only while it still resolves to
    /// `ext_id`, so deleting an old id never unmaps a re-used key.
    pub fn unregister(&self, ext_id: u64) -> Result<()> {
        if let Some(key) = self.key_for(ext_id)? {
            if self.id_for(&key)? == Some(ext_id) {
                self.forward.delete(key.as_bytes())?;
            }
        }
        self.reverse.delete(&ext_id.to_le_bytes())?;
        Ok(())
    }
}
