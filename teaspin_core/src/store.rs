//! Persistence collaborators.
//!
//! [`ItemStore`] is the table that owns the core library; [`SnapshotStore`]
//! keeps the active set between sessions. Stores here are local; the table
//! service and its HTTP client live in the server and cli crates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::debug;

use crate::{
    error::{ReelError, ReelResult},
    item::{Category, Item, ItemId},
};

/// Item table. Implementations report every failure as
/// [`ReelError::Persistence`].
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// All items, oldest first.
    async fn list(&self) -> ReelResult<Vec<Item>>;

    /// Stores a new item and returns it with its assigned id.
    async fn insert(&self, name: &str, category: Option<Category>) -> ReelResult<Item>;

    async fn delete(&self, id: &ItemId) -> ReelResult<()>;
}

/// Raw byte storage for the active set.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Option<Vec<u8>>;
    fn save(&self, bytes: &[u8]) -> ReelResult<()>;
}

#[derive(Debug, Default)]
struct MemoryTable {
    items: Vec<Item>,
    next_id: i64,
}

/// In-process table with sequential integer ids starting at 1.
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    table: Mutex<MemoryTable>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated table; later inserts continue after the highest numeric id.
    pub fn with_items(items: Vec<Item>) -> Self {
        let next_id = items
            .iter()
            .filter_map(|item| item.id.as_str().parse::<i64>().ok())
            .max()
            .unwrap_or(0);
        Self {
            table: Mutex::new(MemoryTable { items, next_id }),
        }
    }

    fn table(&self) -> ReelResult<std::sync::MutexGuard<'_, MemoryTable>> {
        self.table
            .lock()
            .map_err(|_| ReelError::Persistence("memory table poisoned".into()))
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn list(&self) -> ReelResult<Vec<Item>> {
        Ok(self.table()?.items.clone())
    }

    async fn insert(&self, name: &str, category: Option<Category>) -> ReelResult<Item> {
        let mut table = self.table()?;
        table.next_id += 1;
        let item = Item::new(ItemId::from(table.next_id), name, category);
        table.items.push(item.clone());
        Ok(item)
    }

    async fn delete(&self, id: &ItemId) -> ReelResult<()> {
        let mut table = self.table()?;
        let before = table.items.len();
        table.items.retain(|item| &item.id != id);
        if table.items.len() == before {
            return Err(ReelError::Persistence(format!("no item with id {id}")));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ItemFile {
    items: Vec<Item>,
}

/// Offline item table kept in a JSON file. Ids are local placeholders.
#[derive(Debug)]
pub struct JsonFileItemStore {
    path: PathBuf,
    // serializes read-modify-write cycles on the file
    lock: tokio::sync::Mutex<()>,
}

impl JsonFileItemStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> ReelResult<ItemFile> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(ReelError::persistence),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ItemFile::default()),
            Err(err) => Err(ReelError::persistence(err)),
        }
    }

    async fn write(&self, file: &ItemFile) -> ReelResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ReelError::persistence)?;
        }
        let bytes = serde_json::to_vec_pretty(file).map_err(ReelError::persistence)?;
        // write-then-rename so a crash never leaves half a file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(ReelError::persistence)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(ReelError::persistence)?;
        debug!(path = %self.path.display(), items = file.items.len(), "item file written");
        Ok(())
    }
}

#[async_trait]
impl ItemStore for JsonFileItemStore {
    async fn list(&self) -> ReelResult<Vec<Item>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.items)
    }

    async fn insert(&self, name: &str, category: Option<Category>) -> ReelResult<Item> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        let item = Item::new(ItemId::local(), name, category);
        file.items.push(item.clone());
        self.write(&file).await?;
        Ok(item)
    }

    async fn delete(&self, id: &ItemId) -> ReelResult<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        let before = file.items.len();
        file.items.retain(|item| &item.id != id);
        if file.items.len() == before {
            return Err(ReelError::Persistence(format!("no item with id {id}")));
        }
        self.write(&file).await
    }
}

#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Mutex::new(Some(bytes.into())),
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Option<Vec<u8>> {
        self.bytes.lock().ok()?.clone()
    }

    fn save(&self, bytes: &[u8]) -> ReelResult<()> {
        let mut slot = self
            .bytes
            .lock()
            .map_err(|_| ReelError::Persistence("snapshot slot poisoned".into()))?;
        *slot = Some(bytes.to_vec());
        Ok(())
    }
}

/// Active-set snapshot kept in a single file.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Option<Vec<u8>> {
        std::fs::read(&self.path).ok()
    }

    fn save(&self, bytes: &[u8]) -> ReelResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(ReelError::persistence)?;
        }
        // same write-then-rename as the item file; a torn snapshot would
        // reset the reel to the whole library
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(ReelError::persistence)?;
        std::fs::rename(&tmp, &self.path).map_err(ReelError::persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_assigns_sequential_ids() {
        let store = MemoryItemStore::new();
        let a = store.insert("A", None).await.expect("insert");
        let b = store.insert("B", Some(Category::ColdDew)).await.expect("insert");
        assert_eq!(a.id, ItemId::from(1));
        assert_eq!(b.id, ItemId::from(2));
        assert_eq!(store.list().await.expect("list"), vec![a, b]);
    }

    #[tokio::test]
    async fn memory_store_delete_unknown_fails() {
        let store = MemoryItemStore::with_items(vec![Item::new(ItemId::from(5), "A", None)]);
        assert!(store.delete(&ItemId::from(6)).await.is_err());
        store.delete(&ItemId::from(5)).await.expect("delete");
        assert!(store.list().await.expect("list").is_empty());
        assert_eq!(store.insert("B", None).await.expect("insert").id, ItemId::from(6));
    }

    #[tokio::test]
    async fn json_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("items.json");
        let store = JsonFileItemStore::new(&path);
        assert!(store.list().await.expect("empty list").is_empty());

        let kept = store.insert("瑞順紅茶", Some(Category::BlackTea)).await.expect("insert");
        let gone = store.insert("gone", None).await.expect("insert");
        assert!(kept.id.is_local());
        store.delete(&gone.id).await.expect("delete");

        let reopened = JsonFileItemStore::new(&path);
        assert_eq!(reopened.list().await.expect("list"), vec![kept]);
    }

    #[tokio::test]
    async fn json_file_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("items.json");
        std::fs::write(&path, b"garbage").expect("write");
        let err = JsonFileItemStore::new(&path).list().await.unwrap_err();
        assert!(matches!(err, ReelError::Persistence(_)));
    }

    #[test]
    fn file_snapshot_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSnapshotStore::new(dir.path().join("active.json"));
        assert!(store.load().is_none());
        store.save(b"[]").expect("save");
        assert_eq!(store.load().as_deref(), Some(&b"[]"[..]));
    }

    #[test]
    fn file_snapshot_replaces_whole_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("active.json");
        let store = FileSnapshotStore::new(&path);
        store.save(br#"[{"id":"1"},{"id":"2"}]"#).expect("save");
        store.save(br#"[{"id":"2"}]"#).expect("save");
        assert_eq!(store.load().as_deref(), Some(&br#"[{"id":"2"}]"#[..]));
        assert!(!path.with_extension("json.tmp").exists());
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(names, ["active.json"]);
    }
}
