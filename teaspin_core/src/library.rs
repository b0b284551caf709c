//! Core library and active set, kept referentially consistent.
//!
//! The core library holds every known item exactly once. The active set is
//! what is loaded onto the reel; it may repeat an item to weight the draw,
//! but every entry must name an item that is still in the core library.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::{debug, warn};

use crate::{
    error::{ReelError, ReelResult},
    item::{Category, Item, ItemId},
};

/// Reel sizes that read well on screen. Advisory only.
pub const IDEAL_REEL_SIZE: RangeInclusive<usize> = 8..=12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeAdvisory {
    BelowIdeal,
    Ideal,
    AboveIdeal,
}

impl SizeAdvisory {
    pub fn for_len(len: usize) -> Self {
        if len < *IDEAL_REEL_SIZE.start() {
            SizeAdvisory::BelowIdeal
        } else if len > *IDEAL_REEL_SIZE.end() {
            SizeAdvisory::AboveIdeal
        } else {
            SizeAdvisory::Ideal
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemSets {
    core: Vec<Item>,
    active: Vec<Item>,
}

impl ItemSets {
    pub fn new(core: Vec<Item>, active: Vec<Item>) -> Self {
        Self { core, active }
    }

    pub fn core(&self) -> &[Item] {
        &self.core
    }

    pub fn active(&self) -> &[Item] {
        &self.active
    }

    pub fn find(&self, id: &ItemId) -> Option<&Item> {
        self.core.iter().find(|item| &item.id == id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.find(id).is_some()
    }

    /// Core items the manager files under `category`.
    pub fn shelf(&self, category: Category) -> Vec<Item> {
        self.core
            .iter()
            .filter(|item| item.shelf() == category)
            .cloned()
            .collect()
    }

    pub fn occurrences(&self, id: &ItemId) -> usize {
        self.active.iter().filter(|item| &item.id == id).count()
    }

    pub fn advisory(&self) -> SizeAdvisory {
        SizeAdvisory::for_len(self.active.len())
    }

    /// Appends an item confirmed by the store. A repeated id replaces nothing
    /// and is ignored, keeping the library duplicate-free.
    pub fn push_core(&mut self, item: Item) -> bool {
        if self.contains(&item.id) {
            warn!(id = %item.id, "store returned an id already in the library");
            return false;
        }
        self.core.push(item);
        true
    }

    /// Drops `id` from the library and every occurrence from the active set.
    /// Returns how many active entries were purged.
    pub fn remove_core(&mut self, id: &ItemId) -> ReelResult<usize> {
        let pos = self
            .core
            .iter()
            .position(|item| &item.id == id)
            .ok_or_else(|| ReelError::InvalidReference(id.clone()))?;
        self.core.remove(pos);
        let before = self.active.len();
        self.active.retain(|item| &item.id != id);
        let purged = before - self.active.len();
        debug!(%id, purged, "removed from core library");
        Ok(purged)
    }

    /// Adds another reel entry for a library item. Duplicates are allowed.
    pub fn add_active(&mut self, id: &ItemId) -> ReelResult<Item> {
        let item = self
            .find(id)
            .cloned()
            .ok_or_else(|| ReelError::InvalidReference(id.clone()))?;
        self.active.push(item.clone());
        Ok(item)
    }

    /// Removes the reel entry at `index`, leaving other copies in place.
    pub fn remove_active(&mut self, index: usize) -> ReelResult<Item> {
        if index >= self.active.len() {
            return Err(ReelError::IndexOutOfRange {
                index,
                len: self.active.len(),
            });
        }
        Ok(self.active.remove(index))
    }

    pub fn snapshot(&self) -> serde_json::Result<Vec<u8>> {
        encode_snapshot(&self.active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEntry {
    id: ItemId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    category: Option<Category>,
}

/// Either the current `{id, name, category}` record or a bare name written
/// by the first, id-less, version of the reel.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Record(SnapshotEntry),
    Name(String),
}

pub fn encode_snapshot(active: &[Item]) -> serde_json::Result<Vec<u8>> {
    let entries: Vec<SnapshotEntry> = active
        .iter()
        .map(|item| SnapshotEntry {
            id: item.id.clone(),
            name: item.name.clone(),
            category: item.category,
        })
        .collect();
    serde_json::to_vec(&entries)
}

/// Rebuilds the active set at start-up.
///
/// Entries whose id is gone from `core` are dropped silently, order of the
/// rest preserved. A missing, unreadable or empty snapshot yields a full copy
/// of `core`.
pub fn reconcile_on_load(saved: Option<&[u8]>, core: &[Item]) -> Vec<Item> {
    let entries = match saved.map(serde_json::from_slice::<Vec<StoredEntry>>) {
        Some(Ok(entries)) if !entries.is_empty() => entries,
        Some(Err(err)) => {
            warn!(error = %err, "discarding unreadable active-set snapshot");
            return core.to_vec();
        }
        _ => return core.to_vec(),
    };

    let total = entries.len();
    let active: Vec<Item> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            StoredEntry::Record(record) => core.iter().find(|item| item.id == record.id),
            StoredEntry::Name(name) => core.iter().find(|item| item.name == name),
        })
        .cloned()
        .collect();
    if active.len() < total {
        debug!(dropped = total - active.len(), "dropped stale active-set entries");
    }
    active
}
