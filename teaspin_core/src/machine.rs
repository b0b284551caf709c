use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    engine::{SpinEngine, SpinHandle, SpinSession},
    error::{ReelError, ReelResult},
    item::{default_library, normalize_name, Category, Item, ItemId},
    library::{reconcile_on_load, ItemSets, SizeAdvisory},
    store::{ItemStore, SnapshotStore},
};

/// What `load` found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub library_len: usize,
    pub active_len: usize,
    pub seeded: bool,
    /// Default items the store refused; they live only in this session.
    pub placeholders: usize,
    pub advisory: SizeAdvisory,
}

/// Owns the slot machine's state: the two item collections, their stores
/// and the spin engine.
///
/// Mutations hold the collection lock across the store round-trip, so they
/// run one at a time and apply only after the store confirms.
pub struct SlotMachine<S, P> {
    store: S,
    snapshots: P,
    sets: Mutex<ItemSets>,
    engine: SpinEngine,
}

impl<S: ItemStore, P: SnapshotStore> SlotMachine<S, P> {
    pub fn new(store: S, snapshots: P, engine: SpinEngine) -> Self {
        Self {
            store,
            snapshots,
            sets: Mutex::new(ItemSets::default()),
            engine,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &SpinEngine {
        &self.engine
    }

    /// Fetches the library (seeding the defaults into an empty store) and
    /// restores the active set from the last snapshot.
    pub async fn load(&self) -> ReelResult<LoadReport> {
        let mut sets = self.sets.lock().await;
        let mut core = self.store.list().await?;
        let seeded = core.is_empty();
        let mut placeholders = 0;
        if seeded {
            (core, placeholders) = self.seed_defaults().await;
        }
        let saved = self.snapshots.load();
        let active = reconcile_on_load(saved.as_deref(), &core);
        *sets = ItemSets::new(core, active);
        self.persist_active(&sets);

        let report = LoadReport {
            library_len: sets.core().len(),
            active_len: sets.active().len(),
            seeded,
            placeholders,
            advisory: sets.advisory(),
        };
        info!(
            library = report.library_len,
            active = report.active_len,
            seeded,
            placeholders,
            "slot machine loaded"
        );
        Ok(report)
    }

    /// Inserts the default menu. Items the store confirms keep their ids; if
    /// an insert fails, that item and the rest of the menu get stable
    /// placeholder ids and stay local. Returns the library and how many
    /// placeholders it holds.
    async fn seed_defaults(&self) -> (Vec<Item>, usize) {
        let mut core = Vec::new();
        let defaults = default_library();
        for (index, (name, category)) in defaults.iter().copied().enumerate() {
            match self.store.insert(name, Some(category)).await {
                Ok(item) => core.push(item),
                Err(err) => {
                    warn!(
                        error = %err,
                        stored = index,
                        "could not seed the item store, keeping the rest local"
                    );
                    let placeholders = defaults.len() - index;
                    core.extend(defaults[index..].iter().enumerate().map(
                        |(offset, &(name, category))| {
                            Item::new(ItemId::placeholder(index + offset), name, Some(category))
                        },
                    ));
                    return (core, placeholders);
                }
            }
        }
        (core, 0)
    }

    fn persist_active(&self, sets: &ItemSets) {
        let saved = sets
            .snapshot()
            .map_err(ReelError::persistence)
            .and_then(|bytes| self.snapshots.save(&bytes));
        if let Err(err) = saved {
            warn!(error = %err, "active-set snapshot not saved");
        }
    }

    pub async fn core_library(&self) -> Vec<Item> {
        self.sets.lock().await.core().to_vec()
    }

    pub async fn active_set(&self) -> Vec<Item> {
        self.sets.lock().await.active().to_vec()
    }

    pub async fn shelf(&self, category: Category) -> Vec<Item> {
        self.sets.lock().await.shelf(category)
    }

    pub async fn advisory(&self) -> SizeAdvisory {
        self.sets.lock().await.advisory()
    }

    pub async fn add_to_core_library(
        &self,
        name: &str,
        category: Option<Category>,
    ) -> ReelResult<Item> {
        let name = normalize_name(name).ok_or(ReelError::InvalidName)?;
        let mut sets = self.sets.lock().await;
        let item = self.store.insert(&name, category).await?;
        sets.push_core(item.clone());
        info!(id = %item.id, name = %item.name, "added to core library");
        Ok(item)
    }

    /// Deletes from the store, then from the library and every reel entry.
    /// Placeholder items never reached the store and skip it.
    /// Returns how many reel entries went with it.
    pub async fn remove_from_core_library(&self, id: &ItemId) -> ReelResult<usize> {
        let mut sets = self.sets.lock().await;
        if !sets.contains(id) {
            return Err(ReelError::InvalidReference(id.clone()));
        }
        if !id.is_placeholder() {
            self.store.delete(id).await?;
        }
        let purged = sets.remove_core(id)?;
        if purged > 0 {
            self.persist_active(&sets);
        }
        info!(%id, purged, "removed from core library");
        Ok(purged)
    }

    pub async fn add_to_active_set(&self, item: &Item) -> ReelResult<Item> {
        let mut sets = self.sets.lock().await;
        let added = sets.add_active(&item.id)?;
        self.persist_active(&sets);
        Ok(added)
    }

    pub async fn remove_from_active_set(&self, index: usize) -> ReelResult<Item> {
        let mut sets = self.sets.lock().await;
        let removed = sets.remove_active(index)?;
        self.persist_active(&sets);
        Ok(removed)
    }

    /// Spins over the current active set. `None` while a spin is in flight
    /// or when the reel is empty.
    pub async fn spin(&self) -> Option<SpinHandle> {
        let reel = self.active_set().await;
        self.engine.spin(&reel)
    }

    pub fn session(&self) -> SpinSession {
        self.engine.session()
    }
}
