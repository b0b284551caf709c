use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use teaspin_core::{
    plan_spin, Category, FixedSource, Item, ItemId, ItemStore, MemoryItemStore,
    MemorySnapshotStore, ProvablyFairRng, RandSource, ReelDisplay, ReelError, ReelMotion,
    ReelResult, SlotMachine, SlotSource, SpinEngine, SpinTiming,
};

fn reel(n: usize) -> Vec<Item> {
    (0..n)
        .map(|i| Item::new(ItemId::from(i as i64 + 1), format!("drink-{i}"), None))
        .collect()
}

/// Pearson chi-square against a uniform distribution.
fn chi_square(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    let expected = total as f64 / counts.len() as f64;
    counts
        .iter()
        .map(|&c| (c as f64 - expected).powi(2) / expected)
        .sum()
}

fn landing_counts(source: &mut dyn SlotSource, n: usize, trials: usize) -> Vec<usize> {
    let active = reel(n);
    let timing = SpinTiming::default();
    let mut counts = vec![0usize; n];
    for _ in 0..trials {
        let plan = plan_spin(&active, source, &timing).expect("non-empty reel");
        assert!(plan.landed_index < n);
        assert_eq!(plan.landed, active[plan.landed_index]);
        counts[plan.landed_index] += 1;
    }
    counts
}

// chi-square critical value, 7 degrees of freedom, p = 0.001
const CHI2_DF7_P001: f64 = 24.322;

#[test]
fn seeded_landings_are_uniform() {
    let mut rng = ProvablyFairRng::new("house-seed", "guest-seed", 0);
    let counts = landing_counts(&mut rng, 8, 16_000);
    assert!(chi_square(&counts) < CHI2_DF7_P001, "counts {counts:?}");
}

#[test]
fn rand_landings_are_uniform() {
    let mut rng = RandSource::seeded(20_240_611);
    let counts = landing_counts(&mut rng, 8, 16_000);
    assert!(chi_square(&counts) < CHI2_DF7_P001, "counts {counts:?}");
}

#[test]
fn travel_covers_two_to_three_turns() {
    let timing = SpinTiming::default();
    let mut rng = RandSource::seeded(3);
    for n in 1..=15 {
        let active = reel(n);
        for _ in 0..50 {
            let plan = plan_spin(&active, &mut rng, &timing).expect("non-empty reel");
            let turn = n as u64 * timing.item_height as u64;
            assert!(plan.motion.travel() >= 2 * turn);
            assert!(plan.motion.travel() < 3 * turn);
            assert_eq!(plan.motion.duration, Duration::from_millis(3000));
        }
    }
}

#[test]
fn seeded_spins_replay() {
    let active = reel(8);
    let timing = SpinTiming::default();
    let first: Vec<usize> = {
        let mut rng = ProvablyFairRng::new("s", "c", 5);
        (0..20)
            .map(|_| plan_spin(&active, &mut rng, &timing).expect("plan").target_slot)
            .collect()
    };
    let mut rng = ProvablyFairRng::new("s", "c", 5);
    let second: Vec<usize> = (0..20)
        .map(|_| plan_spin(&active, &mut rng, &timing).expect("plan").target_slot)
        .collect();
    assert_eq!(first, second);
}

#[derive(Default)]
struct RecordingDisplay {
    begun: Mutex<Vec<ReelMotion>>,
    settled: Mutex<Vec<Item>>,
}

impl ReelDisplay for RecordingDisplay {
    fn begin(&self, motion: &ReelMotion, _reel: &[Item]) {
        self.begun.lock().unwrap().push(*motion);
    }

    fn settle(&self, landed: &Item) {
        self.settled.lock().unwrap().push(landed.clone());
    }
}

#[tokio::test(start_paused = true)]
async fn default_menu_end_to_end() {
    let display = Arc::new(RecordingDisplay::default());
    let engine = SpinEngine::new(FixedSource::new(vec![3]), display.clone());
    let machine = SlotMachine::new(MemoryItemStore::new(), MemorySnapshotStore::new(), engine);

    let report = machine.load().await.expect("load");
    assert!(report.seeded);
    let active = machine.active_set().await;
    assert_eq!(active.len(), 8);
    let names: Vec<&str> = active.iter().map(|i| i.name.as_str()).collect();
    let defaults: Vec<&str> = teaspin_core::default_library().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, defaults);

    let handle = machine.spin().await.expect("admitted");
    assert_eq!(handle.plan.target_slot, 19);
    assert!(machine.session().spinning);
    assert_eq!(display.begun.lock().unwrap()[0].target_slot, 19);
    assert_eq!(display.begun.lock().unwrap()[0].duration_ms(), 3000);
    assert!(display.settled.lock().unwrap().is_empty());

    let landed = handle.landed().await.expect("timer finished");
    assert_eq!(landed, active[3]);
    assert_eq!(landed.name, "近美紅茶");
    let session = machine.session();
    assert!(!session.spinning);
    assert_eq!(session.last_result, Some(active[3].clone()));
    assert_eq!(display.settled.lock().unwrap().as_slice(), &[active[3].clone()]);
}

#[tokio::test(start_paused = true)]
async fn spin_resolves_only_after_duration() {
    let engine = SpinEngine::new(FixedSource::new(vec![0]), Arc::new(teaspin_core::NullDisplay));
    let active = reel(3);
    let _handle = engine.spin(&active).expect("admitted");

    tokio::time::sleep(Duration::from_millis(2999)).await;
    assert!(engine.is_spinning());
    assert!(engine.spin(&active).is_none());

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert!(!engine.is_spinning());
    assert!(engine.spin(&active).is_some());
}

#[tokio::test(start_paused = true)]
async fn in_flight_spin_ignores_later_edits() {
    let engine = SpinEngine::new(FixedSource::new(vec![2]), Arc::new(teaspin_core::NullDisplay));
    let machine = SlotMachine::new(MemoryItemStore::new(), MemorySnapshotStore::new(), engine);
    machine.load().await.expect("load");
    let before = machine.active_set().await;

    let handle = machine.spin().await.expect("admitted");
    machine.remove_from_core_library(&before[2].id).await.expect("remove");
    while !machine.active_set().await.is_empty() {
        machine.remove_from_active_set(0).await.expect("remove");
    }

    assert_eq!(handle.landed().await, Some(before[2].clone()));
    assert_eq!(machine.session().last_result, Some(before[2].clone()));
}

#[tokio::test(start_paused = true)]
async fn empty_reel_never_spins() {
    let machine = SlotMachine::new(
        MemoryItemStore::new(),
        MemorySnapshotStore::with_bytes(b"[{\"id\":\"999\"}]".to_vec()),
        SpinEngine::headless(),
    );
    machine.load().await.expect("load");
    assert!(machine.active_set().await.is_empty());
    assert!(machine.spin().await.is_none());
    assert!(!machine.session().spinning);
}

#[tokio::test]
async fn removing_from_library_purges_reel() {
    let machine = SlotMachine::new(
        MemoryItemStore::new(),
        MemorySnapshotStore::new(),
        SpinEngine::headless(),
    );
    machine.load().await.expect("load");
    let target = machine.core_library().await[1].clone();
    machine.add_to_active_set(&target).await.expect("add");
    machine.add_to_active_set(&target).await.expect("add");
    let before = machine.active_set().await.len();

    let purged = machine.remove_from_core_library(&target.id).await.expect("remove");
    assert_eq!(purged, 3);
    assert_eq!(machine.active_set().await.len(), before - 3);
    assert!(machine.active_set().await.iter().all(|i| i.id != target.id));
    assert!(machine.core_library().await.iter().all(|i| i.id != target.id));
    assert!(machine.store().list().await.expect("list").iter().all(|i| i.id != target.id));
}

#[tokio::test]
async fn duplicate_entries_are_removable_independently() {
    let machine = SlotMachine::new(
        MemoryItemStore::with_items(vec![Item::new(ItemId::from(1), "A", None)]),
        MemorySnapshotStore::with_bytes(b"[]".to_vec()),
        SpinEngine::headless(),
    );
    machine.load().await.expect("load");
    let extra = machine
        .add_to_core_library("B", Some(Category::GreenTea))
        .await
        .expect("add");
    machine.add_to_active_set(&extra).await.expect("add");
    machine.add_to_active_set(&extra).await.expect("add");
    let ids: Vec<String> = machine.active_set().await.iter().map(|i| i.id.to_string()).collect();
    assert_eq!(ids, ["1", "2", "2"]);

    machine.remove_from_active_set(1).await.expect("remove");
    let ids: Vec<String> = machine.active_set().await.iter().map(|i| i.id.to_string()).collect();
    assert_eq!(ids, ["1", "2"]);
    assert_eq!(
        machine.remove_from_active_set(2).await,
        Err(ReelError::IndexOutOfRange { index: 2, len: 2 })
    );
}

#[tokio::test]
async fn unknown_items_cannot_join_the_reel() {
    let machine = SlotMachine::new(
        MemoryItemStore::new(),
        MemorySnapshotStore::new(),
        SpinEngine::headless(),
    );
    machine.load().await.expect("load");
    let stranger = Item::new(ItemId::new("nope"), "stranger", None);
    assert_eq!(
        machine.add_to_active_set(&stranger).await,
        Err(ReelError::InvalidReference(stranger.id.clone()))
    );
    assert_eq!(
        machine.remove_from_core_library(&stranger.id).await,
        Err(ReelError::InvalidReference(stranger.id.clone()))
    );
    assert_eq!(machine.active_set().await.len(), 8);
}

/// Store that can be told to reject or hang on writes, and that stalls
/// every call.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryItemStore,
    reject_writes: AtomicBool,
    // when non-zero, the n-th insert (1-based) and every later one fail
    reject_from_insert: AtomicUsize,
    inserts: AtomicUsize,
    hang_writes: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FlakyStore {
    async fn enter<T>(&self, op: impl std::future::Future<Output = ReelResult<T>>) -> ReelResult<T> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let out = op.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }

    async fn check_write(&self) -> ReelResult<()> {
        if self.hang_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(ReelError::Persistence("table is read-only".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ItemStore for FlakyStore {
    async fn list(&self) -> ReelResult<Vec<Item>> {
        self.enter(self.inner.list()).await
    }

    async fn insert(&self, name: &str, category: Option<Category>) -> ReelResult<Item> {
        self.check_write().await?;
        let nth = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        let limit = self.reject_from_insert.load(Ordering::SeqCst);
        if limit != 0 && nth >= limit {
            return Err(ReelError::Persistence(format!("insert {nth} refused")));
        }
        self.enter(self.inner.insert(name, category)).await
    }

    async fn delete(&self, id: &ItemId) -> ReelResult<()> {
        self.check_write().await?;
        self.enter(self.inner.delete(id)).await
    }
}

#[tokio::test(start_paused = true)]
async fn failed_writes_change_nothing() {
    let machine = SlotMachine::new(
        FlakyStore::default(),
        MemorySnapshotStore::new(),
        SpinEngine::headless(),
    );
    machine.load().await.expect("load");
    let core = machine.core_library().await;
    let active = machine.active_set().await;

    machine.store().reject_writes.store(true, Ordering::SeqCst);
    let err = machine.add_to_core_library("new", None).await.unwrap_err();
    assert!(matches!(err, ReelError::Persistence(_)));
    let err = machine.remove_from_core_library(&core[0].id).await.unwrap_err();
    assert!(matches!(err, ReelError::Persistence(_)));

    assert_eq!(machine.core_library().await, core);
    assert_eq!(machine.active_set().await, active);
}

#[tokio::test(start_paused = true)]
async fn seeding_failure_falls_back_to_placeholders() {
    let store = FlakyStore::default();
    store.reject_writes.store(true, Ordering::SeqCst);
    let machine = SlotMachine::new(store, MemorySnapshotStore::new(), SpinEngine::headless());
    let report = machine.load().await.expect("load");
    assert_eq!(report.library_len, 8);
    assert_eq!(report.placeholders, 8);
    let ids: Vec<ItemId> = machine.core_library().await.into_iter().map(|i| i.id).collect();
    let expected: Vec<ItemId> = (0..8).map(ItemId::placeholder).collect();
    assert_eq!(ids, expected);
}

#[tokio::test(start_paused = true)]
async fn partial_seeding_keeps_confirmed_rows() {
    let store = FlakyStore::default();
    store.reject_from_insert.store(4, Ordering::SeqCst);
    let machine = SlotMachine::new(store, MemorySnapshotStore::new(), SpinEngine::headless());
    let report = machine.load().await.expect("load");
    assert_eq!(report.library_len, 8);
    assert_eq!(report.placeholders, 5);

    let library = machine.core_library().await;
    let ids: Vec<&str> = library.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(
        ids,
        [
            "1",
            "2",
            "3",
            "local-default-3",
            "local-default-4",
            "local-default-5",
            "local-default-6",
            "local-default-7"
        ]
    );
    let names: Vec<&str> = library.iter().map(|i| i.name.as_str()).collect();
    let defaults: Vec<&str> = teaspin_core::default_library().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, defaults);
    assert_eq!(machine.store().inner.list().await.expect("list").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn placeholder_library_survives_sessions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let snapshot_path = dir.path().join("active.json");
    let session = || {
        let store = FlakyStore::default();
        store.reject_writes.store(true, Ordering::SeqCst);
        SlotMachine::new(
            store,
            teaspin_core::FileSnapshotStore::new(&snapshot_path),
            SpinEngine::headless(),
        )
    };

    let first = session();
    assert_eq!(first.load().await.expect("load").active_len, 8);
    let doomed = ItemId::placeholder(0);
    assert_eq!(first.remove_from_core_library(&doomed).await, Ok(1));
    assert_eq!(first.core_library().await.len(), 7);
    assert_eq!(first.active_set().await.len(), 7);

    let second = session();
    let report = second.load().await.expect("load");
    assert_eq!(report.library_len, 8);
    assert_eq!(report.active_len, 7);
    assert!(second.active_set().await.iter().all(|i| i.id != doomed));
    assert!(second.spin().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn unanswered_store_holds_every_mutation() {
    let machine = SlotMachine::new(
        FlakyStore::default(),
        MemorySnapshotStore::new(),
        SpinEngine::headless(),
    );
    machine.load().await.expect("load");
    let core = machine.core_library().await;
    let active = machine.active_set().await;

    machine.store().hang_writes.store(true, Ordering::SeqCst);
    let stuck = tokio::time::timeout(Duration::from_secs(3600), async {
        tokio::join!(
            machine.add_to_core_library("never", None),
            machine.remove_from_active_set(0),
        )
    })
    .await;
    assert!(stuck.is_err(), "both calls should still be waiting");

    assert_eq!(machine.core_library().await, core);
    assert_eq!(machine.active_set().await, active);
}

#[tokio::test(start_paused = true)]
async fn overlapping_mutations_are_serialized() {
    let machine = SlotMachine::new(
        FlakyStore::default(),
        MemorySnapshotStore::new(),
        SpinEngine::headless(),
    );
    machine.load().await.expect("load");
    let target = machine.core_library().await[0].id.clone();
    machine.store().max_in_flight.store(0, Ordering::SeqCst);

    let (first, second, added) = tokio::join!(
        machine.remove_from_core_library(&target),
        machine.remove_from_core_library(&target),
        machine.add_to_core_library("extra", None),
    );
    assert_eq!(first, Ok(1));
    assert_eq!(second, Err(ReelError::InvalidReference(target.clone())));
    assert!(added.is_ok());
    assert_eq!(machine.store().max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(machine.core_library().await.len(), 8);
}
