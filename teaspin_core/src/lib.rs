pub mod engine;
pub mod error;
pub mod item;
pub mod library;
pub mod machine;
pub mod manager;
pub mod motion;
pub mod rng;
pub mod store;

pub use crate::engine::{plan_spin, NullDisplay, ReelDisplay, SpinEngine, SpinHandle, SpinPlan, SpinSession};
pub use crate::error::{ReelError, ReelResult};
pub use crate::item::{default_library, Category, Item, ItemId};
pub use crate::library::{encode_snapshot, reconcile_on_load, ItemSets, SizeAdvisory, IDEAL_REEL_SIZE};
pub use crate::machine::{LoadReport, SlotMachine};
pub use crate::manager::{ManagerAction, ManagerView};
pub use crate::motion::{CubicBezier, ReelMotion, SpinTiming};
pub use crate::rng::{derive_floats, derive_hash_hex, FixedSource, ProvablyFairRng, RandSource, SlotSource};
pub use crate::store::{FileSnapshotStore, ItemStore, JsonFileItemStore, MemoryItemStore, MemorySnapshotStore, SnapshotStore};
