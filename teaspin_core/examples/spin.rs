use std::sync::Arc;

use teaspin_core::{
    MemoryItemStore, MemorySnapshotStore, NullDisplay, ProvablyFairRng, SlotMachine, SpinEngine,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), teaspin_core::ReelError> {
    // Example end-to-end spin over the default menu with a verifiable seed
    let rng = ProvablyFairRng::new("example-server-seed", "example-client-seed", 1);
    let seed_hash = rng.server_seed_hash_hex();
    let engine = SpinEngine::new(rng, Arc::new(NullDisplay));
    let machine = SlotMachine::new(MemoryItemStore::new(), MemorySnapshotStore::new(), engine);
    machine.load().await?;

    if let Some(handle) = machine.spin().await {
        let target = handle.plan.target_slot;
        if let Some(item) = handle.landed().await {
            println!("server_seed_hash={seed_hash} target_slot={target} landed={}", item.name);
        }
    }
    Ok(())
}
