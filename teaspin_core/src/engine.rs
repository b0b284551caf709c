use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    item::Item,
    motion::{ReelMotion, SpinTiming},
    rng::{RandSource, SlotSource},
};

/// Rendering side of a spin. `begin` fires synchronously inside
/// [`SpinEngine::spin`]; `settle` fires once the duration has elapsed.
pub trait ReelDisplay: Send + Sync {
    fn begin(&self, motion: &ReelMotion, reel: &[Item]);
    fn settle(&self, landed: &Item);
}

/// Display that draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl ReelDisplay for NullDisplay {
    fn begin(&self, _motion: &ReelMotion, _reel: &[Item]) {}
    fn settle(&self, _landed: &Item) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpinPlan {
    pub offset: usize,
    pub target_slot: usize,
    pub landed_index: usize,
    pub landed: Item,
    pub motion: ReelMotion,
}

/// Picks where the reel stops: a uniform offset pushed `revolutions` full
/// turns ahead. The extra turns only lengthen the travel.
pub fn plan_spin(
    active: &[Item],
    source: &mut dyn SlotSource,
    timing: &SpinTiming,
) -> Option<SpinPlan> {
    let n = active.len();
    if n == 0 {
        return None;
    }
    let offset = source.draw(n) % n;
    let target_slot = offset + timing.revolutions * n;
    let landed_index = target_slot % n;
    Some(SpinPlan {
        offset,
        target_slot,
        landed_index,
        landed: active[landed_index].clone(),
        motion: ReelMotion {
            target_slot,
            item_height: timing.item_height,
            duration: timing.duration,
            easing: timing.easing,
        },
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpinSession {
    pub spinning: bool,
    pub last_result: Option<Item>,
}

/// An admitted spin. The landing is driven by a timer task, so dropping
/// the handle does not stop the reel.
#[derive(Debug)]
pub struct SpinHandle {
    pub plan: SpinPlan,
    task: JoinHandle<()>,
}

impl SpinHandle {
    /// Waits for the reel to stop. `None` if the timer task was cancelled
    /// before it could settle the session (runtime shutting down).
    pub async fn landed(self) -> Option<Item> {
        match self.task.await {
            Ok(()) => Some(self.plan.landed),
            Err(err) => {
                warn!(error = %err, "spin timer did not finish");
                None
            }
        }
    }
}

pub struct SpinEngine {
    session: Arc<Mutex<SpinSession>>,
    source: Mutex<Box<dyn SlotSource>>,
    display: Arc<dyn ReelDisplay>,
    timing: SpinTiming,
}

impl SpinEngine {
    pub fn new(source: impl SlotSource + 'static, display: Arc<dyn ReelDisplay>) -> Self {
        Self::with_timing(source, display, SpinTiming::default())
    }

    pub fn with_timing(
        source: impl SlotSource + 'static,
        display: Arc<dyn ReelDisplay>,
        timing: SpinTiming,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(SpinSession::default())),
            source: Mutex::new(Box::new(source)),
            display,
            timing,
        }
    }

    /// Engine backed by OS entropy with no display attached.
    pub fn headless() -> Self {
        Self::new(RandSource::from_entropy(), Arc::new(NullDisplay))
    }

    pub fn timing(&self) -> &SpinTiming {
        &self.timing
    }

    pub fn session(&self) -> SpinSession {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_spinning(&self) -> bool {
        self.session().spinning
    }

    /// Starts a spin over a snapshot of `active`. Returns `None`, touching
    /// nothing, when a spin is already in flight or the reel is empty.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spin(&self, active: &[Item]) -> Option<SpinHandle> {
        let plan = {
            let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            if session.spinning || active.is_empty() {
                debug!(spinning = session.spinning, len = active.len(), "spin ignored");
                return None;
            }
            let mut source = self.source.lock().unwrap_or_else(PoisonError::into_inner);
            let plan = plan_spin(active, &mut **source, &self.timing)?;
            session.spinning = true;
            session.last_result = None;
            plan
        };
        info!(
            offset = plan.offset,
            target_slot = plan.target_slot,
            travel = plan.motion.travel(),
            "reel spinning"
        );
        self.display.begin(&plan.motion, active);

        let session = Arc::clone(&self.session);
        let display = Arc::clone(&self.display);
        let landed = plan.landed.clone();
        let duration = plan.motion.duration;
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            {
                let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
                session.spinning = false;
                session.last_result = Some(landed.clone());
            }
            info!(item = %landed.name, id = %landed.id, "reel stopped");
            display.settle(&landed);
        });
        Some(SpinHandle { plan, task })
    }
}
