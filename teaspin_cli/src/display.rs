use std::{
    io::Write,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use tokio::{task::JoinHandle, time::Instant};

use teaspin_core::{Item, ReelDisplay, ReelMotion};

const FRAME: Duration = Duration::from_millis(60);

/// Draws the reel window on one terminal line while it travels.
#[derive(Default)]
pub struct TerminalDisplay {
    animation: Mutex<Option<JoinHandle<()>>>,
}

impl ReelDisplay for TerminalDisplay {
    fn begin(&self, motion: &ReelMotion, reel: &[Item]) {
        let motion = *motion;
        let names: Vec<String> = reel.iter().map(|item| item.name.clone()).collect();
        let task = tokio::spawn(async move {
            let start = Instant::now();
            let mut frames = tokio::time::interval(FRAME);
            loop {
                frames.tick().await;
                let elapsed = start.elapsed();
                if elapsed >= motion.duration {
                    break;
                }
                let slot = motion.slot_at(elapsed) % names.len();
                eprint!("\r\x1b[2K  ▶ {}", names[slot]);
                let _ = std::io::stderr().flush();
            }
        });
        let mut animation = self.animation.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = animation.replace(task) {
            previous.abort();
        }
    }

    fn settle(&self, landed: &Item) {
        let finished = self
            .animation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = finished {
            task.abort();
        }
        eprintln!("\r\x1b[2K  ■ {}", landed.name);
    }
}
