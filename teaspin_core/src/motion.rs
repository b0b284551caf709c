use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ITEM_HEIGHT: u32 = 100;
pub const SPIN_DURATION: Duration = Duration::from_millis(3000);
pub const MIN_REVOLUTIONS: usize = 2;

/// CSS-style cubic Bézier timing curve anchored at (0,0) and (1,1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl CubicBezier {
    /// Fast start, long slow settle.
    pub const REEL: CubicBezier = CubicBezier {
        x1: 0.21,
        y1: 0.53,
        x2: 0.29,
        y2: 0.99,
    };

    fn axis(t: f64, p1: f64, p2: f64) -> f64 {
        let u = 1.0 - t;
        3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t
    }

    /// Progress at time fraction `x` (clamped to `[0,1]`).
    pub fn sample(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        // x(t) is monotonic while x1, x2 lie in [0,1]; bisect for t
        let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
        for _ in 0..60 {
            let mid = (lo + hi) / 2.0;
            if Self::axis(mid, self.x1, self.x2) < x {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Self::axis((lo + hi) / 2.0, self.y1, self.y2).clamp(0.0, 1.0)
    }
}

impl Default for CubicBezier {
    fn default() -> Self {
        Self::REEL
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinTiming {
    pub item_height: u32,
    pub duration: Duration,
    pub revolutions: usize,
    pub easing: CubicBezier,
}

impl Default for SpinTiming {
    fn default() -> Self {
        Self {
            item_height: ITEM_HEIGHT,
            duration: SPIN_DURATION,
            revolutions: MIN_REVOLUTIONS,
            easing: CubicBezier::REEL,
        }
    }
}

/// One continuous reel transition, handed to the display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReelMotion {
    pub target_slot: usize,
    pub item_height: u32,
    pub duration: Duration,
    pub easing: CubicBezier,
}

impl ReelMotion {
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }

    /// Total distance travelled, in display units.
    pub fn travel(&self) -> u64 {
        self.target_slot as u64 * self.item_height as u64
    }

    pub fn offset_at(&self, elapsed: Duration) -> f64 {
        if self.duration.is_zero() {
            return self.travel() as f64;
        }
        let x = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        self.easing.sample(x) * self.travel() as f64
    }

    /// Absolute slot under the window at `elapsed`. Reduce modulo the reel
    /// length to find the item.
    pub fn slot_at(&self, elapsed: Duration) -> usize {
        if self.item_height == 0 {
            return self.target_slot;
        }
        let slot = (self.offset_at(elapsed) / self.item_height as f64).round() as usize;
        slot.min(self.target_slot)
    }
}
