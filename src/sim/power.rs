//! Power mode: a real-time invulnerability window
//!
//! While active the falling entity carries the power-mode category marker
//! and the bounce state machine stops probing, so hazards are never
//! classified. The countdown runs on unscaled time so slow-motion or pause
//! doesn't stretch it.

use serde::{Deserialize, Serialize};

use super::physics::{BodyId, CategoryMask, PhysicsProxy};
use super::task::Timer;
use crate::tuning::PowerTuning;

/// Why a window closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerEnd {
    Expired,
    Cancelled,
}

/// Active flag plus remaining real time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvulnerabilityState {
    pub active: bool,
    pub remaining: f32,
}

#[derive(Debug, Clone)]
pub struct InvulnerabilityWindow {
    duration: f32,
    countdown: Option<Timer>,
    /// Category the entity had before the marker was applied
    restore_category: Option<CategoryMask>,
}

impl InvulnerabilityWindow {
    pub fn new(tuning: &PowerTuning) -> Self {
        Self {
            duration: tuning.duration,
            countdown: None,
            restore_category: None,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.countdown.is_some()
    }

    pub fn state(&self) -> InvulnerabilityState {
        InvulnerabilityState {
            active: self.is_active(),
            remaining: self.countdown.map_or(0.0, |t| t.remaining()),
        }
    }

    /// Open the window, or restart the countdown if it is already open
    pub fn start(&mut self, physics: &mut dyn PhysicsProxy, entity: BodyId) {
        if self.countdown.is_none() {
            self.restore_category = physics.category(entity);
            log::debug!("Power mode on ({:.2}s)", self.duration);
        } else {
            log::debug!("Power mode restarted");
        }
        physics.set_category(entity, CategoryMask::POWER_MODE);
        self.countdown = Some(Timer::new(self.duration));
    }

    /// Advance by unscaled (wall-clock) seconds
    pub fn tick(
        &mut self,
        real_dt: f32,
        physics: &mut dyn PhysicsProxy,
        entity: BodyId,
    ) -> Option<PowerEnd> {
        let timer = self.countdown.as_mut()?;
        if timer.advance(real_dt) {
            self.end(physics, entity);
            return Some(PowerEnd::Expired);
        }
        None
    }

    /// Close early (entering a cancel zone); no-op when inactive
    pub fn cancel(&mut self, physics: &mut dyn PhysicsProxy, entity: BodyId) -> Option<PowerEnd> {
        if !self.is_active() {
            return None;
        }
        self.end(physics, entity);
        Some(PowerEnd::Cancelled)
    }

    fn end(&mut self, physics: &mut dyn PhysicsProxy, entity: BodyId) {
        self.countdown = None;
        let category = self.restore_category.take().unwrap_or(CategoryMask::ENTITY);
        physics.set_category(entity, category);
        log::debug!("Power mode off");
    }
}
