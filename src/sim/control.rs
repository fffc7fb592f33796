//! Tower rotation from pointer drag
//!
//! Dragging sideways turns the tower. Letting go keeps it turning briefly,
//! with the last angular velocity easing out to zero.

use glam::Vec2;

use super::task::Tween;
use crate::ease_out_quad;
use crate::tuning::ControlTuning;

/// Pointer state for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DragInput {
    /// Pointer movement since the last frame, `None` when not pressed
    pub delta: Option<Vec2>,
}

impl DragInput {
    pub fn held(delta: Vec2) -> Self {
        Self { delta: Some(delta) }
    }

    pub fn released() -> Self {
        Self { delta: None }
    }
}

#[derive(Debug, Clone)]
pub struct TowerControl {
    tuning: ControlTuning,
    enabled: bool,
    dragging: bool,
    /// Angular velocity of the last drag step (rad/s)
    velocity: f32,
    inertia: Option<Tween<f32>>,
}

impl TowerControl {
    pub fn new(tuning: ControlTuning) -> Self {
        Self {
            tuning,
            enabled: true,
            dragging: false,
            velocity: 0.0,
            inertia: None,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Whether release inertia is still turning the tower
    pub fn is_coasting(&self) -> bool {
        self.inertia.is_some()
    }

    /// Stop responding to input and drop any inertia
    pub fn disable(&mut self) {
        self.enabled = false;
        self.dragging = false;
        self.velocity = 0.0;
        self.inertia = None;
    }

    /// Yaw delta (radians) to apply to the tower this frame
    pub fn update(&mut self, input: DragInput, dt: f32) -> f32 {
        if !self.enabled || dt <= 0.0 {
            return 0.0;
        }
        match input.delta {
            Some(delta) => self.drag(delta, dt),
            None => {
                if self.dragging {
                    self.release();
                }
                self.coast(dt)
            }
        }
    }

    fn drag(&mut self, delta: Vec2, dt: f32) -> f32 {
        self.dragging = true;
        self.inertia = None;
        // Inverted so the tower follows the finger
        let step = (-delta.x * self.tuning.rotation_speed * dt).to_radians();
        self.velocity = step / dt;
        step
    }

    fn release(&mut self) {
        self.dragging = false;
        if self.velocity != 0.0 && self.tuning.inertia_duration > 0.0 {
            self.inertia = Some(Tween::new(
                self.velocity,
                0.0,
                self.tuning.inertia_duration,
                ease_out_quad,
            ));
        }
        self.velocity = 0.0;
    }

    fn coast(&mut self, dt: f32) -> f32 {
        let Some(tween) = self.inertia.as_mut() else {
            return 0.0;
        };
        let speed = tween.advance(dt);
        if tween.is_finished() {
            self.inertia = None;
        }
        speed * dt
    }
}
