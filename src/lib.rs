//! Helix Drop - gameplay core for a helix tower-descent arcade game
//!
//! Core modules:
//! - `sim`: Frame-synchronous simulation (contact probing, bounce, breaks, scoring)
//! - `tuning`: Data-driven game balance

pub mod sim;
pub mod tuning;

pub use tuning::{Tuning, TuningError};

use glam::{Vec2, Vec3};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (50 Hz, physics-engine default)
    pub const SIM_DT: f32 = 1.0 / 50.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Largest frame delta accepted by the frame loop
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Gravity acceleration applied by the reference physics world (units/s²)
    pub const GRAVITY: f32 = 9.81;

    /// Falling entity radius
    pub const ENTITY_RADIUS: f32 = 0.25;

    /// Ring defaults
    pub const RING_INNER_RADIUS: f32 = 0.6;
    pub const RING_OUTER_RADIUS: f32 = 2.0;
    /// Radius of the circle the falling entity rides on (mid-band)
    pub const ENTITY_ORBIT_RADIUS: f32 = 1.3;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Convert polar (r, theta) in the horizontal plane to a world offset (x, 0, z)
#[inline]
pub fn polar_to_planar(r: f32, theta: f32) -> Vec3 {
    Vec3::new(r * theta.cos(), 0.0, r * theta.sin())
}

/// Convert a world offset to polar (r, theta) in the horizontal plane
#[inline]
pub fn planar_to_polar(offset: Vec3) -> (f32, f32) {
    let planar = Vec2::new(offset.x, offset.z);
    (planar.length(), planar.y.atan2(planar.x))
}

/// Rotate a vector about the vertical axis by `yaw` radians (x→z positive)
#[inline]
pub fn rotate_yaw(v: Vec3, yaw: f32) -> Vec3 {
    let (s, c) = yaw.sin_cos();
    Vec3::new(v.x * c - v.z * s, v.y, v.x * s + v.z * c)
}

/// Ease-out quadratic: fast start, gentle stop
#[inline]
pub fn ease_out_quad(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}
