//! Ring breaking and the debris it leaves behind
//!
//! Breaking hands every segment of a ring over to the [`DebrisRegistry`],
//! which owns the flying pieces until their lifetime runs out.

use glam::Vec3;

use super::physics::{BodyId, CategoryMask, PhysicsProxy};
use super::ring::{DetachedSegment, PlatformRing};
use super::score::StreakScoreEngine;
use super::task::{TaskHandle, TaskQueue};
use crate::tuning::BreakTuning;

/// A detached segment awaiting despawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Debris {
    pub segment: DetachedSegment,
    pub body: BodyId,
}

/// Owner of detached segments until they despawn
#[derive(Debug, Default)]
pub struct DebrisRegistry {
    pending: TaskQueue<Debris>,
}

impl DebrisRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a piece and schedule its removal
    pub fn adopt(&mut self, debris: Debris, lifetime: f32) -> TaskHandle {
        self.pending.schedule(lifetime, debris)
    }

    /// Despawn pieces whose lifetime ran out; returns how many
    pub fn advance(&mut self, dt: f32, physics: &mut dyn PhysicsProxy) -> usize {
        let expired = self.pending.advance(dt);
        for debris in &expired {
            despawn_quietly(physics, debris.body);
        }
        expired.len()
    }

    /// Despawn everything right away (teardown)
    pub fn clear(&mut self, physics: &mut dyn PhysicsProxy) {
        for debris in self.pending.cancel_all() {
            despawn_quietly(physics, debris.body);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Debris> {
        self.pending.iter()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Removing something already gone is fine
fn despawn_quietly(physics: &mut dyn PhysicsProxy, body: BodyId) {
    if !physics.despawn(body) {
        log::trace!("Debris body {} already gone", body);
    }
}

#[derive(Debug)]
pub struct PlatformBreakResolver {
    tuning: BreakTuning,
    debris: DebrisRegistry,
}

impl PlatformBreakResolver {
    pub fn new(tuning: BreakTuning) -> Self {
        Self {
            tuning,
            debris: DebrisRegistry::new(),
        }
    }

    pub fn debris(&self) -> &DebrisRegistry {
        &self.debris
    }

    pub fn debris_mut(&mut self) -> &mut DebrisRegistry {
        &mut self.debris
    }

    /// Shatter a ring and score the break
    ///
    /// Returns the points banked, or `None` when the ring was already broken
    /// or can't be broken at all.
    pub fn break_ring(
        &mut self,
        ring: &mut PlatformRing,
        tower_yaw: f32,
        physics: &mut dyn PhysicsProxy,
        score: &mut StreakScoreEngine,
    ) -> Option<u64> {
        if !ring.is_breakable() {
            log::trace!("Ring {} is not breakable", ring.id);
            return None;
        }
        if !ring.mark_broken() {
            return None;
        }

        let center = ring.center;
        let indices: Vec<u16> = ring.segments().iter().map(|s| s.index).collect();
        for index in indices {
            if let Some(segment) = ring.detach(index, tower_yaw) {
                self.launch(segment, center, physics);
            }
        }

        let points = score.add_break();
        log::debug!(
            "Ring {} broken: +{} (streak {})",
            ring.id,
            points,
            score.streak()
        );
        Some(points)
    }

    fn launch(&mut self, segment: DetachedSegment, center: Vec3, physics: &mut dyn PhysicsProxy) {
        let pose = segment.pose;
        let body = match segment.body.filter(|b| physics.exists(*b)) {
            Some(body) => body,
            None => {
                log::debug!(
                    "Segment {}:{} had no body, spawning one",
                    segment.ring,
                    segment.index
                );
                physics.spawn_sector(
                    pose.origin,
                    pose.yaw,
                    pose.arc,
                    pose.half_height,
                    CategoryMask::DEBRIS,
                )
            }
        };

        if !physics.has_rigid_body(body) {
            physics.add_rigid_body(body);
        }
        if self.tuning.remove_collider {
            physics.remove_collider(body);
        }
        physics.set_category(body, CategoryMask::DEBRIS);
        physics.set_gravity(body, true);
        physics.set_velocity(body, Vec3::ZERO);
        physics.apply_impulse(body, kick_vector(pose.centroid(), center, &self.tuning));

        self.debris
            .adopt(Debris { segment, body }, self.tuning.debris_lifetime);
    }
}

/// Outward (away from the ring centre, horizontal) plus upward push
pub fn kick_vector(segment_position: Vec3, ring_center: Vec3, tuning: &BreakTuning) -> Vec3 {
    let planar = segment_position - ring_center;
    let outward = Vec3::new(planar.x, 0.0, planar.z).normalize_or_zero();
    outward * tuning.kick_force + Vec3::Y * tuning.upward_force
}
