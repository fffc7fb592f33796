//! The tower: an ordered stack of rings plus its triggers (power pickups,
//! cancel zones and troll balls)
//!
//! Levels are generated from a seed so a given level name always builds the
//! same tower.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::collision::spheres_overlap;
use super::physics::{BodyId, PhysicsProxy};
use super::ring::{PlatformRing, RingId, RingKind, SEGMENT_HALF_HEIGHT, SegmentKind, ring_arcs};
use crate::consts::*;
use crate::tuning::LevelTuning;
use crate::{normalize_angle, polar_to_planar, rotate_yaw};

/// Radius of a power pickup trigger
pub const PICKUP_RADIUS: f32 = 0.3;

/// Power-mode trigger riding on the tower
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerPickup {
    pub id: u32,
    /// Position relative to the tower axis before tower rotation
    pub local: Vec3,
    pub radius: f32,
    pub collected: bool,
}

/// Radius of a troll ball trigger
pub const TROLL_RADIUS: f32 = 0.3;

/// Rising hazard that latches onto the entity and weighs it down
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrollBall {
    pub id: u32,
    /// Position relative to the tower axis before tower rotation
    pub local: Vec3,
    pub radius: f32,
    pub attached: bool,
}

/// Horizontal slab that ends power mode on entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CancelZone {
    pub y_min: f32,
    pub y_max: f32,
}

impl CancelZone {
    pub fn contains(&self, point: Vec3) -> bool {
        point.y >= self.y_min && point.y <= self.y_max
    }
}

/// Where a body sits in the tower
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRef {
    pub ring: RingId,
    pub index: u16,
    pub kind: SegmentKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tower {
    pub name: String,
    pub level: u32,
    /// Rotation applied by the player, radians
    pub yaw: f32,
    /// Top to bottom
    rings: Vec<PlatformRing>,
    pub pickups: Vec<PowerPickup>,
    pub cancel_zones: Vec<CancelZone>,
    pub trolls: Vec<TrollBall>,
    /// Where the falling entity starts
    pub spawn_point: Vec3,
}

impl Tower {
    pub fn new(name: impl Into<String>, level: u32, spawn_point: Vec3) -> Self {
        Self {
            name: name.into(),
            level,
            yaw: 0.0,
            rings: Vec::new(),
            pickups: Vec::new(),
            cancel_zones: Vec::new(),
            trolls: Vec::new(),
            spawn_point,
        }
    }

    /// Append a ring below the existing ones
    pub fn push_ring(&mut self, ring: PlatformRing) {
        self.rings.push(ring);
    }

    pub fn rings(&self) -> &[PlatformRing] {
        &self.rings
    }

    pub fn ring(&self, id: RingId) -> Option<&PlatformRing> {
        self.rings.iter().find(|r| r.id == id)
    }

    pub fn ring_mut(&mut self, id: RingId) -> Option<&mut PlatformRing> {
        self.rings.iter_mut().find(|r| r.id == id)
    }

    /// Which segment a physics body belongs to
    pub fn locate(&self, body: BodyId) -> Option<SegmentRef> {
        self.rings.iter().find_map(|ring| {
            ring.find_body(body).and_then(|index| {
                ring.segment(index).map(|seg| SegmentRef {
                    ring: ring.id,
                    index,
                    kind: seg.kind,
                })
            })
        })
    }

    /// Apply a rotation delta from player input
    pub fn rotate(&mut self, delta: f32) {
        self.yaw = normalize_angle(self.yaw + delta);
    }

    /// Advance self-spinning rings
    pub fn spin_gears(&mut self, dt: f32) {
        for ring in &mut self.rings {
            if let RingKind::Gear { spin_speed } = ring.kind {
                ring.spin = normalize_angle(ring.spin + spin_speed * dt);
            }
        }
    }

    /// Create collider bodies for every ring
    pub fn spawn_colliders(&mut self, physics: &mut dyn PhysicsProxy) {
        let yaw = self.yaw;
        for ring in &mut self.rings {
            ring.spawn_colliders(physics, yaw);
        }
    }

    /// Push the current rotations into the physics world
    pub fn sync_physics(&self, physics: &mut dyn PhysicsProxy) {
        for ring in &self.rings {
            ring.sync_physics(physics, self.yaw);
        }
    }

    /// Unbroken breakable rings whose height is above `y`, top first
    pub fn rings_above(&self, y: f32) -> Vec<RingId> {
        self.rings
            .iter()
            .filter(|r| r.is_breakable() && !r.is_broken() && r.center.y > y)
            .map(|r| r.id)
            .collect()
    }

    pub fn pickup_world_position(&self, pickup: &PowerPickup) -> Vec3 {
        rotate_yaw(pickup.local, self.yaw)
    }

    /// Mark and return the ids of uncollected pickups touching the sphere
    pub fn collect_pickups(&mut self, center: Vec3, radius: f32) -> Vec<u32> {
        let yaw = self.yaw;
        let mut collected = Vec::new();
        for pickup in self.pickups.iter_mut().filter(|p| !p.collected) {
            if spheres_overlap(rotate_yaw(pickup.local, yaw), pickup.radius, center, radius) {
                pickup.collected = true;
                collected.push(pickup.id);
            }
        }
        collected
    }

    pub fn in_cancel_zone(&self, point: Vec3) -> bool {
        self.cancel_zones.iter().any(|z| z.contains(point))
    }

    pub fn troll_world_position(&self, troll: &TrollBall) -> Vec3 {
        rotate_yaw(troll.local, self.yaw)
    }

    /// Raise free trolls; attached ones are pinned to `anchor` (world space)
    pub fn move_trolls(&mut self, dt: f32, rise_speed: f32, anchor: Option<Vec3>) {
        let yaw = self.yaw;
        for troll in &mut self.trolls {
            match anchor {
                Some(world) if troll.attached => troll.local = rotate_yaw(world, -yaw),
                _ => troll.local.y += rise_speed * dt,
            }
        }
    }

    /// Attach and return the ids of free trolls touching the sphere
    pub fn catch_trolls(&mut self, center: Vec3, radius: f32) -> Vec<u32> {
        let yaw = self.yaw;
        let mut caught = Vec::new();
        for troll in self.trolls.iter_mut().filter(|t| !t.attached) {
            if spheres_overlap(rotate_yaw(troll.local, yaw), troll.radius, center, radius) {
                troll.attached = true;
                caught.push(troll.id);
            }
        }
        caught
    }

    pub fn has_attached_troll(&self) -> bool {
        self.trolls.iter().any(|t| t.attached)
    }

    /// Let go of every attached troll; returns how many were released
    pub fn detach_trolls(&mut self) -> usize {
        let mut released = 0;
        for troll in self.trolls.iter_mut().filter(|t| t.attached) {
            troll.attached = false;
            released += 1;
        }
        released
    }

    /// Remove every segment body still owned by the tower
    pub fn despawn(&mut self, physics: &mut dyn PhysicsProxy) {
        for ring in &mut self.rings {
            let bodies: Vec<BodyId> = ring.segments().iter().filter_map(|s| s.body).collect();
            for body in bodies {
                if !physics.despawn(body) {
                    log::trace!("Segment body {} already gone", body);
                }
                ring.release_body(body);
            }
        }
    }
}

/// Level number encoded in a level name ("Level2" → 2); unknown names map to 1
pub fn level_number(name: &str) -> u32 {
    name.strip_prefix("Level")
        .and_then(|n| n.parse::<u32>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(1)
}

/// Build the tower for a level name
pub fn generate_level(name: &str, tuning: &LevelTuning) -> Tower {
    let level = level_number(name);
    let level_seed = (level as u64)
        .wrapping_mul(2654435761)
        .wrapping_add(tuning.seed);
    let mut rng = Pcg32::seed_from_u64(level_seed);

    let spacing = tuning.ring_spacing;
    let total_rings = tuning.ring_count + 1 + tuning.bonus_factors.len() as u32;
    let ring_y = |i: u32| (total_rings - i) as f32 * spacing;

    let spawn = Vec3::new(ENTITY_ORBIT_RADIUS, ring_y(0) + spacing * 0.5, 0.0);
    let mut tower = Tower::new(level_name(level), level, spawn);

    let segments = tuning.segments_per_ring.max(1);
    // Rotates segment 0 so it is centred on the spawn angle
    let centred = -std::f32::consts::TAU / segments as f32 / 2.0;
    let gap = tuning.gap_segments.min(segments - 1);
    // Harder levels get more hazards; rings clamp this to a proper subset
    let deadly = tuning.deadly_count + (level - 1);
    let mut gear_count = 0;
    let mut deadly_total = 0;

    for i in 0..tuning.ring_count {
        let kind = determine_ring_kind(i, tuning, &mut rng);
        let (phase, gap_start) = if i == 0 {
            // Spawn sits over the middle of segment 0, which is never a gap
            let start = if gap > 0 {
                rng.random_range(1..=segments - gap)
            } else {
                0
            };
            (centred, start as usize)
        } else {
            (
                rng.random::<f32>() * std::f32::consts::TAU,
                rng.random_range(0..segments) as usize,
            )
        };

        let mut arcs = ring_arcs(segments, RING_INNER_RADIUS, RING_OUTER_RADIUS, phase);
        let gap_indices: Vec<usize> = (0..gap as usize)
            .map(|k| (gap_start + k) % segments as usize)
            .collect();
        let gap_theta = arcs[gap_start].theta_start + arcs[gap_start].angular_span() * gap as f32 / 2.0;
        arcs = arcs
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| !gap_indices.contains(idx))
            .map(|(_, arc)| arc)
            .collect();

        let center = Vec3::new(0.0, ring_y(i), 0.0);
        let Some(mut ring) = PlatformRing::new(i, kind, center, arcs) else {
            continue;
        };

        match kind {
            RingKind::Gear { .. } => gear_count += 1,
            // First ring is always safe
            RingKind::Helix if i > 0 => {
                deadly_total += ring
                    .assign_deadly(&mut rng, deadly as usize, tuning.allow_all_deadly)
                    .len();
            }
            _ => {}
        }
        tower.push_ring(ring);

        if tuning.power_pickup_rings.contains(&i) {
            let id = tower.pickups.len() as u32 + 1;
            tower.pickups.push(PowerPickup {
                id,
                local: polar_to_planar(ENTITY_ORBIT_RADIUS, gap_theta)
                    + Vec3::Y * (center.y + spacing * 0.5),
                radius: PICKUP_RADIUS,
                collected: false,
            });
        }
        if tuning.troll_rings.contains(&i) {
            let id = tower.trolls.len() as u32 + 1;
            tower.trolls.push(TrollBall {
                id,
                local: polar_to_planar(ENTITY_ORBIT_RADIUS, gap_theta)
                    + Vec3::Y * (center.y - spacing * 0.5),
                radius: TROLL_RADIUS,
                attached: false,
            });
        }
    }

    // Finish ring, with a cancel zone just above it
    let finish_id = tuning.ring_count;
    let finish_y = ring_y(finish_id);
    if let Some(ring) = PlatformRing::new(
        finish_id,
        RingKind::Finish,
        Vec3::new(0.0, finish_y, 0.0),
        ring_arcs(segments, RING_INNER_RADIUS, RING_OUTER_RADIUS, centred),
    ) {
        tower.push_ring(ring);
    }
    tower.cancel_zones.push(CancelZone {
        y_min: finish_y + SEGMENT_HALF_HEIGHT,
        y_max: finish_y + spacing * 0.5,
    });

    // Bonus rings under the finish
    for (k, &factor) in tuning.bonus_factors.iter().enumerate() {
        let id = finish_id + 1 + k as u32;
        if let Some(ring) = PlatformRing::new(
            id,
            RingKind::Bonus { factor },
            Vec3::new(0.0, ring_y(id), 0.0),
            ring_arcs(segments, RING_INNER_RADIUS, RING_OUTER_RADIUS, centred),
        ) {
            tower.push_ring(ring);
        }
    }

    log::info!(
        "{}: rings={}, gears={}, deadly={}, pickups={}, trolls={}, bonus={:?}",
        tower.name,
        tower.rings.len(),
        gear_count,
        deadly_total,
        tower.pickups.len(),
        tower.trolls.len(),
        tuning.bonus_factors
    );

    tower
}

/// Canonical name for a level number
pub fn level_name(level: u32) -> String {
    format!("Level{}", level.max(1))
}

/// Helix or gear for the ring at `index`
fn determine_ring_kind(index: u32, tuning: &LevelTuning, rng: &mut Pcg32) -> RingKind {
    if tuning.gear_every == 0 || index == 0 || index % tuning.gear_every != 0 {
        return RingKind::Helix;
    }
    let direction = if rng.random::<bool>() { 1.0 } else { -1.0 };
    RingKind::Gear {
        spin_speed: tuning.gear_spin_speed.to_radians() * direction,
    }
}
