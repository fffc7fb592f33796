//! Physics-proxy contract and a small reference world
//!
//! The gameplay core never integrates rigid bodies itself. It issues
//! queries, impulses and flag toggles through [`PhysicsProxy`]; a real
//! engine sits behind it in the shipped game. [`SimplePhysics`] implements
//! just enough (gravity, landing on ring tops, downward raycasts) to drive
//! the core headless and in tests.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::arc::ArcSegment;
use super::collision::{
    DownHit, SectorPose, ray_down_sector, ray_down_sphere, sphere_lands_on_sector,
};
use crate::consts::GRAVITY;

/// Opaque handle to a body in the physics world
pub type BodyId = u32;

/// Collision category bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryMask(pub u32);

impl CategoryMask {
    /// Ring segments
    pub const PLATFORM: Self = Self(1 << 0);
    /// The falling entity in its normal state
    pub const ENTITY: Self = Self(1 << 1);
    /// The falling entity while invulnerable; passes through platforms
    pub const POWER_MODE: Self = Self(1 << 2);
    /// Debris and other clutter
    pub const DEBRIS: Self = Self(1 << 3);

    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

/// Shape attached to a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collider {
    /// Horizontal slab shaped like an annular sector, relative to the body origin
    Sector { arc: ArcSegment, half_height: f32 },
    Sphere { radius: f32 },
}

/// A downward raycast hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub body: BodyId,
    pub point: Vec3,
    pub distance: f32,
}

/// Everything the gameplay core asks of a physics engine
pub trait PhysicsProxy {
    /// Add a collider-only sector slab posed at `origin` (a ring segment)
    fn spawn_sector(
        &mut self,
        origin: Vec3,
        yaw: f32,
        arc: ArcSegment,
        half_height: f32,
        category: CategoryMask,
    ) -> BodyId;
    /// Add a simulated sphere (the falling entity)
    fn spawn_sphere(&mut self, position: Vec3, radius: f32, category: CategoryMask) -> BodyId;

    /// Nearest body below `origin` within `max_distance` whose category is in `mask`
    fn raycast_down(&self, origin: Vec3, max_distance: f32, mask: CategoryMask) -> Option<RayHit>;

    fn exists(&self, body: BodyId) -> bool;
    fn position(&self, body: BodyId) -> Option<Vec3>;
    fn set_position(&mut self, body: BodyId, position: Vec3);
    fn set_yaw(&mut self, body: BodyId, yaw: f32);
    fn category(&self, body: BodyId) -> Option<CategoryMask>;
    fn set_category(&mut self, body: BodyId, category: CategoryMask);

    /// Whether the body is simulated (has a rigid body)
    fn has_rigid_body(&self, body: BodyId) -> bool;
    /// Give a collider-only body a rigid body with default state
    fn add_rigid_body(&mut self, body: BodyId);
    fn remove_collider(&mut self, body: BodyId);
    /// World-space pose of the body's sector collider, if it has one
    fn sector_pose(&self, body: BodyId) -> Option<SectorPose>;

    fn set_gravity(&mut self, body: BodyId, enabled: bool);
    fn gravity_enabled(&self, body: BodyId) -> bool;
    /// Multiplier on world gravity for this body (1 is normal weight)
    fn set_gravity_scale(&mut self, body: BodyId, scale: f32);
    fn gravity_scale(&self, body: BodyId) -> f32;
    fn velocity(&self, body: BodyId) -> Vec3;
    fn set_velocity(&mut self, body: BodyId, velocity: Vec3);
    /// Instantaneous change of momentum (unit mass)
    fn apply_impulse(&mut self, body: BodyId, impulse: Vec3);

    /// Remove the body; returns false when it was already gone
    fn despawn(&mut self, body: BodyId) -> bool;

    /// Advance the world's own integration; engines that step themselves may ignore this
    fn step(&mut self, dt: f32);
}

/// Dynamic state of a simulated body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidState {
    pub velocity: Vec3,
    pub gravity: bool,
    pub gravity_scale: f32,
}

impl Default for RigidState {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            gravity: true,
            gravity_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Body {
    pub id: BodyId,
    pub position: Vec3,
    pub yaw: f32,
    pub category: CategoryMask,
    pub collider: Option<Collider>,
    pub rigid: Option<RigidState>,
}

impl Body {
    fn sector_pose(&self) -> Option<SectorPose> {
        match self.collider {
            Some(Collider::Sector { arc, half_height }) => Some(SectorPose {
                origin: self.position,
                yaw: self.yaw,
                arc,
                half_height,
            }),
            _ => None,
        }
    }
}

/// Minimal reference world: gravity, sphere-on-sector landing, downward raycasts
#[derive(Debug, Clone, Default)]
pub struct SimplePhysics {
    /// Sorted by id for deterministic iteration
    bodies: Vec<Body>,
    next_id: BodyId,
}

impl SimplePhysics {
    pub fn new() -> Self {
        Self {
            bodies: Vec::new(),
            next_id: 1,
        }
    }

    fn spawn(&mut self, body: Body) -> BodyId {
        let id = body.id;
        self.bodies.push(body);
        id
    }

    fn allocate(&mut self) -> BodyId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.iter().find(|b| b.id == id)
    }

    fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.iter_mut().find(|b| b.id == id)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Spheres in the power-mode category fall through platforms
    fn lands_on_platforms(category: CategoryMask) -> bool {
        !category.intersects(CategoryMask::POWER_MODE)
    }
}

impl PhysicsProxy for SimplePhysics {
    fn spawn_sector(
        &mut self,
        origin: Vec3,
        yaw: f32,
        arc: ArcSegment,
        half_height: f32,
        category: CategoryMask,
    ) -> BodyId {
        let id = self.allocate();
        self.spawn(Body {
            id,
            position: origin,
            yaw,
            category,
            collider: Some(Collider::Sector { arc, half_height }),
            rigid: None,
        })
    }

    fn spawn_sphere(&mut self, position: Vec3, radius: f32, category: CategoryMask) -> BodyId {
        let id = self.allocate();
        self.spawn(Body {
            id,
            position,
            yaw: 0.0,
            category,
            collider: Some(Collider::Sphere { radius }),
            rigid: Some(RigidState::default()),
        })
    }

    fn raycast_down(&self, origin: Vec3, max_distance: f32, mask: CategoryMask) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        for body in &self.bodies {
            if !body.category.intersects(mask) {
                continue;
            }
            let hit: Option<DownHit> = match body.collider {
                Some(Collider::Sector { .. }) => body
                    .sector_pose()
                    .and_then(|pose| ray_down_sector(origin, max_distance, &pose)),
                Some(Collider::Sphere { radius }) => {
                    ray_down_sphere(origin, max_distance, body.position, radius)
                }
                None => None,
            };
            if let Some(hit) = hit {
                // Strictly nearer wins; ties keep the lower id
                if best.is_none_or(|b| hit.distance < b.distance) {
                    best = Some(RayHit {
                        body: body.id,
                        point: hit.point,
                        distance: hit.distance,
                    });
                }
            }
        }
        best
    }

    fn exists(&self, body: BodyId) -> bool {
        self.body(body).is_some()
    }

    fn position(&self, body: BodyId) -> Option<Vec3> {
        self.body(body).map(|b| b.position)
    }

    fn set_position(&mut self, body: BodyId, position: Vec3) {
        if let Some(b) = self.body_mut(body) {
            b.position = position;
        }
    }

    fn set_yaw(&mut self, body: BodyId, yaw: f32) {
        if let Some(b) = self.body_mut(body) {
            b.yaw = yaw;
        }
    }

    fn category(&self, body: BodyId) -> Option<CategoryMask> {
        self.body(body).map(|b| b.category)
    }

    fn set_category(&mut self, body: BodyId, category: CategoryMask) {
        if let Some(b) = self.body_mut(body) {
            b.category = category;
        }
    }

    fn has_rigid_body(&self, body: BodyId) -> bool {
        self.body(body).is_some_and(|b| b.rigid.is_some())
    }

    fn add_rigid_body(&mut self, body: BodyId) {
        if let Some(b) = self.body_mut(body) {
            b.rigid.get_or_insert_with(RigidState::default);
        }
    }

    fn remove_collider(&mut self, body: BodyId) {
        if let Some(b) = self.body_mut(body) {
            b.collider = None;
        }
    }

    fn sector_pose(&self, body: BodyId) -> Option<SectorPose> {
        self.body(body).and_then(Body::sector_pose)
    }

    fn set_gravity(&mut self, body: BodyId, enabled: bool) {
        if let Some(rigid) = self.body_mut(body).and_then(|b| b.rigid.as_mut()) {
            rigid.gravity = enabled;
        }
    }

    fn gravity_enabled(&self, body: BodyId) -> bool {
        self.body(body)
            .and_then(|b| b.rigid)
            .is_some_and(|r| r.gravity)
    }

    fn set_gravity_scale(&mut self, body: BodyId, scale: f32) {
        if let Some(rigid) = self.body_mut(body).and_then(|b| b.rigid.as_mut()) {
            rigid.gravity_scale = scale;
        }
    }

    fn gravity_scale(&self, body: BodyId) -> f32 {
        self.body(body)
            .and_then(|b| b.rigid)
            .map_or(1.0, |r| r.gravity_scale)
    }

    fn velocity(&self, body: BodyId) -> Vec3 {
        self.body(body)
            .and_then(|b| b.rigid)
            .map(|r| r.velocity)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(&mut self, body: BodyId, velocity: Vec3) {
        if let Some(rigid) = self.body_mut(body).and_then(|b| b.rigid.as_mut()) {
            rigid.velocity = velocity;
        }
    }

    fn apply_impulse(&mut self, body: BodyId, impulse: Vec3) {
        if let Some(rigid) = self.body_mut(body).and_then(|b| b.rigid.as_mut()) {
            rigid.velocity += impulse;
        }
    }

    fn despawn(&mut self, body: BodyId) -> bool {
        let before = self.bodies.len();
        self.bodies.retain(|b| b.id != body);
        self.bodies.len() != before
    }

    fn step(&mut self, dt: f32) {
        // Platforms the spheres can land on (snapshot before moving anything)
        let platforms: Vec<SectorPose> = self
            .bodies
            .iter()
            .filter(|b| b.rigid.is_none() && b.category.intersects(CategoryMask::PLATFORM))
            .filter_map(Body::sector_pose)
            .collect();

        for body in &mut self.bodies {
            let Some(rigid) = body.rigid.as_mut() else {
                continue;
            };
            if rigid.gravity {
                rigid.velocity.y -= GRAVITY * rigid.gravity_scale * dt;
            }
            let prev = body.position;
            body.position += rigid.velocity * dt;

            if let Some(Collider::Sphere { radius }) = body.collider {
                if rigid.velocity.y < 0.0 && Self::lands_on_platforms(body.category) {
                    let rest = platforms
                        .iter()
                        .filter_map(|p| sphere_lands_on_sector(prev, body.position, radius, p))
                        .fold(None, |acc: Option<f32>, y| Some(acc.map_or(y, |a| a.max(y))));
                    if let Some(rest_y) = rest {
                        body.position.y = rest_y;
                        rigid.velocity.y = 0.0;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polar_to_planar;
    use std::f32::consts::PI;

    fn world_with_platform() -> (SimplePhysics, BodyId) {
        let mut world = SimplePhysics::new();
        let arc = ArcSegment::from_band(0.5, 2.0, 0.0, PI / 2.0);
        let id = world.spawn_sector(Vec3::ZERO, 0.0, arc, 0.1, CategoryMask::PLATFORM);
        (world, id)
    }

    #[test]
    fn test_raycast_filters_by_mask() {
        let (world, id) = world_with_platform();
        let origin = polar_to_planar(1.0, PI / 4.0) + Vec3::Y * 0.2;
        assert_eq!(
            world
                .raycast_down(origin, 0.2, CategoryMask::PLATFORM)
                .map(|h| h.body),
            Some(id)
        );
        assert!(world.raycast_down(origin, 0.2, CategoryMask::DEBRIS).is_none());
    }

    #[test]
    fn test_raycast_nearest_wins() {
        let (mut world, _) = world_with_platform();
        let arc = ArcSegment::from_band(0.5, 2.0, 0.0, PI / 2.0);
        let upper = world.spawn_sector(Vec3::Y * 0.5, 0.0, arc, 0.1, CategoryMask::PLATFORM);
        let origin = polar_to_planar(1.0, PI / 4.0) + Vec3::Y * 0.7;
        let hit = world.raycast_down(origin, 5.0, CategoryMask::PLATFORM).unwrap();
        assert_eq!(hit.body, upper);
    }

    #[test]
    fn test_sphere_falls_and_lands() {
        let (mut world, _) = world_with_platform();
        let start = polar_to_planar(1.0, PI / 4.0) + Vec3::Y * 2.0;
        let ball = world.spawn_sphere(start, 0.25, CategoryMask::ENTITY);
        for _ in 0..200 {
            world.step(1.0 / 50.0);
        }
        let pos = world.position(ball).unwrap();
        assert!((pos.y - 0.35).abs() < 1e-4, "rested at {}", pos.y);
        assert_eq!(world.velocity(ball).y, 0.0);
    }

    #[test]
    fn test_power_mode_sphere_falls_through() {
        let (mut world, _) = world_with_platform();
        let start = polar_to_planar(1.0, PI / 4.0) + Vec3::Y * 2.0;
        let ball = world.spawn_sphere(start, 0.25, CategoryMask::POWER_MODE);
        for _ in 0..100 {
            world.step(1.0 / 50.0);
        }
        assert!(world.position(ball).unwrap().y < 0.0);
    }

    #[test]
    fn test_gravity_scale_makes_body_heavier() {
        let mut world = SimplePhysics::new();
        let light = world.spawn_sphere(Vec3::new(5.0, 10.0, 0.0), 0.25, CategoryMask::ENTITY);
        let heavy = world.spawn_sphere(Vec3::new(-5.0, 10.0, 0.0), 0.25, CategoryMask::ENTITY);
        world.set_gravity_scale(heavy, 2.0);
        assert_eq!(world.gravity_scale(light), 1.0);
        assert_eq!(world.gravity_scale(heavy), 2.0);

        world.step(0.1);
        let vy_light = world.velocity(light).y;
        let vy_heavy = world.velocity(heavy).y;
        assert!((vy_heavy - 2.0 * vy_light).abs() < 1e-5);
    }

    #[test]
    fn test_rigid_body_on_demand_and_impulse() {
        let (mut world, id) = world_with_platform();
        assert!(!world.has_rigid_body(id));
        world.apply_impulse(id, Vec3::X); // no body yet: ignored
        world.add_rigid_body(id);
        world.apply_impulse(id, Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(world.velocity(id), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_despawn_twice() {
        let (mut world, id) = world_with_platform();
        assert!(world.despawn(id));
        assert!(!world.despawn(id));
        assert!(!world.exists(id));
    }
}
