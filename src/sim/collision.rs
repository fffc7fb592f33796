//! Contact queries against ring geometry
//!
//! Segments are thin horizontal slabs shaped like annular sectors, posed by
//! a body position (ring centre) and a yaw about the vertical axis. The
//! falling entity only ever asks two questions of them: "what is directly
//! below me" and "did I just land on top of one".

use glam::Vec3;

use super::arc::ArcSegment;
use crate::rotate_yaw;

/// Slack for origins sitting exactly on a surface
pub const SURFACE_EPSILON: f32 = 1e-3;

/// Result of a downward query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownHit {
    /// Contact point in world space
    pub point: Vec3,
    /// Distance travelled along the ray
    pub distance: f32,
}

/// Pose of a sector collider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorPose {
    /// Ring centre (world)
    pub origin: Vec3,
    /// Rotation about +Y (radians)
    pub yaw: f32,
    pub arc: ArcSegment,
    /// Half of the slab's vertical thickness
    pub half_height: f32,
}

impl SectorPose {
    /// Top surface height
    #[inline]
    pub fn top(&self) -> f32 {
        self.origin.y + self.half_height
    }

    /// Whether a world point sits over (or under) the sector
    pub fn covers(&self, point: Vec3) -> bool {
        let local = rotate_yaw(point - self.origin, -self.yaw);
        self.arc.contains_planar(local)
    }

    /// World-space centroid of the sector's top face
    pub fn centroid(&self) -> Vec3 {
        self.origin + rotate_yaw(self.arc.centroid(), self.yaw) + Vec3::Y * self.half_height
    }
}

/// Cast a ray straight down against a sector slab
///
/// Rays that start inside or below the slab miss, like a physics engine's
/// raycast ignoring the collider it starts in.
pub fn ray_down_sector(origin: Vec3, max_distance: f32, sector: &SectorPose) -> Option<DownHit> {
    let top = sector.top();
    let distance = origin.y - top;
    if distance < -SURFACE_EPSILON || distance > max_distance {
        return None;
    }
    if !sector.covers(origin) {
        return None;
    }
    Some(DownHit {
        point: Vec3::new(origin.x, top, origin.z),
        distance: distance.max(0.0),
    })
}

/// Cast a ray straight down against a sphere
pub fn ray_down_sphere(
    origin: Vec3,
    max_distance: f32,
    center: Vec3,
    radius: f32,
) -> Option<DownHit> {
    let dx = origin.x - center.x;
    let dz = origin.z - center.z;
    let planar_sq = dx * dx + dz * dz;
    if planar_sq > radius * radius {
        return None;
    }
    let cap = (radius * radius - planar_sq).sqrt();
    let top = center.y + cap;
    let distance = origin.y - top;
    if distance < -SURFACE_EPSILON || distance > max_distance {
        return None;
    }
    Some(DownHit {
        point: Vec3::new(origin.x, top, origin.z),
        distance: distance.max(0.0),
    })
}

/// Detect a falling sphere crossing the top of a sector during one step
///
/// Returns the resting centre height when the sphere's bottom went from
/// above the top face to below it while over the sector.
pub fn sphere_lands_on_sector(
    prev_center: Vec3,
    new_center: Vec3,
    radius: f32,
    sector: &SectorPose,
) -> Option<f32> {
    let top = sector.top();
    let prev_bottom = prev_center.y - radius;
    let new_bottom = new_center.y - radius;
    if prev_bottom + SURFACE_EPSILON < top || new_bottom > top {
        return None;
    }
    if !sector.covers(new_center) {
        return None;
    }
    Some(top + radius)
}

/// Whether two spheres overlap
#[inline]
pub fn spheres_overlap(a: Vec3, ra: f32, b: Vec3, rb: f32) -> bool {
    a.distance_squared(b) <= (ra + rb) * (ra + rb)
}
