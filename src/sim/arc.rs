//! Annular-sector geometry for ring segments
//!
//! A segment occupies a slice of its ring in the ring's local horizontal
//! plane:
//! - radius: centreline distance from the ring axis
//! - thickness: radial extent (inner = radius - thickness/2, outer = radius + thickness/2)
//! - theta_start, theta_end: angular extent, counter-clockwise from start to end

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{normalize_angle, planar_to_polar, polar_to_planar};

/// A thickened arc in the ring's local plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcSegment {
    /// Centerline radius from the ring axis
    pub radius: f32,
    /// Radial thickness (extends radius ± thickness/2)
    pub thickness: f32,
    /// Start angle (radians, normalized to [-π, π))
    pub theta_start: f32,
    /// End angle (radians, normalized to [-π, π))
    pub theta_end: f32,
}

impl ArcSegment {
    pub fn new(radius: f32, thickness: f32, theta_start: f32, theta_end: f32) -> Self {
        Self {
            radius,
            thickness,
            theta_start: normalize_angle(theta_start),
            theta_end: normalize_angle(theta_end),
        }
    }

    /// Build from inner/outer radii instead of centreline + thickness
    pub fn from_band(inner: f32, outer: f32, theta_start: f32, theta_end: f32) -> Self {
        Self::new((inner + outer) / 2.0, outer - inner, theta_start, theta_end)
    }

    #[inline]
    pub fn inner_radius(&self) -> f32 {
        self.radius - self.thickness / 2.0
    }

    #[inline]
    pub fn outer_radius(&self) -> f32 {
        self.radius + self.thickness / 2.0
    }

    /// Angular span of the arc (handles wraparound)
    pub fn angular_span(&self) -> f32 {
        let mut span = self.theta_end - self.theta_start;
        if span < 0.0 {
            span += std::f32::consts::TAU;
        }
        span
    }

    /// Check if an angle is within the arc's angular extent
    pub fn contains_angle(&self, theta: f32) -> bool {
        let theta = normalize_angle(theta);
        let start = self.theta_start;
        let end = self.theta_end;

        if start <= end {
            theta >= start && theta <= end
        } else {
            // Wraparound case (e.g., start=170°, end=-170°)
            theta >= start || theta <= end
        }
    }

    /// Check if a local offset (height ignored) lies over the sector
    pub fn contains_planar(&self, offset: Vec3) -> bool {
        let (r, theta) = planar_to_polar(offset);
        r >= self.inner_radius() && r <= self.outer_radius() && self.contains_angle(theta)
    }

    /// Mid-band, mid-angle point as a local offset (y = 0)
    pub fn centroid(&self) -> Vec3 {
        let mid_theta = self.theta_start + self.angular_span() / 2.0;
        polar_to_planar(self.radius, mid_theta)
    }
}
