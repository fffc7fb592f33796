//! Platform rings and their segments
//!
//! A ring is an ordered set of segments around the tower axis. Breaking a
//! ring detaches every segment: the ring hands each one over as a
//! [`DetachedSegment`] and keeps only its bookkeeping.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::arc::ArcSegment;
use super::collision::SectorPose;
use super::physics::{BodyId, CategoryMask, PhysicsProxy};
use crate::normalize_angle;

/// Half of a segment slab's vertical thickness
pub const SEGMENT_HALF_HEIGHT: f32 = 0.1;

pub type RingId = u32;

/// Interaction category of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Breakable platform; landing breaks the ring and bounces
    Normal,
    /// Deadly surface; ends the run with nothing banked
    Hazard,
    /// Breakable obstacle that also resets the streak
    Gear,
    /// Bonus ring multiplying the banked score
    BonusMultiplier,
    /// Finish surface, removed shortly after touching it
    FinishLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakState {
    Intact,
    Detached,
}

/// What the ring is as a whole
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RingKind {
    Helix,
    /// Spins on its own at `spin_speed` rad/s
    Gear { spin_speed: f32 },
    Bonus { factor: u32 },
    Finish,
}

impl RingKind {
    /// Category given to every segment of a freshly built ring
    pub fn segment_kind(&self) -> SegmentKind {
        match self {
            RingKind::Helix => SegmentKind::Normal,
            RingKind::Gear { .. } => SegmentKind::Gear,
            RingKind::Bonus { .. } => SegmentKind::BonusMultiplier,
            RingKind::Finish => SegmentKind::FinishLine,
        }
    }

    /// Bonus and finish rings can't be broken
    pub fn is_breakable(&self) -> bool {
        matches!(self, RingKind::Helix | RingKind::Gear { .. })
    }
}

/// One piece of a ring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Position within the ring
    pub index: u16,
    /// Owning ring (back-reference only)
    pub ring: RingId,
    pub kind: SegmentKind,
    /// Shape in the ring's local frame
    pub arc: ArcSegment,
    /// Physics body, if one has been spawned
    pub body: Option<BodyId>,
    pub state: BreakState,
}

/// A segment handed over by its ring on break
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetachedSegment {
    pub ring: RingId,
    pub index: u16,
    pub kind: SegmentKind,
    pub body: Option<BodyId>,
    /// Pose at the moment of detachment
    pub pose: SectorPose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRing {
    pub id: RingId,
    pub kind: RingKind,
    /// Centre of the ring on the tower axis
    pub center: Vec3,
    /// Own rotation on top of the tower's (gears)
    pub spin: f32,
    segments: Vec<Segment>,
    broken: bool,
}

impl PlatformRing {
    /// Build a ring from segment arcs; `None` when there are no arcs
    pub fn new(id: RingId, kind: RingKind, center: Vec3, arcs: Vec<ArcSegment>) -> Option<Self> {
        if arcs.is_empty() {
            return None;
        }
        let segment_kind = kind.segment_kind();
        let segments = arcs
            .into_iter()
            .enumerate()
            .map(|(i, arc)| Segment {
                index: i as u16,
                ring: id,
                kind: segment_kind,
                arc,
                body: None,
                state: BreakState::Intact,
            })
            .collect();
        Some(Self {
            id,
            kind,
            center,
            spin: 0.0,
            segments,
            broken: false,
        })
    }

    /// Relabel `count` distinct segments as hazards
    ///
    /// At least one segment stays safe unless `allow_all` is set. Returns the
    /// chosen indices in ascending order.
    pub fn assign_deadly<R: Rng>(&mut self, rng: &mut R, count: usize, allow_all: bool) -> Vec<u16> {
        let n = self.segments.len();
        let limit = if allow_all { n } else { n.saturating_sub(1) };
        let count = count.min(limit);
        if count == 0 {
            return Vec::new();
        }
        let mut picked: Vec<u16> = rand::seq::index::sample(rng, n, count)
            .into_iter()
            .map(|i| i as u16)
            .collect();
        picked.sort_unstable();
        for &i in &picked {
            self.segments[i as usize].kind = SegmentKind::Hazard;
        }
        picked
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, index: u16) -> Option<&Segment> {
        self.segments.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[inline]
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn is_breakable(&self) -> bool {
        self.kind.is_breakable()
    }

    pub fn deadly_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| s.kind == SegmentKind::Hazard)
            .count()
    }

    /// Ring rotation in world space
    pub fn world_yaw(&self, tower_yaw: f32) -> f32 {
        normalize_angle(tower_yaw + self.spin)
    }

    /// Pose of a segment, computed from the ring rather than the physics world
    pub fn segment_pose(&self, index: u16, tower_yaw: f32) -> Option<SectorPose> {
        let seg = self.segment(index)?;
        Some(SectorPose {
            origin: self.center,
            yaw: self.world_yaw(tower_yaw),
            arc: seg.arc,
            half_height: SEGMENT_HALF_HEIGHT,
        })
    }

    /// Index of the segment owning `body`
    pub fn find_body(&self, body: BodyId) -> Option<u16> {
        self.segments
            .iter()
            .find(|s| s.body == Some(body))
            .map(|s| s.index)
    }

    /// Create collider bodies for every intact segment that has none
    pub fn spawn_colliders(&mut self, physics: &mut dyn PhysicsProxy, tower_yaw: f32) {
        let yaw = self.world_yaw(tower_yaw);
        for seg in &mut self.segments {
            if seg.state == BreakState::Intact && seg.body.is_none() {
                seg.body = Some(physics.spawn_sector(
                    self.center,
                    yaw,
                    seg.arc,
                    SEGMENT_HALF_HEIGHT,
                    CategoryMask::PLATFORM,
                ));
            }
        }
    }

    /// Push the current rotation to intact segment bodies
    pub fn sync_physics(&self, physics: &mut dyn PhysicsProxy, tower_yaw: f32) {
        let yaw = self.world_yaw(tower_yaw);
        for seg in &self.segments {
            if let (BreakState::Intact, Some(body)) = (seg.state, seg.body) {
                physics.set_yaw(body, yaw);
            }
        }
    }

    /// Flip the broken flag; false when it was already set
    pub(crate) fn mark_broken(&mut self) -> bool {
        !std::mem::replace(&mut self.broken, true)
    }

    /// Hand a segment over to the caller; `None` if already detached
    pub(crate) fn detach(&mut self, index: u16, tower_yaw: f32) -> Option<DetachedSegment> {
        let pose = self.segment_pose(index, tower_yaw)?;
        let seg = self.segments.get_mut(index as usize)?;
        if seg.state == BreakState::Detached {
            return None;
        }
        seg.state = BreakState::Detached;
        Some(DetachedSegment {
            ring: seg.ring,
            index: seg.index,
            kind: seg.kind,
            body: seg.body.take(),
            pose,
        })
    }

    /// Forget a body that was removed from the world (finish surfaces)
    pub(crate) fn release_body(&mut self, body: BodyId) -> Option<u16> {
        let seg = self.segments.iter_mut().find(|s| s.body == Some(body))?;
        seg.body = None;
        seg.state = BreakState::Detached;
        Some(seg.index)
    }
}

/// Evenly split a full turn into `count` arcs between `inner` and `outer`
pub fn ring_arcs(count: u32, inner: f32, outer: f32, phase: f32) -> Vec<ArcSegment> {
    let count = count.max(1);
    let span = std::f32::consts::TAU / count as f32;
    (0..count)
        .map(|i| {
            let start = phase + i as f32 * span;
            // A single arc can't span the full turn without collapsing to zero width
            let end = if count == 1 {
                start + span - 1e-4
            } else {
                start + span
            };
            ArcSegment::from_band(inner, outer, start, end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::physics::SimplePhysics;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn helix(n: u32) -> PlatformRing {
        PlatformRing::new(1, RingKind::Helix, Vec3::ZERO, ring_arcs(n, 0.6, 2.0, 0.0)).unwrap()
    }

    #[test]
    fn test_empty_ring_rejected() {
        assert!(PlatformRing::new(1, RingKind::Helix, Vec3::ZERO, Vec::new()).is_none());
    }

    #[test]
    fn test_kind_flows_to_segments() {
        let ring =
            PlatformRing::new(2, RingKind::Bonus { factor: 3 }, Vec3::ZERO, ring_arcs(4, 0.6, 2.0, 0.0))
                .unwrap();
        assert!(ring.segments().iter().all(|s| s.kind == SegmentKind::BonusMultiplier));
        assert!(ring.segments().iter().all(|s| s.ring == 2));
        assert!(!ring.is_breakable());
    }

    #[test]
    fn test_deadly_is_proper_subset() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut ring = helix(3);
        let picked = ring.assign_deadly(&mut rng, 10, false);
        assert_eq!(picked.len(), 2);
        assert_eq!(ring.deadly_count(), 2);

        let mut ring = helix(3);
        let picked = ring.assign_deadly(&mut rng, 10, true);
        assert_eq!(picked.len(), 3);
    }

    #[test]
    fn test_deadly_picks_distinct() {
        let mut rng = Pcg32::seed_from_u64(99);
        let mut ring = helix(8);
        let picked = ring.assign_deadly(&mut rng, 2, false);
        assert_eq!(picked.len(), 2);
        assert_ne!(picked[0], picked[1]);
    }

    #[test]
    fn test_mark_broken_once() {
        let mut ring = helix(4);
        assert!(ring.mark_broken());
        assert!(!ring.mark_broken());
        assert!(ring.is_broken());
    }

    #[test]
    fn test_detach_transfers_body_once() {
        let mut physics = SimplePhysics::new();
        let mut ring = helix(4);
        ring.spawn_colliders(&mut physics, 0.0);
        let body = ring.segment(1).unwrap().body;
        assert!(body.is_some());

        let detached = ring.detach(1, 0.0).unwrap();
        assert_eq!(detached.body, body);
        assert_eq!(ring.segment(1).unwrap().state, BreakState::Detached);
        assert!(ring.segment(1).unwrap().body.is_none());
        assert!(ring.detach(1, 0.0).is_none());
    }

    #[test]
    fn test_ring_arcs_cover_turn() {
        let arcs = ring_arcs(8, 0.6, 2.0, 0.0);
        let total: f32 = arcs.iter().map(|a| a.angular_span()).sum();
        assert!((total - std::f32::consts::TAU).abs() < 1e-3);
    }
}
