//! Contact probing and the bounce arc
//!
//! The fixed tick probes below the falling entity and dispatches on what it
//! finds. The frame tick animates the bounce: a kinematic ease-out rise with
//! gravity off, a scale restore, a short settle, then gravity back on.
//!
//! While the session is over or power mode is active the machine is
//! suspended: no probing and no new bounces. A bounce already in flight
//! still plays out.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::breaker::PlatformBreakResolver;
use super::control::TowerControl;
use super::level::{SegmentRef, Tower};
use super::physics::{BodyId, CategoryMask, PhysicsProxy};
use super::power::InvulnerabilityWindow;
use super::ring::{RingId, RingKind, SegmentKind};
use super::score::StreakScoreEngine;
use super::session::GameSession;
use super::task::{TaskHandle, TaskQueue, Timer, Tween};
use crate::consts::ENTITY_RADIUS;
use crate::tuning::{BounceTuning, FinishTuning};
use crate::ease_out_quad;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BouncePhase {
    /// Eased climb with gravity off
    Rising,
    /// Scale easing back to rest
    Restoring,
    /// Short pause before gravity returns
    Settling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BounceState {
    Idle,
    Bouncing(BouncePhase),
    /// Probing paused by game over or power mode
    Suspended,
}

/// Delayed work raised by contacts, run by the owner of the tower
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// Remove a touched finish surface
    RemoveSurface { ring: RingId, body: BodyId },
    /// End the run successfully after reaching the finish
    FinishRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    Impact,
    PowerPickup,
    /// Full-screen flash when a troll ball latches on
    Flash,
}

/// Transient visual effect; expires on its own
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Effect {
    pub kind: EffectKind,
    pub position: Vec3,
}

/// A classified probe hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub body: BodyId,
    pub point: Vec3,
    pub segment: SegmentRef,
}

/// Collaborators a probe may act on
pub struct BounceContext<'a> {
    pub physics: &'a mut dyn PhysicsProxy,
    pub tower: &'a mut Tower,
    pub breaker: &'a mut PlatformBreakResolver,
    pub score: &'a mut StreakScoreEngine,
    pub session: &'a mut GameSession,
    pub power: &'a InvulnerabilityWindow,
    pub control: &'a mut TowerControl,
    pub deferred: &'a mut TaskQueue<Deferred>,
}

#[derive(Debug, Clone)]
struct Flight {
    rise: Tween<f32>,
    squash: Option<Tween<Vec3>>,
    restore: Option<Tween<Vec3>>,
    settle: Timer,
    phase: BouncePhase,
}

#[derive(Debug)]
pub struct BounceStateMachine {
    tuning: BounceTuning,
    finish: FinishTuning,
    entity: BodyId,
    flight: Option<Flight>,
    suspended: bool,
    /// Fixed-tick seconds since the last bounce started
    since_bounce: f32,
    /// Fixed-tick seconds since the last probe
    since_probe: f32,
    scale: Vec3,
    finish_reached: bool,
    effects: TaskQueue<Effect>,
}

impl BounceStateMachine {
    pub fn new(tuning: BounceTuning, finish: FinishTuning, entity: BodyId) -> Self {
        let since_bounce = tuning.cooldown;
        let since_probe = tuning.raycast_interval;
        Self {
            tuning,
            finish,
            entity,
            flight: None,
            suspended: false,
            since_bounce,
            since_probe,
            scale: Vec3::ONE,
            finish_reached: false,
            effects: TaskQueue::new(),
        }
    }

    pub fn entity(&self) -> BodyId {
        self.entity
    }

    pub fn state(&self) -> BounceState {
        match &self.flight {
            Some(flight) => BounceState::Bouncing(flight.phase),
            None if self.suspended => BounceState::Suspended,
            None => BounceState::Idle,
        }
    }

    #[inline]
    pub fn is_bouncing(&self) -> bool {
        self.flight.is_some()
    }

    /// Visual scale of the entity (squash and stretch)
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn effects(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    pub fn spawn_effect(&mut self, kind: EffectKind, position: Vec3) -> Option<TaskHandle> {
        if !self.tuning.vfx_enabled {
            return None;
        }
        Some(self.effects.schedule(
            self.tuning.vfx_lifetime,
            Effect {
                kind,
                position: position + self.tuning.vfx_offset,
            },
        ))
    }

    /// Screen flash; shown even with VFX turned off
    pub fn flash(&mut self, duration: f32, position: Vec3) -> TaskHandle {
        self.effects.schedule(
            duration,
            Effect {
                kind: EffectKind::Flash,
                position,
            },
        )
    }

    /// Probe and dispatch; at most one contact is acted on per call
    pub fn fixed_tick(&mut self, dt: f32, ctx: &mut BounceContext) -> Option<Contact> {
        self.since_bounce += dt;
        self.since_probe += dt;

        self.suspended = ctx.session.is_over() || ctx.power.is_active();
        if self.suspended || self.flight.is_some() {
            return None;
        }
        if self.since_bounce < self.tuning.cooldown
            || self.since_probe < self.tuning.raycast_interval
        {
            return None;
        }
        self.since_probe = 0.0;

        let contact = self.probe(ctx.physics, ctx.tower)?;
        self.dispatch(contact, ctx);
        Some(contact)
    }

    /// First origin with a hit on a tower segment wins
    fn probe(&self, physics: &dyn PhysicsProxy, tower: &Tower) -> Option<Contact> {
        let position = physics.position(self.entity)?;
        let bottom = position - Vec3::Y * ENTITY_RADIUS;
        self.tuning.probe_offsets.iter().find_map(|offset| {
            let hit = physics.raycast_down(
                bottom + *offset,
                self.tuning.ray_distance,
                CategoryMask::PLATFORM,
            )?;
            let segment = tower.locate(hit.body)?;
            Some(Contact {
                body: hit.body,
                point: hit.point,
                segment,
            })
        })
    }

    fn dispatch(&mut self, contact: Contact, ctx: &mut BounceContext) {
        let ring_id = contact.segment.ring;
        match contact.segment.kind {
            SegmentKind::Normal => {
                self.break_ring(ring_id, ctx);
                self.begin_bounce(contact.point, ctx.physics);
            }
            SegmentKind::Gear => {
                self.break_ring(ring_id, ctx);
                ctx.score.reset_streak();
                self.begin_bounce(contact.point, ctx.physics);
            }
            SegmentKind::Hazard => {
                log::info!("Hazard hit on ring {}", ring_id);
                ctx.session.game_over(0, true, ctx.control);
                self.suspended = true;
            }
            SegmentKind::FinishLine => {
                let removal = Deferred::RemoveSurface {
                    ring: ring_id,
                    body: contact.body,
                };
                if !ctx.deferred.iter().any(|d| *d == removal) {
                    ctx.deferred.schedule(self.finish.removal_delay, removal);
                }
                if !self.finish_reached {
                    if let Some(delay) = self.finish.game_over_delay {
                        ctx.deferred.schedule(delay, Deferred::FinishRun);
                    }
                }
                self.finish_reached = true;
            }
            SegmentKind::BonusMultiplier => {
                let factor = match ctx.tower.ring(ring_id).map(|r| r.kind) {
                    Some(RingKind::Bonus { factor }) => factor,
                    _ => 1,
                };
                let bonus = ctx.score.add_bonus(factor as f32);
                log::debug!("Bonus x{} on ring {}: +{}", factor, ring_id, bonus);
                ctx.session.game_over(ctx.score.score(), false, ctx.control);
                self.suspended = true;
            }
        }
    }

    fn break_ring(&mut self, ring_id: RingId, ctx: &mut BounceContext) {
        let yaw = ctx.tower.yaw;
        if let Some(ring) = ctx.tower.ring_mut(ring_id) {
            ctx.breaker.break_ring(ring, yaw, ctx.physics, ctx.score);
        }
    }

    /// Start the arc; rejected while one is already in flight
    pub fn begin_bounce(&mut self, contact: Vec3, physics: &mut dyn PhysicsProxy) -> bool {
        if self.flight.is_some() {
            return false;
        }
        let Some(position) = physics.position(self.entity) else {
            return false;
        };
        let t = &self.tuning;
        physics.set_gravity(self.entity, false);
        physics.set_velocity(self.entity, Vec3::ZERO);

        let squash = t.squash_enabled.then(|| {
            Tween::new(
                Vec3::ONE,
                Vec3::new(t.squash_xz, t.stretch_y, t.squash_xz),
                t.squash_duration,
                ease_out_quad,
            )
        });
        self.flight = Some(Flight {
            rise: Tween::new(
                position.y,
                position.y + t.bounce_height,
                t.bounce_duration,
                ease_out_quad,
            ),
            squash,
            restore: None,
            settle: Timer::new(t.settle_buffer),
            phase: BouncePhase::Rising,
        });
        self.since_bounce = 0.0;
        self.spawn_effect(EffectKind::Impact, contact);
        true
    }

    /// Advance the arc and effects on the presentation clock
    pub fn frame_tick(&mut self, dt: f32, physics: &mut dyn PhysicsProxy) {
        self.effects.advance(dt);

        let Some(flight) = self.flight.as_mut() else {
            return;
        };
        let entity = self.entity;
        match flight.phase {
            BouncePhase::Rising => {
                let y = flight.rise.advance(dt);
                if let Some(position) = physics.position(entity) {
                    physics.set_position(entity, Vec3::new(position.x, y, position.z));
                }
                physics.set_velocity(entity, Vec3::ZERO);
                if let Some(squash) = flight.squash.as_mut() {
                    self.scale = squash.advance(dt);
                }
                if flight.rise.is_finished() {
                    flight.restore = self.tuning.squash_enabled.then(|| {
                        Tween::new(
                            self.scale,
                            Vec3::ONE,
                            self.tuning.squash_duration,
                            ease_out_quad,
                        )
                    });
                    flight.phase = BouncePhase::Restoring;
                }
            }
            BouncePhase::Restoring => {
                physics.set_velocity(entity, Vec3::ZERO);
                match flight.restore.as_mut() {
                    Some(restore) => {
                        self.scale = restore.advance(dt);
                        if restore.is_finished() {
                            flight.phase = BouncePhase::Settling;
                        }
                    }
                    None => flight.phase = BouncePhase::Settling,
                }
            }
            BouncePhase::Settling => {
                physics.set_velocity(entity, Vec3::ZERO);
                if flight.settle.advance(dt) {
                    self.land(physics);
                }
            }
        }
    }

    fn land(&mut self, physics: &mut dyn PhysicsProxy) {
        self.flight = None;
        self.scale = Vec3::ONE;
        physics.set_gravity(self.entity, true);
    }

    /// Drop any in-flight arc and effects, leaving the entity at rest
    pub fn cancel(&mut self, physics: &mut dyn PhysicsProxy) {
        if self.flight.is_some() {
            log::debug!("Bounce cancelled");
        }
        self.flight = None;
        self.scale = Vec3::ONE;
        self.effects.cancel_all();
        physics.set_gravity(self.entity, true);
        physics.set_velocity(self.entity, Vec3::ZERO);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::physics::SimplePhysics;
    use crate::sim::ring::{PlatformRing, ring_arcs};
    use crate::tuning::{BreakTuning, ControlTuning, PowerTuning, ScoreTuning};

    struct Rig {
        physics: SimplePhysics,
        tower: Tower,
        breaker: PlatformBreakResolver,
        score: StreakScoreEngine,
        session: GameSession,
        power: InvulnerabilityWindow,
        control: TowerControl,
        deferred: TaskQueue<Deferred>,
        bounce: BounceStateMachine,
    }

    impl Rig {
        /// One full ring of `kind` at y = 0, entity resting on it
        fn new(kind: RingKind) -> Self {
            let mut physics = SimplePhysics::new();
            let mut tower = Tower::new("Level1", 1, Vec3::new(1.2, 0.35, 0.4));
            let ring = PlatformRing::new(0, kind, Vec3::ZERO, ring_arcs(4, 0.6, 2.0, 0.0)).unwrap();
            tower.push_ring(ring);
            tower.spawn_colliders(&mut physics);
            let entity = physics.spawn_sphere(
                Vec3::new(1.2, 0.1 + ENTITY_RADIUS, 0.4),
                ENTITY_RADIUS,
                CategoryMask::ENTITY,
            );
            Self {
                physics,
                tower,
                breaker: PlatformBreakResolver::new(BreakTuning::default()),
                score: StreakScoreEngine::new(ScoreTuning::default()),
                session: GameSession::new("Level1"),
                power: InvulnerabilityWindow::new(&PowerTuning::default()),
                control: TowerControl::new(ControlTuning::default()),
                deferred: TaskQueue::new(),
                bounce: BounceStateMachine::new(
                    BounceTuning::default(),
                    FinishTuning::default(),
                    entity,
                ),
            }
        }

        fn tick(&mut self) -> Option<Contact> {
            let mut ctx = BounceContext {
                physics: &mut self.physics,
                tower: &mut self.tower,
                breaker: &mut self.breaker,
                score: &mut self.score,
                session: &mut self.session,
                power: &self.power,
                control: &mut self.control,
                deferred: &mut self.deferred,
            };
            self.bounce.fixed_tick(0.02, &mut ctx)
        }

        fn entity(&self) -> BodyId {
            self.bounce.entity()
        }
    }

    #[test]
    fn test_normal_contact_breaks_and_bounces() {
        let mut rig = Rig::new(RingKind::Helix);
        let contact = rig.tick().unwrap();
        assert_eq!(contact.segment.kind, SegmentKind::Normal);
        assert!(rig.tower.rings()[0].is_broken());
        assert_eq!(rig.score.streak(), 1);
        assert_eq!(rig.bounce.state(), BounceState::Bouncing(BouncePhase::Rising));
        assert!(!rig.physics.gravity_enabled(rig.entity()));
        assert_eq!(rig.bounce.effects().count(), 1);
    }

    #[test]
    fn test_gear_contact_resets_streak() {
        let mut rig = Rig::new(RingKind::Gear { spin_speed: 1.0 });
        rig.score.add_break();
        rig.score.add_break();
        rig.tick().unwrap();
        assert!(rig.tower.rings()[0].is_broken());
        assert_eq!(rig.score.streak(), 0);
        assert_eq!(rig.score.multiplier(), 1.0);
        // Points from the gear break are kept
        assert!(rig.score.score() > 3);
        assert!(rig.bounce.is_bouncing());
    }

    #[test]
    fn test_hazard_ends_run_with_zero() {
        let mut rig = Rig::new(RingKind::Helix);
        let mut rng = <rand_pcg::Pcg32 as rand::SeedableRng>::seed_from_u64(1);
        rig.tower.ring_mut(0).unwrap().assign_deadly(&mut rng, 4, true);
        rig.score.add_break();

        let contact = rig.tick().unwrap();
        assert_eq!(contact.segment.kind, SegmentKind::Hazard);
        assert!(rig.session.is_over());
        assert_eq!(rig.session.state().final_score, Some(0));
        assert!(!rig.bounce.is_bouncing());
        assert!(!rig.control.is_enabled());

        // Suspended from now on
        for _ in 0..10 {
            assert!(rig.tick().is_none());
        }
        assert_eq!(rig.bounce.state(), BounceState::Suspended);
    }

    /// Hazards on every segment but one; returns (safe, hazard) ray offsets
    fn split_offsets(rig: &mut Rig) -> (Vec3, Vec3) {
        let mut rng = <rand_pcg::Pcg32 as rand::SeedableRng>::seed_from_u64(7);
        let ring = rig.tower.ring_mut(0).unwrap();
        ring.assign_deadly(&mut rng, 3, false);
        let offset_to = |kind: SegmentKind| {
            let index = ring.segments().iter().position(|s| s.kind == kind).unwrap();
            let centroid = ring.segment_pose(index as u16, 0.0).unwrap().centroid();
            let bottom = Vec3::new(1.2, 0.0, 0.4);
            Vec3::new(centroid.x, 0.0, centroid.z) - bottom
        };
        (offset_to(SegmentKind::Normal), offset_to(SegmentKind::Hazard))
    }

    fn with_offsets(rig: &mut Rig, probe_offsets: Vec<Vec3>) {
        let tuning = BounceTuning {
            probe_offsets,
            ..BounceTuning::default()
        };
        rig.bounce = BounceStateMachine::new(tuning, FinishTuning::default(), rig.entity());
    }

    #[test]
    fn test_first_ray_origin_wins() {
        let mut rig = Rig::new(RingKind::Helix);
        let (safe, hazard) = split_offsets(&mut rig);
        with_offsets(&mut rig, vec![safe, hazard]);

        let contact = rig.tick().unwrap();
        assert_eq!(contact.segment.kind, SegmentKind::Normal);
        assert!(!rig.session.is_over());
        assert!(rig.bounce.is_bouncing());
    }

    #[test]
    fn test_first_ray_origin_wins_even_when_deadly() {
        let mut rig = Rig::new(RingKind::Helix);
        let (safe, hazard) = split_offsets(&mut rig);
        with_offsets(&mut rig, vec![hazard, safe]);

        let contact = rig.tick().unwrap();
        assert_eq!(contact.segment.kind, SegmentKind::Hazard);
        assert!(rig.session.is_over());
        assert!(!rig.tower.rings()[0].is_broken());
    }

    #[test]
    fn test_restore_eases_out() {
        let mut rig = Rig::new(RingKind::Helix);
        rig.tick().unwrap();
        // Rise (0.25 s) ends squashed at full strength
        rig.bounce.frame_tick(0.25, &mut rig.physics);
        assert_eq!(rig.bounce.state(), BounceState::Bouncing(BouncePhase::Restoring));
        // Halfway through the 0.08 s restore an ease-out curve is 75% of the way back
        rig.bounce.frame_tick(0.04, &mut rig.physics);
        let scale = rig.bounce.scale();
        assert!((scale.x - 1.025).abs() < 1e-4, "x = {}", scale.x);
        assert!((scale.y - 0.975).abs() < 1e-4, "y = {}", scale.y);
    }

    #[test]
    fn test_flash_is_cancelled_with_effects() {
        let mut rig = Rig::new(RingKind::Helix);
        rig.bounce.flash(1.0, Vec3::ZERO);
        assert!(rig.bounce.effects().any(|e| e.kind == EffectKind::Flash));
        rig.bounce.frame_tick(0.5, &mut rig.physics);
        assert!(rig.bounce.effects().any(|e| e.kind == EffectKind::Flash));
        rig.bounce.cancel(&mut rig.physics);
        assert_eq!(rig.bounce.effects().count(), 0);
    }

    #[test]
    fn test_power_mode_suspends_probing() {
        let mut rig = Rig::new(RingKind::Helix);
        let entity = rig.entity();
        rig.power.start(&mut rig.physics, entity);
        assert!(rig.tick().is_none());
        assert!(!rig.tower.rings()[0].is_broken());
        assert_eq!(rig.bounce.state(), BounceState::Suspended);
    }

    #[test]
    fn test_bonus_adds_and_ends_run() {
        let mut rig = Rig::new(RingKind::Bonus { factor: 2 });
        for _ in 0..4 {
            rig.score.add_break();
        }
        let before = rig.score.state().clone();
        rig.tick().unwrap();
        assert_eq!(rig.score.score(), before.score * 3);
        assert_eq!(rig.score.streak(), before.streak);
        assert!(!rig.bounce.is_bouncing());
        assert_eq!(rig.session.state().final_score, Some(before.score * 3));
        assert!(!rig.session.state().failed);
    }

    #[test]
    fn test_finish_schedules_single_removal() {
        let mut rig = Rig::new(RingKind::Finish);
        rig.tick().unwrap();
        for _ in 0..5 {
            rig.tick();
        }
        assert_eq!(rig.deferred.len(), 1);
        assert!(!rig.bounce.is_bouncing());
        assert!(!rig.session.is_over());
    }

    #[test]
    fn test_probe_throttled() {
        let mut rig = Rig::new(RingKind::Finish);
        assert!(rig.tick().is_some());
        // 0.02 < raycast interval 0.03
        assert!(rig.tick().is_none());
        assert!(rig.tick().is_some());
    }

    #[test]
    fn test_arc_runs_to_completion() {
        let mut rig = Rig::new(RingKind::Helix);
        let start_y = rig.physics.position(rig.entity()).unwrap().y;
        rig.tick().unwrap();

        // Second request while in flight is rejected
        assert!(!rig.bounce.begin_bounce(Vec3::ZERO, &mut rig.physics));

        for _ in 0..100 {
            rig.bounce.frame_tick(0.01, &mut rig.physics);
        }
        let y = rig.physics.position(rig.entity()).unwrap().y;
        assert!((y - (start_y + 1.5)).abs() < 1e-4);
        assert_eq!(rig.bounce.state(), BounceState::Idle);
        assert_eq!(rig.bounce.scale(), Vec3::ONE);
        assert!(rig.physics.gravity_enabled(rig.entity()));
    }

    #[test]
    fn test_squash_during_rise() {
        let mut rig = Rig::new(RingKind::Helix);
        rig.tick().unwrap();
        rig.bounce.frame_tick(0.08, &mut rig.physics);
        let scale = rig.bounce.scale();
        assert!((scale.x - 1.1).abs() < 1e-5);
        assert!((scale.y - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_cancel_restores_gravity() {
        let mut rig = Rig::new(RingKind::Helix);
        rig.tick().unwrap();
        rig.bounce.frame_tick(0.05, &mut rig.physics);
        rig.bounce.cancel(&mut rig.physics);
        assert!(rig.physics.gravity_enabled(rig.entity()));
        assert_eq!(rig.physics.velocity(rig.entity()), Vec3::ZERO);
        assert_eq!(rig.bounce.scale(), Vec3::ONE);
        assert_eq!(rig.bounce.effects().count(), 0);
        assert_eq!(rig.bounce.state(), BounceState::Idle);
    }
}
