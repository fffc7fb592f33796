//! Composition root
//!
//! [`Game`] owns every gameplay component and the physics world, and wires
//! them together on each tick. Nothing in the core is reachable globally;
//! components only see the collaborators handed to them here.

use std::rc::Rc;

use glam::Vec3;

use super::bounce::{BounceContext, BounceStateMachine, Contact, Deferred, EffectKind};
use super::breaker::PlatformBreakResolver;
use super::control::{DragInput, TowerControl};
use super::events::{ObserverId, Presentation};
use super::level::{Tower, generate_level};
use super::physics::{BodyId, CategoryMask, PhysicsProxy};
use super::power::{InvulnerabilityWindow, PowerEnd};
use super::score::StreakScoreEngine;
use super::session::{GameSession, MAIN_MENU, SceneCommand, SceneQueue};
use super::task::TaskQueue;
use crate::consts::*;
use crate::tuning::Tuning;

/// Observer ids for both emitters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub score: ObserverId,
    pub session: ObserverId,
}

pub struct Game<P: PhysicsProxy> {
    tuning: Tuning,
    physics: P,
    tower: Tower,
    entity: BodyId,
    breaker: PlatformBreakResolver,
    score: StreakScoreEngine,
    power: InvulnerabilityWindow,
    bounce: BounceStateMachine,
    control: TowerControl,
    session: GameSession,
    deferred: TaskQueue<Deferred>,
    /// Simulation speed; power mode ignores it
    time_scale: f32,
    accumulator: f32,
    quit_requested: bool,
}

impl<P: PhysicsProxy> Game<P> {
    pub fn new(tuning: Tuning, mut physics: P, level: &str) -> Self {
        let (tower, entity) = build_scene(level, &tuning, &mut physics);
        Self {
            breaker: PlatformBreakResolver::new(tuning.breaks.clone()),
            score: StreakScoreEngine::new(tuning.score.clone()),
            power: InvulnerabilityWindow::new(&tuning.power),
            bounce: BounceStateMachine::new(tuning.bounce.clone(), tuning.finish.clone(), entity),
            control: TowerControl::new(tuning.control.clone()),
            session: GameSession::new(level),
            deferred: TaskQueue::new(),
            time_scale: 1.0,
            accumulator: 0.0,
            quit_requested: false,
            tuning,
            physics,
            tower,
            entity,
        }
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    pub fn tower(&self) -> &Tower {
        &self.tower
    }

    pub fn tower_mut(&mut self) -> &mut Tower {
        &mut self.tower
    }

    pub fn entity(&self) -> BodyId {
        self.entity
    }

    pub fn entity_position(&self) -> Option<Vec3> {
        self.physics.position(self.entity)
    }

    pub fn score(&self) -> &StreakScoreEngine {
        &self.score
    }

    pub fn power(&self) -> &InvulnerabilityWindow {
        &self.power
    }

    pub fn bounce(&self) -> &BounceStateMachine {
        &self.bounce
    }

    pub fn breaker(&self) -> &PlatformBreakResolver {
        &self.breaker
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn control(&self) -> &TowerControl {
        &self.control
    }

    pub fn deferred(&self) -> &TaskQueue<Deferred> {
        &self.deferred
    }

    pub fn is_over(&self) -> bool {
        self.session.is_over()
    }

    pub fn in_menu(&self) -> bool {
        self.session.level() == MAIN_MENU
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Slow down or pause the simulation (0 pauses)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn subscribe<T: Presentation + 'static>(&mut self, observer: &Rc<T>) -> Subscription {
        Subscription {
            score: self.score.subscribe(observer),
            session: self.session.subscribe(observer),
        }
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) {
        self.score.unsubscribe(subscription.score);
        self.session.unsubscribe(subscription.session);
    }

    /// Start power mode directly (pickups do this on contact)
    pub fn start_power(&mut self) {
        self.power.start(&mut self.physics, self.entity);
    }

    /// End the run from outside the core (e.g. a quit button mid-run)
    pub fn game_over(&mut self, failed: bool) -> bool {
        self.session
            .game_over(self.score.score(), failed, &mut self.control)
    }

    /// One wall-clock frame: fixed steps on scaled time, then the frame tick
    ///
    /// Returns the number of fixed steps taken.
    pub fn advance(&mut self, frame_dt: f32, input: DragInput) -> u32 {
        // Only the simulation is clamped; power mode counts every wall-clock second
        let real_dt = frame_dt.max(0.0);
        let dt = real_dt.min(MAX_FRAME_DT) * self.time_scale;

        self.accumulator += dt;
        let mut steps = 0;
        while self.accumulator >= SIM_DT && steps < MAX_SUBSTEPS {
            self.fixed_update(SIM_DT);
            self.accumulator -= SIM_DT;
            steps += 1;
        }
        if steps == MAX_SUBSTEPS {
            self.accumulator = 0.0;
        }

        self.frame_update(dt, real_dt, input);
        steps
    }

    /// Simulation tick: physics, triggers, pass-through breaks, then the probe
    pub fn fixed_update(&mut self, dt: f32) -> Option<Contact> {
        if self.in_menu() {
            return None;
        }
        self.tower.sync_physics(&mut self.physics);
        self.physics.step(dt);

        let position = self.physics.position(self.entity)?;
        if !self.session.is_over() {
            self.check_triggers(position);
            self.break_passed_rings(position.y);
        }

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
        self.bounce.fixed_tick(dt, &mut ctx)
    }

    /// Presentation tick: `dt` is scaled time, `real_dt` is wall-clock time
    pub fn frame_update(&mut self, dt: f32, real_dt: f32, input: DragInput) {
        if self.in_menu() {
            return;
        }
        if let Some(end) = self.power.tick(real_dt, &mut self.physics, self.entity) {
            log::debug!("Power mode ended: {:?}", end);
        }

        self.bounce.frame_tick(dt, &mut self.physics);
        self.breaker.debris_mut().advance(dt, &mut self.physics);
        self.move_trolls(dt);

        for action in self.deferred.advance(dt) {
            self.run_deferred(action);
        }

        let yaw = self.control.update(input, dt);
        if yaw != 0.0 {
            self.tower.rotate(yaw);
        }
        self.tower.spin_gears(dt);
    }

    fn check_triggers(&mut self, position: Vec3) {
        for id in self.tower.collect_pickups(position, ENTITY_RADIUS) {
            log::debug!("Power pickup {} collected", id);
            self.power.start(&mut self.physics, self.entity);
            self.bounce.spawn_effect(EffectKind::PowerPickup, position);
        }
        let caught = self.tower.catch_trolls(position, ENTITY_RADIUS);
        if !caught.is_empty() {
            log::debug!("Troll ball {:?} attached at y={:.2}", caught, position.y);
            let scale = self.tuning.troll.heavy_gravity / GRAVITY;
            self.physics.set_gravity_scale(self.entity, scale);
            self.bounce.flash(self.tuning.troll.flash_duration, position);
        }
        if self.power.is_active() && self.tower.in_cancel_zone(position) {
            if let Some(PowerEnd::Cancelled) = self.power.cancel(&mut self.physics, self.entity) {
                log::debug!("Power mode cancelled at y={:.2}", position.y);
            }
        }
    }

    fn move_trolls(&mut self, dt: f32) {
        let anchor = self
            .tower
            .has_attached_troll()
            .then(|| self.physics.position(self.entity))
            .flatten()
            .map(|p| p + self.tuning.troll.attach_offset);
        self.tower
            .move_trolls(dt, self.tuning.troll.rise_speed, anchor);
    }

    /// Release every attached troll ball and restore normal weight
    pub fn detach_trolls(&mut self) {
        if self.tower.detach_trolls() > 0 {
            log::debug!("Troll balls detached");
        }
        self.physics.set_gravity_scale(self.entity, 1.0);
    }

    /// Falling past a ring counts as breaking it
    fn break_passed_rings(&mut self, y: f32) {
        let yaw = self.tower.yaw;
        for id in self.tower.rings_above(y) {
            if let Some(ring) = self.tower.ring_mut(id) {
                self.breaker
                    .break_ring(ring, yaw, &mut self.physics, &mut self.score);
            }
        }
    }

    fn run_deferred(&mut self, action: Deferred) {
        match action {
            Deferred::RemoveSurface { ring, body } => {
                if !self.physics.despawn(body) {
                    log::trace!("Finish surface {} already removed", body);
                }
                if let Some(ring) = self.tower.ring_mut(ring) {
                    ring.release_body(body);
                }
            }
            Deferred::FinishRun => {
                self.session
                    .game_over(self.score.score(), false, &mut self.control);
            }
        }
    }

    /// Cancel everything in flight and leave the entity at rest with gravity on
    pub fn teardown(&mut self) {
        self.bounce.cancel(&mut self.physics);
        for action in self.deferred.cancel_all() {
            log::trace!("Cancelled {:?}", action);
        }
        self.breaker.debris_mut().clear(&mut self.physics);
        self.power.cancel(&mut self.physics, self.entity);
        self.detach_trolls();
        self.physics.set_gravity(self.entity, true);
        self.physics.set_velocity(self.entity, Vec3::ZERO);
        self.accumulator = 0.0;
    }

    /// Reload the current level
    pub fn restart(&mut self) {
        let mut host = SceneQueue::default();
        self.session.restart(&mut host);
        self.apply_scene(host);
    }

    /// Load the following level (or the menu after the last one)
    pub fn next_level(&mut self) {
        let mut host = SceneQueue::default();
        self.session.next_level(&mut host);
        self.apply_scene(host);
    }

    pub fn quit(&mut self) {
        let mut host = SceneQueue::default();
        self.session.quit(&mut host);
        self.apply_scene(host);
    }

    fn apply_scene(&mut self, host: SceneQueue) {
        for command in host.commands {
            match command {
                SceneCommand::Unload => self.unload(),
                SceneCommand::Load(name) => self.load(&name),
                SceneCommand::Quit => {
                    log::info!("Quit requested");
                    self.quit_requested = true;
                }
            }
        }
    }

    fn unload(&mut self) {
        self.teardown();
        self.tower.despawn(&mut self.physics);
        if !self.physics.despawn(self.entity) {
            log::trace!("Entity {} already gone", self.entity);
        }
    }

    fn load(&mut self, level: &str) {
        let (tower, entity) = build_scene(level, &self.tuning, &mut self.physics);
        self.tower = tower;
        self.entity = entity;
        self.power = InvulnerabilityWindow::new(&self.tuning.power);
        self.bounce = BounceStateMachine::new(
            self.tuning.bounce.clone(),
            self.tuning.finish.clone(),
            entity,
        );
        self.control = TowerControl::new(self.tuning.control.clone());
        self.score.reset_session();
        log::info!("Loaded {}", level);
    }
}

/// Tower plus falling entity for a level; the menu gets an empty tower
fn build_scene(level: &str, tuning: &Tuning, physics: &mut dyn PhysicsProxy) -> (Tower, BodyId) {
    let mut tower = if level == MAIN_MENU {
        Tower::new(MAIN_MENU, 0, Vec3::ZERO)
    } else {
        generate_level(level, &tuning.level)
    };
    tower.spawn_colliders(physics);
    let entity = physics.spawn_sphere(tower.spawn_point, ENTITY_RADIUS, CategoryMask::ENTITY);
    (tower, entity)
}
