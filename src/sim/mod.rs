//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep for probing and physics, frame time for animation
//! - Seeded RNG only
//! - Stable iteration order (by ring and body id)
//! - No rendering or platform dependencies

pub mod arc;
pub mod bounce;
pub mod breaker;
pub mod collision;
pub mod control;
pub mod events;
pub mod game;
pub mod level;
pub mod physics;
pub mod power;
pub mod ring;
pub mod score;
pub mod session;
pub mod task;

pub use arc::ArcSegment;
pub use bounce::{BouncePhase, BounceState, BounceStateMachine, Contact, Deferred, Effect, EffectKind};
pub use breaker::{DebrisRegistry, PlatformBreakResolver, kick_vector};
pub use collision::{DownHit, SectorPose};
pub use control::{DragInput, TowerControl};
pub use events::{EventRecorder, GameEvent, ObserverId, Observers, Presentation};
pub use game::{Game, Subscription};
pub use level::{
    CancelZone, PowerPickup, SegmentRef, Tower, TrollBall, generate_level, level_name,
};
pub use physics::{BodyId, CategoryMask, PhysicsProxy, RayHit, SimplePhysics};
pub use power::{InvulnerabilityState, InvulnerabilityWindow, PowerEnd};
pub use ring::{BreakState, PlatformRing, RingId, RingKind, Segment, SegmentKind, ring_arcs};
pub use score::{ScoreState, StreakScoreEngine, multiplier_for_streak};
pub use session::{GameSession, SceneCommand, SceneHost, SceneQueue, SessionState, next_level_name};
pub use task::{TaskHandle, TaskQueue, Timer, Tween};
