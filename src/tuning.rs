//! Data-driven game balance
//!
//! Every knob the simulation reads lives here. Loaded from JSON; any field
//! left out of the file keeps its default.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TuningError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid tuning: {0}")]
    Invalid(String),
}

/// Bounce choreography knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BounceTuning {
    /// Max downward probe distance
    pub ray_distance: f32,
    pub bounce_height: f32,
    /// Seconds for the rise
    pub bounce_duration: f32,
    pub squash_enabled: bool,
    pub squash_xz: f32,
    pub stretch_y: f32,
    pub squash_duration: f32,
    /// Minimum seconds between the start of two bounces
    pub cooldown: f32,
    /// Minimum seconds between two probes
    pub raycast_interval: f32,
    /// Pause after the rise before gravity comes back
    pub settle_buffer: f32,
    pub vfx_enabled: bool,
    pub vfx_offset: Vec3,
    pub vfx_lifetime: f32,
    /// Probe origins relative to the entity, in priority order
    pub probe_offsets: Vec<Vec3>,
}

impl Default for BounceTuning {
    fn default() -> Self {
        Self {
            ray_distance: 0.2,
            bounce_height: 1.5,
            bounce_duration: 0.25,
            squash_enabled: true,
            squash_xz: 1.1,
            stretch_y: 0.9,
            squash_duration: 0.08,
            cooldown: 0.05,
            raycast_interval: 0.03,
            settle_buffer: 0.03,
            vfx_enabled: true,
            vfx_offset: Vec3::ZERO,
            vfx_lifetime: 2.0,
            probe_offsets: vec![Vec3::ZERO],
        }
    }
}

/// Ring break knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakTuning {
    /// Outward push away from the ring centre
    pub kick_force: f32,
    pub upward_force: f32,
    /// Seconds before debris despawns
    pub debris_lifetime: f32,
    /// Strip the collider from debris so it can't be probed again
    pub remove_collider: bool,
}

impl Default for BreakTuning {
    fn default() -> Self {
        Self {
            kick_force: 6.0,
            upward_force: 2.0,
            debris_lifetime: 2.0,
            remove_collider: true,
        }
    }
}

/// Streak scoring knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreTuning {
    pub base_points: u32,
    pub multiplier_step: f32,
    pub cap_multiplier: f32,
    pub fire_mode_threshold: u32,
}

impl Default for ScoreTuning {
    fn default() -> Self {
        Self {
            base_points: 1,
            multiplier_step: 0.5,
            cap_multiplier: 5.0,
            fire_mode_threshold: 5,
        }
    }
}

/// Power mode knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerTuning {
    /// Real-time seconds (unaffected by time scale)
    pub duration: f32,
}

impl Default for PowerTuning {
    fn default() -> Self {
        Self { duration: 2.0 }
    }
}

/// Tower rotation knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlTuning {
    /// Degrees per second per unit of horizontal drag
    pub rotation_speed: f32,
    /// Seconds for release inertia to die out
    pub inertia_duration: f32,
}

impl Default for ControlTuning {
    fn default() -> Self {
        Self {
            rotation_speed: 150.0,
            inertia_duration: 0.25,
        }
    }
}

/// Finish ring knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinishTuning {
    /// Seconds before a touched finish surface is removed
    pub removal_delay: f32,
    /// When set, the run ends successfully this many seconds after touching the finish
    pub game_over_delay: Option<f32>,
}

impl Default for FinishTuning {
    fn default() -> Self {
        Self {
            removal_delay: 1.0,
            game_over_delay: None,
        }
    }
}

/// Rising troll ball knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrollTuning {
    /// Units per second, on the scaled clock
    pub rise_speed: f32,
    /// Where an attached troll rides relative to the entity
    pub attach_offset: Vec3,
    /// Gravity pulling on the entity while a troll is attached (units/s²)
    pub heavy_gravity: f32,
    /// Seconds the screen flash lasts after contact
    pub flash_duration: f32,
}

impl Default for TrollTuning {
    fn default() -> Self {
        Self {
            rise_speed: 1.5,
            attach_offset: Vec3::new(0.5, 0.0, 0.5),
            heavy_gravity: 20.0,
            flash_duration: 1.0,
        }
    }
}

/// Procedural level knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelTuning {
    /// Breakable rings above the finish ring
    pub ring_count: u32,
    /// Vertical distance between rings
    pub ring_spacing: f32,
    pub segments_per_ring: u32,
    /// Missing segments per ring (the hole to fall through)
    pub gap_segments: u32,
    /// Deadly segments per ring, from the second ring on
    pub deadly_count: u32,
    /// Allow every segment to be deadly
    pub allow_all_deadly: bool,
    /// Every Nth ring is a gear ring (0 = never)
    pub gear_every: u32,
    /// Degrees per second
    pub gear_spin_speed: f32,
    /// One bonus ring per factor, below the finish ring
    pub bonus_factors: Vec<u32>,
    /// Ring indices that get a power pickup above them
    pub power_pickup_rings: Vec<u32>,
    /// Ring indices that release a troll ball from below
    pub troll_rings: Vec<u32>,
    pub seed: u64,
}

impl Default for LevelTuning {
    fn default() -> Self {
        Self {
            ring_count: 12,
            ring_spacing: 3.0,
            segments_per_ring: 8,
            gap_segments: 1,
            deadly_count: 2,
            allow_all_deadly: false,
            gear_every: 4,
            gear_spin_speed: 180.0,
            bonus_factors: vec![2, 3, 4, 5],
            power_pickup_rings: vec![5],
            troll_rings: vec![8],
            seed: 0x5EED,
        }
    }
}

/// Complete balance sheet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub bounce: BounceTuning,
    pub breaks: BreakTuning,
    pub score: ScoreTuning,
    pub power: PowerTuning,
    pub control: ControlTuning,
    pub finish: FinishTuning,
    pub troll: TrollTuning,
    pub level: LevelTuning,
}

impl Tuning {
    /// Parse and validate a JSON balance sheet
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Self = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self, TuningError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load from a JSON file, falling back to defaults on any failure
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(tuning) => {
                log::info!("Loaded tuning from {}", path.display());
                tuning
            }
            Err(e) => {
                log::warn!("Using default tuning ({}: {})", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> Result<String, TuningError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the simulation can't honour
    pub fn validate(&self) -> Result<(), TuningError> {
        let invalid = |msg: &str| Err(TuningError::Invalid(msg.to_string()));

        if self.score.cap_multiplier < 1.0 {
            return invalid("score.cap_multiplier must be >= 1");
        }
        if self.score.multiplier_step < 0.0 {
            return invalid("score.multiplier_step must be >= 0");
        }
        let durations = [
            self.bounce.bounce_duration,
            self.bounce.squash_duration,
            self.bounce.cooldown,
            self.bounce.raycast_interval,
            self.bounce.settle_buffer,
            self.bounce.vfx_lifetime,
            self.breaks.debris_lifetime,
            self.power.duration,
            self.control.inertia_duration,
            self.finish.removal_delay,
            self.troll.flash_duration,
        ];
        if durations.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return invalid("durations must be finite and >= 0");
        }
        if self.bounce.ray_distance <= 0.0 {
            return invalid("bounce.ray_distance must be > 0");
        }
        if !self.troll.rise_speed.is_finite() || self.troll.rise_speed < 0.0 {
            return invalid("troll.rise_speed must be finite and >= 0");
        }
        if !self.troll.heavy_gravity.is_finite() || self.troll.heavy_gravity <= 0.0 {
            return invalid("troll.heavy_gravity must be > 0");
        }
        if self.bounce.probe_offsets.is_empty() {
            return invalid("bounce.probe_offsets needs at least one origin");
        }
        let level = &self.level;
        if level.segments_per_ring == 0 {
            return invalid("level.segments_per_ring must be >= 1");
        }
        if level.gap_segments >= level.segments_per_ring {
            return invalid("level.gap_segments must leave at least one segment");
        }
        let solid = level.segments_per_ring - level.gap_segments;
        if level.deadly_count > solid || (level.deadly_count == solid && !level.allow_all_deadly)
        {
            return invalid("level.deadly_count must leave a safe segment");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Tuning::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let tuning = Tuning::from_json(r#"{ "score": { "base_points": 3 } }"#).unwrap();
        assert_eq!(tuning.score.base_points, 3);
        assert_eq!(tuning.score.fire_mode_threshold, 5);
        assert!((tuning.bounce.bounce_height - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_json_roundtrip() {
        let json = Tuning::default().to_json().unwrap();
        let back = Tuning::from_json(&json).unwrap();
        assert_eq!(back.level.bonus_factors, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_rejects_cap_below_one() {
        let err = Tuning::from_json(r#"{ "score": { "cap_multiplier": 0.5 } }"#).unwrap_err();
        assert!(matches!(err, TuningError::Invalid(_)));
    }

    #[test]
    fn test_rejects_all_deadly_unless_allowed() {
        let json = r#"{ "level": { "segments_per_ring": 4, "gap_segments": 1, "deadly_count": 3 } }"#;
        assert!(Tuning::from_json(json).is_err());

        let json = r#"{ "level": { "segments_per_ring": 4, "gap_segments": 1, "deadly_count": 3, "allow_all_deadly": true } }"#;
        assert!(Tuning::from_json(json).is_ok());
    }

    #[test]
    fn test_rejects_weightless_troll() {
        let err = Tuning::from_json(r#"{ "troll": { "heavy_gravity": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, TuningError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(matches!(
            Tuning::from_json("{ not json"),
            Err(TuningError::Parse(_))
        ));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let tuning = Tuning::load_or_default(Path::new("/nonexistent/helix_tuning.json"));
        assert_eq!(tuning.score.base_points, 1);
    }
}
