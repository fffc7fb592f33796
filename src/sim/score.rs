//! Streak scoring
//!
//! Consecutive breaks grow a multiplier (capped); a long enough streak
//! lights fire mode, which sticks until the streak is reset.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::events::{ObserverId, Observers, Presentation};
use crate::tuning::ScoreTuning;

/// Score, streak, multiplier and fire mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreState {
    pub score: u64,
    pub streak: u32,
    /// Always within [1, cap]
    pub multiplier: f32,
    pub fire_mode: bool,
}

impl Default for ScoreState {
    fn default() -> Self {
        Self {
            score: 0,
            streak: 0,
            multiplier: 1.0,
            fire_mode: false,
        }
    }
}

/// Sole writer of [`ScoreState`]
#[derive(Debug)]
pub struct StreakScoreEngine {
    tuning: ScoreTuning,
    state: ScoreState,
    observers: Observers,
}

/// Multiplier reached after `streak` consecutive breaks
pub fn multiplier_for_streak(streak: u32, step: f32, cap: f32) -> f32 {
    let raw = 1.0 + streak.saturating_sub(1) as f32 * step;
    raw.min(cap).max(1.0)
}

/// Round half up (all scoring values are non-negative)
#[inline]
fn round_points(value: f64) -> u64 {
    value.max(0.0).round() as u64
}

impl StreakScoreEngine {
    pub fn new(tuning: ScoreTuning) -> Self {
        Self {
            tuning,
            state: ScoreState::default(),
            observers: Observers::new(),
        }
    }

    pub fn state(&self) -> &ScoreState {
        &self.state
    }

    pub fn score(&self) -> u64 {
        self.state.score
    }

    pub fn streak(&self) -> u32 {
        self.state.streak
    }

    pub fn multiplier(&self) -> f32 {
        self.state.multiplier
    }

    pub fn is_fire_mode(&self) -> bool {
        self.state.fire_mode
    }

    pub fn subscribe<T: Presentation + 'static>(&mut self, observer: &Rc<T>) -> ObserverId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// One ring broken: grow the streak and bank points at the new multiplier
    pub fn add_break(&mut self) -> u64 {
        let t = &self.tuning;
        let s = &mut self.state;

        s.streak += 1;
        s.multiplier = multiplier_for_streak(s.streak, t.multiplier_step, t.cap_multiplier);
        let points = round_points(t.base_points as f64 * s.multiplier as f64);
        s.score += points;

        if s.streak >= t.fire_mode_threshold && !s.fire_mode {
            s.fire_mode = true;
            log::debug!("Fire mode at streak {}", s.streak);
        }

        self.notify();
        points
    }

    /// Bonus ring: add `factor` times the current score; streak untouched
    pub fn add_bonus(&mut self, factor: f32) -> u64 {
        let bonus = round_points(self.state.score as f64 * factor as f64);
        self.state.score += bonus;
        self.notify();
        bonus
    }

    /// Streak back to zero, multiplier to 1, fire mode off
    pub fn reset_streak(&mut self) {
        self.state.streak = 0;
        self.state.multiplier = 1.0;
        self.state.fire_mode = false;
    }

    /// Fresh session: score too
    pub fn reset_session(&mut self) {
        self.state = ScoreState::default();
        self.notify();
    }

    fn notify(&mut self) {
        let score = self.state.score;
        let multiplier = self.state.multiplier.round() as u32;
        self.observers
            .emit(|o| o.on_score_changed(score, multiplier));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::events::EventRecorder;
    use proptest::prelude::*;

    fn engine() -> StreakScoreEngine {
        StreakScoreEngine::new(ScoreTuning::default())
    }

    #[test]
    fn test_first_breaks_follow_closed_form() {
        let mut e = engine();
        assert_eq!(e.add_break(), 1); // x1
        assert_eq!(e.score(), 1);
        assert_eq!(e.add_break(), 2); // x1.5 rounds up
        assert_eq!(e.score(), 3);
        assert_eq!(e.add_break(), 2); // x2
        assert_eq!(e.score(), 5);
        assert_eq!(e.add_break(), 3); // x2.5 rounds up
        assert_eq!(e.score(), 8);
    }

    #[test]
    fn test_multiplier_caps() {
        let mut e = engine();
        for _ in 0..20 {
            e.add_break();
        }
        assert_eq!(e.multiplier(), 5.0);
        assert_eq!(e.add_break(), 5);
    }

    #[test]
    fn test_fire_mode_sticks_past_cap() {
        let mut e = engine();
        for _ in 0..4 {
            e.add_break();
        }
        assert!(!e.is_fire_mode());
        e.add_break();
        assert!(e.is_fire_mode());
        e.add_break();
        assert!(e.is_fire_mode());
    }

    #[test]
    fn test_reset_streak_keeps_score() {
        let mut e = engine();
        for _ in 0..6 {
            e.add_break();
        }
        let score = e.score();
        e.reset_streak();
        assert_eq!(e.streak(), 0);
        assert_eq!(e.multiplier(), 1.0);
        assert!(!e.is_fire_mode());
        assert_eq!(e.score(), score);
    }

    #[test]
    fn test_bonus_scales_score() {
        let mut e = engine();
        e.add_break();
        e.add_break();
        e.state.score = 10;
        let before = e.state().clone();
        assert_eq!(e.add_bonus(2.0), 20);
        assert_eq!(e.score(), 30);
        assert_eq!(e.streak(), before.streak);
        assert_eq!(e.multiplier(), before.multiplier);
        assert_eq!(e.is_fire_mode(), before.fire_mode);
    }

    #[test]
    fn test_notifies_rounded_multiplier() {
        let mut e = engine();
        let rec = EventRecorder::new();
        e.subscribe(&rec);
        e.add_break();
        e.add_break();
        assert_eq!(rec.last_score(), Some((3, 2)));
    }

    proptest! {
        #[test]
        fn prop_multiplier_matches_closed_form(k in 1u32..64) {
            let mut e = engine();
            for _ in 0..k {
                e.add_break();
            }
            let expected = (1.0 + (k - 1) as f32 * 0.5).min(5.0);
            prop_assert_eq!(e.multiplier(), expected);
            prop_assert_eq!(e.is_fire_mode(), k >= 5);
        }

        #[test]
        fn prop_score_never_decreases(ops in proptest::collection::vec(0u8..3, 0..30)) {
            let mut e = engine();
            let mut last = 0;
            for op in ops {
                match op {
                    0 => { e.add_break(); }
                    1 => { e.add_bonus(2.0); }
                    _ => e.reset_streak(),
                }
                prop_assert!(e.score() >= last);
                prop_assert!(e.multiplier() >= 1.0 && e.multiplier() <= 5.0);
                last = e.score();
            }
        }
    }
}
