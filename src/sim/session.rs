//! Session lifecycle: the single terminal transition and scene requests

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::control::TowerControl;
use super::events::{ObserverId, Observers, Presentation};
use super::level::level_number;

/// Level played after the last one
pub const MAIN_MENU: &str = "MainMenu";
/// Number of playable levels
pub const LEVEL_COUNT: u32 = 3;

/// Scene management provided by the host application
pub trait SceneHost {
    fn load_level(&mut self, name: &str);
    fn unload_current(&mut self);
    fn quit(&mut self);
}

/// A recorded scene request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneCommand {
    Load(String),
    Unload,
    Quit,
}

/// Host that queues requests for the owner to apply later
#[derive(Debug, Default)]
pub struct SceneQueue {
    pub commands: Vec<SceneCommand>,
}

impl SceneHost for SceneQueue {
    fn load_level(&mut self, name: &str) {
        self.commands.push(SceneCommand::Load(name.to_string()));
    }

    fn unload_current(&mut self) {
        self.commands.push(SceneCommand::Unload);
    }

    fn quit(&mut self) {
        self.commands.push(SceneCommand::Quit);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub game_over: bool,
    pub final_score: Option<u64>,
    /// Ended by a hazard rather than by reaching the bottom
    pub failed: bool,
}

#[derive(Debug)]
pub struct GameSession {
    level: String,
    state: SessionState,
    observers: Observers,
}

/// Level after `current`; past the last level goes back to the menu
pub fn next_level_name(current: &str) -> String {
    if !current.starts_with("Level") {
        return "Level1".to_string();
    }
    let next = level_number(current) + 1;
    if next > LEVEL_COUNT {
        MAIN_MENU.to_string()
    } else {
        format!("Level{}", next)
    }
}

impl GameSession {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            state: SessionState::default(),
            observers: Observers::new(),
        }
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.state.game_over
    }

    pub fn subscribe<T: Presentation + 'static>(&mut self, observer: &Rc<T>) -> ObserverId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// End the run; only the first call has any effect
    pub fn game_over(&mut self, score: u64, failed: bool, control: &mut TowerControl) -> bool {
        if self.state.game_over {
            log::trace!("Game over already raised, ignoring");
            return false;
        }
        control.disable();
        self.state = SessionState {
            game_over: true,
            final_score: Some(score),
            failed,
        };
        log::info!(
            "{} over: score={} ({})",
            self.level,
            score,
            if failed { "failed" } else { "cleared" }
        );
        self.observers.emit(|o| o.on_game_over(score, failed));
        true
    }

    /// Reload the current level
    pub fn restart(&mut self, host: &mut dyn SceneHost) {
        host.unload_current();
        host.load_level(&self.level);
        self.state = SessionState::default();
    }

    /// Move on to the following level
    pub fn next_level(&mut self, host: &mut dyn SceneHost) {
        let next = next_level_name(&self.level);
        host.unload_current();
        host.load_level(&next);
        self.level = next;
        self.state = SessionState::default();
    }

    pub fn quit(&mut self, host: &mut dyn SceneHost) {
        host.quit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::events::EventRecorder;
    use crate::tuning::ControlTuning;

    #[test]
    fn test_game_over_is_idempotent() {
        let mut session = GameSession::new("Level1");
        let mut control = TowerControl::new(ControlTuning::default());
        let rec = EventRecorder::new();
        session.subscribe(&rec);

        assert!(session.game_over(0, true, &mut control));
        assert!(!control.is_enabled());
        assert!(!session.game_over(42, false, &mut control));

        assert_eq!(rec.game_overs(), vec![(0, true)]);
        assert_eq!(session.state().final_score, Some(0));
        assert!(session.state().failed);
    }

    #[test]
    fn test_next_level_names() {
        assert_eq!(next_level_name("Level1"), "Level2");
        assert_eq!(next_level_name("Level3"), MAIN_MENU);
        assert_eq!(next_level_name("Credits"), "Level1");
    }

    #[test]
    fn test_restart_requests_reload() {
        let mut session = GameSession::new("Level2");
        let mut control = TowerControl::new(ControlTuning::default());
        session.game_over(5, false, &mut control);

        let mut host = SceneQueue::default();
        session.restart(&mut host);
        assert_eq!(
            host.commands,
            vec![SceneCommand::Unload, SceneCommand::Load("Level2".into())]
        );
        assert!(!session.is_over());
    }

    #[test]
    fn test_next_level_and_quit() {
        let mut session = GameSession::new("Level3");
        let mut host = SceneQueue::default();
        session.next_level(&mut host);
        assert_eq!(session.level(), MAIN_MENU);
        session.quit(&mut host);
        assert_eq!(host.commands.last(), Some(&SceneCommand::Quit));
    }
}
