//! Presentation notifications
//!
//! Emitters (score engine, session) own an [`Observers`] registry. The
//! registry only holds weak references, so an observer that is dropped is
//! unregistered with it; explicit [`Observers::unsubscribe`] is also
//! available for observers that outlive the core.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// What the UI layer listens to
pub trait Presentation {
    /// Score or multiplier changed
    fn on_score_changed(&self, _score: u64, _multiplier: u32) {}
    /// Run ended; `failed` is false for a successful finish
    fn on_game_over(&self, _score: u64, _failed: bool) {}
}

/// Subscription handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u32);

/// Observer registry owned by an emitting component
#[derive(Default)]
pub struct Observers {
    entries: Vec<(ObserverId, Weak<dyn Presentation>)>,
    next_id: u32,
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<T: Presentation + 'static>(&mut self, observer: &Rc<T>) -> ObserverId {
        self.next_id += 1;
        let id = ObserverId(self.next_id);
        let weak: Weak<T> = Rc::downgrade(observer);
        self.entries.push((id, weak as Weak<dyn Presentation>));
        id
    }

    /// Returns false when the id was not registered (already removed)
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Deliver to every live observer in subscription order, pruning dropped ones
    pub fn emit(&mut self, deliver: impl Fn(&dyn Presentation)) {
        self.entries.retain(|(_, weak)| match weak.upgrade() {
            Some(observer) => {
                deliver(observer.as_ref());
                true
            }
            None => false,
        });
    }

    /// Live observers
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A notification as delivered to presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    ScoreChanged { score: u64, multiplier: u32 },
    GameOver { score: u64, failed: bool },
}

/// Presentation observer that keeps every notification, for logging and tests
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: RefCell<Vec<GameEvent>>,
}

impl EventRecorder {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn events(&self) -> Vec<GameEvent> {
        self.events.borrow().clone()
    }

    pub fn drain(&self) -> Vec<GameEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    pub fn game_overs(&self) -> Vec<(u64, bool)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match *e {
                GameEvent::GameOver { score, failed } => Some((score, failed)),
                _ => None,
            })
            .collect()
    }

    pub fn last_score(&self) -> Option<(u64, u32)> {
        self.events.borrow().iter().rev().find_map(|e| match *e {
            GameEvent::ScoreChanged { score, multiplier } => Some((score, multiplier)),
            _ => None,
        })
    }
}

impl Presentation for EventRecorder {
    fn on_score_changed(&self, score: u64, multiplier: u32) {
        self.events
            .borrow_mut()
            .push(GameEvent::ScoreChanged { score, multiplier });
    }

    fn on_game_over(&self, score: u64, failed: bool) {
        self.events
            .borrow_mut()
            .push(GameEvent::GameOver { score, failed });
    }
}
