//! Cooperative timed tasks
//!
//! Anything that "waits" in gameplay (the bounce arc, delayed removals,
//! debris and effect lifetimes, the power-mode countdown) is a resumable
//! value advanced by the tick loop. Nothing blocks; teardown cancels every
//! pending task through its handle.

use glam::Vec3;

/// Handle used to cancel a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u32);

/// Countdown measured in seconds of whatever clock advances it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timer {
    pub duration: f32,
    pub elapsed: f32,
}

impl Timer {
    pub fn new(duration: f32) -> Self {
        Self {
            duration: duration.max(0.0),
            elapsed: 0.0,
        }
    }

    /// Advance and report whether the timer has run out
    pub fn advance(&mut self, dt: f32) -> bool {
        self.elapsed = (self.elapsed + dt.max(0.0)).min(self.duration);
        self.is_finished()
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// 0..=1; zero-length timers are always complete
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    pub fn remaining(&self) -> f32 {
        (self.duration - self.elapsed).max(0.0)
    }
}

/// Linear interpolation for tweened values
pub trait Lerp: Copy {
    fn lerp_to(self, to: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp_to(self, to: Self, t: f32) -> Self {
        self + (to - self) * t
    }
}

impl Lerp for Vec3 {
    fn lerp_to(self, to: Self, t: f32) -> Self {
        self.lerp(to, t)
    }
}

/// A value eased from `from` to `to` over a timer
#[derive(Debug, Clone, Copy)]
pub struct Tween<T: Lerp> {
    pub from: T,
    pub to: T,
    pub timer: Timer,
    pub ease: fn(f32) -> f32,
}

impl<T: Lerp> Tween<T> {
    pub fn new(from: T, to: T, duration: f32, ease: fn(f32) -> f32) -> Self {
        Self {
            from,
            to,
            timer: Timer::new(duration),
            ease,
        }
    }

    /// Advance and return the current value
    pub fn advance(&mut self, dt: f32) -> T {
        self.timer.advance(dt);
        self.value()
    }

    pub fn value(&self) -> T {
        self.from.lerp_to(self.to, (self.ease)(self.timer.progress()))
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.timer.is_finished()
    }
}

#[derive(Debug, Clone)]
struct Pending<A> {
    handle: TaskHandle,
    timer: Timer,
    action: A,
}

/// Delayed actions, fired in scheduling order once their delay elapses
#[derive(Debug, Clone)]
pub struct TaskQueue<A> {
    pending: Vec<Pending<A>>,
    next_handle: u32,
}

impl<A> Default for TaskQueue<A> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            next_handle: 1,
        }
    }
}

impl<A> TaskQueue<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, delay: f32, action: A) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push(Pending {
            handle,
            timer: Timer::new(delay),
            action,
        });
        handle
    }

    /// Advance every task; returns the actions whose delay ran out
    pub fn advance(&mut self, dt: f32) -> Vec<A> {
        let mut fired = Vec::new();
        let mut kept = Vec::with_capacity(self.pending.len());
        for mut task in self.pending.drain(..) {
            if task.timer.advance(dt) {
                fired.push(task.action);
            } else {
                kept.push(task);
            }
        }
        self.pending = kept;
        fired
    }

    /// Drop a task before it fires; returns its action if it was still pending
    pub fn cancel(&mut self, handle: TaskHandle) -> Option<A> {
        let idx = self.pending.iter().position(|t| t.handle == handle)?;
        Some(self.pending.remove(idx).action)
    }

    /// Drop everything, handing back the unfired actions for cleanup
    pub fn cancel_all(&mut self) -> Vec<A> {
        self.pending.drain(..).map(|t| t.action).collect()
    }

    pub fn contains(&self, handle: TaskHandle) -> bool {
        self.pending.iter().any(|t| t.handle == handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &A> {
        self.pending.iter().map(|t| &t.action)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ease_out_quad;

    #[test]
    fn test_timer_progress() {
        let mut t = Timer::new(1.0);
        assert!(!t.advance(0.25));
        assert!((t.progress() - 0.25).abs() < 1e-6);
        assert!(t.advance(1.0));
        assert_eq!(t.progress(), 1.0);
        assert_eq!(t.remaining(), 0.0);
    }

    #[test]
    fn test_zero_timer_is_done() {
        let mut t = Timer::new(0.0);
        assert!(t.is_finished());
        assert!(t.advance(0.0));
        assert_eq!(t.progress(), 1.0);
    }

    #[test]
    fn test_tween_eases_to_target() {
        let mut tw = Tween::new(0.0_f32, 10.0, 1.0, ease_out_quad);
        let mid = tw.advance(0.5);
        assert!(mid > 5.0 && mid < 10.0);
        assert_eq!(tw.advance(0.5), 10.0);
        assert!(tw.is_finished());
    }

    #[test]
    fn test_queue_fires_in_order() {
        let mut q = TaskQueue::new();
        q.schedule(0.5, "b");
        q.schedule(0.25, "a");
        q.schedule(0.25, "c");
        assert!(q.advance(0.125).is_empty());
        assert_eq!(q.advance(0.125), vec!["a", "c"]);
        assert_eq!(q.advance(0.25), vec!["b"]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_queue_cancel() {
        let mut q = TaskQueue::new();
        let h = q.schedule(1.0, 7);
        q.schedule(1.0, 8);
        assert_eq!(q.cancel(h), Some(7));
        assert_eq!(q.cancel(h), None);
        assert_eq!(q.cancel_all(), vec![8]);
        assert!(q.advance(2.0).is_empty());
    }
}
