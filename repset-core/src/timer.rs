//! Rest countdown between sets.

use std::fmt;

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestPhase {
    Idle,
    Running,
    Paused,
    Complete,
}

/// Read-only view of the timer for display and persistence.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RestTimerState {
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub is_paused: bool,
    pub is_complete: bool,
}

type CompletionFn = Box<dyn FnMut() + Send>;

/// Countdown state machine `Idle -> Running <-> Paused -> Complete`.
///
/// The completion callback fires exactly once each time the timer reaches
/// `Complete`; extra ticks afterwards do nothing until the timer is re-armed.
pub struct RestTimer {
    phase: RestPhase,
    remaining_seconds: u32,
    total_seconds: u32,
    on_complete: Option<CompletionFn>,
}

impl Default for RestTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RestTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestTimer")
            .field("phase", &self.phase)
            .field("remaining_seconds", &self.remaining_seconds)
            .field("total_seconds", &self.total_seconds)
            .finish()
    }
}

impl RestTimer {
    pub fn new() -> Self {
        Self {
            phase: RestPhase::Idle,
            remaining_seconds: 0,
            total_seconds: 0,
            on_complete: None,
        }
    }

    pub fn on_complete(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    /// Rebuilds a running timer from a recovered snapshot.
    pub fn restore(&mut self, remaining_seconds: u32, total_seconds: u32) {
        self.total_seconds = total_seconds.max(remaining_seconds);
        self.remaining_seconds = remaining_seconds;
        self.phase = if remaining_seconds > 0 {
            RestPhase::Running
        } else {
            RestPhase::Idle
        };
    }

    pub fn phase(&self) -> RestPhase {
        self.phase
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, RestPhase::Running | RestPhase::Paused)
    }

    pub fn state(&self) -> RestTimerState {
        RestTimerState {
            remaining_seconds: self.remaining_seconds,
            total_seconds: self.total_seconds,
            is_paused: self.phase == RestPhase::Paused,
            is_complete: self.phase == RestPhase::Complete,
        }
    }

    /// Returns `true` when this call completed the timer.
    pub fn start(&mut self, seconds: u32) -> bool {
        debug!("RestTimer::start seconds={}", seconds);
        self.total_seconds = seconds;
        self.remaining_seconds = seconds;
        self.phase = RestPhase::Running;
        if seconds == 0 {
            self.finish();
            return true;
        }
        false
    }

    /// Advances the countdown by one second. Returns `true` when this tick
    /// completed the timer.
    pub fn tick(&mut self) -> bool {
        if self.phase != RestPhase::Running {
            return false;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.finish();
            return true;
        }
        false
    }

    pub fn pause(&mut self) {
        if self.phase == RestPhase::Running {
            self.phase = RestPhase::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.phase == RestPhase::Paused {
            self.phase = RestPhase::Running;
        }
    }

    /// Returns `true` if the timer was active and is now complete.
    pub fn skip(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.remaining_seconds = 0;
        self.finish();
        true
    }

    pub fn extend(&mut self, seconds: u32) {
        match self.phase {
            RestPhase::Complete => {
                self.remaining_seconds = seconds;
                self.total_seconds = self.total_seconds.max(seconds);
                self.phase = if seconds > 0 {
                    RestPhase::Running
                } else {
                    RestPhase::Complete
                };
            }
            _ => {
                self.remaining_seconds = self.remaining_seconds.saturating_add(seconds);
                self.total_seconds = self.total_seconds.max(self.remaining_seconds);
            }
        }
    }

    /// Drops back to `Idle` without firing the completion callback.
    pub fn reset(&mut self) {
        self.phase = RestPhase::Idle;
        self.remaining_seconds = 0;
        self.total_seconds = 0;
    }

    /// Fraction of the rest already elapsed, clamped to `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total_seconds == 0 {
            return if self.phase == RestPhase::Complete { 1.0 } else { 0.0 };
        }
        let fraction = 1.0 - f64::from(self.remaining_seconds) / f64::from(self.total_seconds);
        fraction.clamp(0.0, 1.0)
    }

    fn finish(&mut self) {
        self.phase = RestPhase::Complete;
        debug!("RestTimer complete after {}s", self.total_seconds);
        if let Some(callback) = self.on_complete.as_mut() {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_timer() -> (RestTimer, Arc<AtomicU32>) {
        let fired = Arc::new(AtomicU32::new(0));
        let mut timer = RestTimer::new();
        let counter = fired.clone();
        timer.on_complete(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (timer, fired)
    }

    #[test]
    fn full_countdown_fires_once() {
        let (mut timer, fired) = counting_timer();
        timer.start(60);
        let completions = (0..60).filter(|_| timer.tick()).count();
        assert_eq!(completions, 1);
        assert!(timer.state().is_complete);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        for _ in 0..5 {
            assert!(!timer.tick());
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn paused_timer_does_not_count_down() {
        let (mut timer, _) = counting_timer();
        timer.start(10);
        timer.tick();
        timer.pause();
        for _ in 0..5 {
            timer.tick();
        }
        assert_eq!(timer.remaining_seconds(), 9);
        assert!(timer.state().is_paused);
        timer.resume();
        timer.tick();
        assert_eq!(timer.remaining_seconds(), 8);
    }

    #[test]
    fn skip_completes_from_running_or_paused() {
        let (mut running, fired_running) = counting_timer();
        running.start(30);
        assert!(running.skip());
        assert_eq!(running.remaining_seconds(), 0);
        assert_eq!(fired_running.load(Ordering::SeqCst), 1);

        let (mut paused, fired_paused) = counting_timer();
        paused.start(30);
        paused.pause();
        assert!(paused.skip());
        assert_eq!(paused.remaining_seconds(), 0);
        assert_eq!(paused.phase(), RestPhase::Complete);
        assert_eq!(fired_paused.load(Ordering::SeqCst), 1);

        assert!(!paused.skip());
        assert_eq!(fired_paused.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn skip_while_idle_is_ignored() {
        let (mut timer, fired) = counting_timer();
        assert!(!timer.skip());
        assert_eq!(timer.phase(), RestPhase::Idle);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn extend_rearms_a_finished_timer() {
        let (mut timer, fired) = counting_timer();
        timer.start(1);
        timer.tick();
        assert_eq!(timer.phase(), RestPhase::Complete);

        timer.extend(10);
        assert_eq!(timer.phase(), RestPhase::Running);
        assert_eq!(timer.remaining_seconds(), 10);

        for _ in 0..10 {
            timer.tick();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn extend_adds_time_while_running() {
        let mut timer = RestTimer::new();
        timer.start(30);
        timer.tick();
        timer.extend(15);
        assert_eq!(timer.remaining_seconds(), 44);
        assert_eq!(timer.total_seconds(), 44);
    }

    #[test]
    fn progress_is_clamped() {
        let mut timer = RestTimer::new();
        assert_eq!(timer.progress(), 0.0);
        timer.start(4);
        timer.tick();
        assert!((timer.progress() - 0.25).abs() < f64::EPSILON);
        timer.skip();
        assert_eq!(timer.progress(), 1.0);
    }

    #[test]
    fn zero_second_rest_completes_immediately() {
        let (mut timer, fired) = counting_timer();
        assert!(timer.start(0));
        assert_eq!(timer.phase(), RestPhase::Complete);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
