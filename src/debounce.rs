//! Coalescing timers for bursty triggers.
//!
//! One utility serves both the window resync (throttled while the camera
//! pans) and the persistence save (trailing debounce). Both guarantee a
//! trailing fire: once triggered, the action runs even if no further
//! triggers ever arrive.

use bevy::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    /// Fire once the triggers have been quiet for the whole delay.
    Trailing,
    /// Fire at most once per interval while triggers keep arriving.
    Throttle,
}

#[derive(Debug, Clone)]
pub struct Debounce {
    timer: Timer,
    pending: bool,
    edge: Edge,
}

impl Debounce {
    pub fn trailing(delay: Duration) -> Self {
        Self {
            timer: Timer::new(delay, TimerMode::Once),
            pending: false,
            edge: Edge::Trailing,
        }
    }

    pub fn throttle(interval: Duration) -> Self {
        let mut timer = Timer::new(interval, TimerMode::Once);
        // Start cooled down so the first trigger fires on the next tick.
        timer.tick(interval);
        Self {
            timer,
            pending: false,
            edge: Edge::Throttle,
        }
    }

    pub fn trigger(&mut self) {
        if self.edge == Edge::Trailing {
            self.timer.reset();
        }
        self.pending = true;
    }

    /// Advances the clock. Returns `true` when the coalesced action is due.
    pub fn tick(&mut self, delta: Duration) -> bool {
        match self.edge {
            Edge::Trailing => {
                if !self.pending {
                    return false;
                }
                self.timer.tick(delta);
                if self.timer.finished() {
                    self.pending = false;
                    return true;
                }
                false
            }
            Edge::Throttle => {
                self.timer.tick(delta);
                if self.pending && self.timer.finished() {
                    self.pending = false;
                    self.timer.reset();
                    return true;
                }
                false
            }
        }
    }

    /// Fires immediately if something is pending.
    pub fn flush(&mut self) -> bool {
        std::mem::replace(&mut self.pending, false)
    }

    pub fn cancel(&mut self) {
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}
