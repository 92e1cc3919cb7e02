//! Virtual clock for deterministic replay timing.
//!
//! The engine reads time only from this clock. Headless runs advance it by a
//! fixed frame step; interactive hosts sync it to wall time once per frame.

use std::time::Instant;

/// A controllable time source measured in seconds.
///
/// The clock can be:
/// - Advanced manually by a frame step
/// - Synced to elapsed real time
/// - Paused/resumed and run at different speeds
#[derive(Debug)]
pub struct VirtualClock {
    /// Current virtual time in seconds.
    now: f64,
    /// Length of the most recent advance.
    last_delta: f64,
    /// Whether time passes.
    running: bool,
    /// Speed multiplier (1.0 = normal).
    speed: f64,
    /// Real-time instant of the last sync.
    last_sync: Option<Instant>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            last_delta: 0.0,
            running: true,
            speed: 1.0,
            last_sync: None,
        }
    }

    /// Current virtual time in seconds.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Duration of the last frame.
    pub fn last_delta(&self) -> f64 {
        self.last_delta
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Set the speed multiplier, clamped to `0.1..=10.0`.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(0.1, 10.0);
    }

    pub fn play(&mut self) {
        if !self.running {
            self.running = true;
            self.last_sync = None;
        }
    }

    pub fn pause(&mut self) {
        if self.running {
            self.sync();
            self.running = false;
            self.last_sync = None;
        }
    }

    pub fn toggle(&mut self) {
        if self.running {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Advance by `dt` seconds of real time, scaled by the speed.
    ///
    /// Returns the virtual time that passed.
    pub fn advance(&mut self, dt: f64) -> f64 {
        if !self.running || !dt.is_finite() || dt <= 0.0 {
            self.last_delta = 0.0;
            return 0.0;
        }
        let scaled = dt * self.speed;
        self.now += scaled;
        self.last_delta = scaled;
        scaled
    }

    /// Advance by the real time elapsed since the previous sync.
    ///
    /// The first sync after creation or resume only starts measuring.
    pub fn sync(&mut self) -> f64 {
        let now = Instant::now();
        let advanced = match self.last_sync {
            Some(last) => self.advance(now.duration_since(last).as_secs_f64()),
            None => {
                self.last_delta = 0.0;
                0.0
            }
        };
        if self.running {
            self.last_sync = Some(now);
        }
        advanced
    }

    /// Back to time zero, running at normal speed.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}
