//! Music transport time and the audio-load watchdog.
//!
//! Callers pass the host's millisecond clock (`performance.now()` in the
//! browser) into every call; nothing here reads a clock on its own.

#[cfg(feature = "serde")]
use serde::Serialize;

/// How long a track may take to load before the session falls back to silent play.
pub const DEFAULT_AUDIO_LOAD_TIMEOUT_MS: f64 = 10_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
}

/// Elapsed play time with pause gaps removed.
///
/// While playing, music time is `now - start - total_paused`. While paused it
/// holds the value from the pause instant, so resuming never shifts the
/// mapping the schedule was compiled against.
#[derive(Clone, Copy, Debug)]
pub struct TransportClock {
    state: TransportState,
    start_ms: f64,
    paused_at_ms: f64,
    total_paused_ms: f64,
    high_water_ms: f64,
}

impl Default for TransportClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportClock {
    pub fn new() -> Self {
        Self {
            state: TransportState::Stopped,
            start_ms: 0.0,
            paused_at_ms: 0.0,
            total_paused_ms: 0.0,
            high_water_ms: 0.0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state == TransportState::Paused
    }

    /// Start from zero. Ignored while already running.
    pub fn start(&mut self, now_ms: f64) {
        if self.state != TransportState::Stopped {
            return;
        }
        *self = Self {
            state: TransportState::Playing,
            start_ms: now_ms,
            ..Self::new()
        };
        log::info!("transport started at {:.1}", now_ms);
    }

    pub fn pause(&mut self, now_ms: f64) -> bool {
        if self.state != TransportState::Playing {
            return false;
        }
        self.state = TransportState::Paused;
        self.paused_at_ms = now_ms;
        log::info!("transport paused at music time {:.1}", self.current_time(now_ms));
        true
    }

    pub fn resume(&mut self, now_ms: f64) -> bool {
        if self.state != TransportState::Paused {
            return false;
        }
        self.total_paused_ms += (now_ms - self.paused_at_ms).max(0.0);
        self.state = TransportState::Playing;
        log::info!("transport resumed at music time {:.1}", self.current_time(now_ms));
        true
    }

    pub fn stop(&mut self) {
        *self = Self::new();
    }

    /// Music time at `now_ms`. Zero before start, never negative.
    pub fn current_time(&self, now_ms: f64) -> f64 {
        let at = match self.state {
            TransportState::Stopped => return 0.0,
            TransportState::Playing => now_ms,
            TransportState::Paused => self.paused_at_ms,
        };
        (at - self.start_ms - self.total_paused_ms).max(0.0)
    }

    /// Music time for a simulation tick. A host clock that steps backwards
    /// holds the previous value instead of rewinding the session.
    pub fn tick(&mut self, now_ms: f64) -> f64 {
        let t = self.current_time(now_ms);
        if t < self.high_water_ms {
            log::debug!(
                "clock regressed by {:.2} ms, holding",
                self.high_water_ms - t
            );
            return self.high_water_ms;
        }
        self.high_water_ms = t;
        t
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum LoadStatus {
    Pending,
    Ready,
    /// Gave up waiting; the session runs without audio on the transport clock.
    TimedOut,
}

/// Turns a load callback that may never arrive into a bounded wait. The first
/// outcome sticks.
#[derive(Clone, Copy, Debug)]
pub struct AudioLoadWatchdog {
    deadline_ms: f64,
    status: LoadStatus,
}

impl AudioLoadWatchdog {
    pub fn new(started_at_ms: f64, timeout_ms: f64) -> Self {
        Self {
            deadline_ms: started_at_ms + timeout_ms,
            status: LoadStatus::Pending,
        }
    }

    pub fn mark_ready(&mut self) {
        if self.status == LoadStatus::Pending {
            self.status = LoadStatus::Ready;
        }
    }

    pub fn poll(&mut self, now_ms: f64) -> LoadStatus {
        if self.status == LoadStatus::Pending && now_ms >= self.deadline_ms {
            log::warn!("audio did not load in time; continuing without audio");
            self.status = LoadStatus::TimedOut;
        }
        self.status
    }
}
