//! Beat schedule: the whole song is compiled once into spawn events, each one
//! firing `travel_time_ms` ahead of its beat so the wall reaches the hit zone on
//! the beat. Multi-wall patterns fan out into follow-up walls that are queued on
//! the same timeline instead of real-time timers.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::config::{FanOutTiming, TrackConfig};
use crate::error::ConfigError;
use crate::pattern::{PatternGenerator, PatternResult, RandomSource};

/// One eligible beat that produces walls.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SpawnEvent {
    pub beat_index: u32,
    pub spawn_at_ms: f64,
    pub arrival_at_ms: f64,
    pub pattern: PatternResult,
    /// Name of the section the arrival falls in, if any.
    pub section: Option<String>,
    pub spawned: bool,
}

/// A single wall that is due. `lateness_ms` is how far past its due time the
/// tick that released it ran; the registry pre-advances the wall by that much.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WallSpawn {
    pub beat_index: u32,
    /// Position of this wall within its pattern (0 = first).
    pub ordinal: u32,
    pub due_ms: f64,
    pub arrival_at_ms: f64,
    pub lateness_ms: f64,
}

#[derive(Clone, Copy, Debug)]
struct QueuedWall {
    beat_index: u32,
    ordinal: u32,
    due_ms: f64,
    arrival_at_ms: f64,
    timing: FanOutTiming,
}

pub struct BeatScheduler {
    events: Vec<SpawnEvent>,
    /// Index of the first event not yet fired. Events before it are all spawned.
    cursor: usize,
    beat_interval_ms: f64,
    fan_out: FanOutTiming,
    queued: Vec<QueuedWall>,
}

impl BeatScheduler {
    /// Upper bound on beats in one song; about nine hours at 180 BPM.
    pub const MAX_BEATS: u32 = 100_000;

    /// Compile a track into its spawn events.
    ///
    /// Beats not divisible by `beat_division`, beats whose spawn time would be
    /// negative (no burst at session start) and beats classified as `Skip`
    /// produce no event. Events come out ascending by `beat_index` and
    /// therefore by `spawn_at_ms`.
    pub fn compile<R: RandomSource>(
        track: &TrackConfig,
        track_duration_ms: f64,
        generator: &mut PatternGenerator<R>,
    ) -> Result<Self, ConfigError> {
        track.validate(f64::INFINITY)?;
        if !(track_duration_ms > 0.0) || !track_duration_ms.is_finite() {
            return Err(ConfigError::NonPositiveDuration(track_duration_ms));
        }

        let beat_interval_ms = track.beat_interval_ms();
        let beats = ((track_duration_ms - track.beat_offset_ms) / beat_interval_ms)
            .ceil()
            .max(0.0);
        if !(beats <= f64::from(Self::MAX_BEATS)) {
            return Err(ConfigError::TooManyBeats {
                beats,
                max: Self::MAX_BEATS,
            });
        }

        let mut events = Vec::new();
        for beat_index in 0..beats as u32 {
            let arrival_at_ms = track.beat_offset_ms + beat_index as f64 * beat_interval_ms;
            if arrival_at_ms >= track_duration_ms {
                break;
            }
            if beat_index % track.beat_division != 0 {
                continue;
            }
            let spawn_at_ms = arrival_at_ms - track.travel_time_ms;
            if spawn_at_ms < 0.0 {
                continue;
            }
            let beat = generator.classify(arrival_at_ms, track);
            if beat.pattern != PatternResult::Skip {
                events.push(SpawnEvent {
                    beat_index,
                    spawn_at_ms,
                    arrival_at_ms,
                    pattern: beat.pattern,
                    section: beat.section,
                    spawned: false,
                });
            }
        }

        log::info!(
            "schedule compiled: {} events over {:.0} ms ({} bpm, every {} beat(s))",
            events.len(),
            track_duration_ms,
            track.bpm,
            track.beat_division
        );
        Ok(Self {
            events,
            cursor: 0,
            beat_interval_ms,
            fan_out: FanOutTiming::default(),
            queued: Vec::new(),
        })
    }

    pub fn with_fan_out(mut self, fan_out: FanOutTiming) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn events(&self) -> &[SpawnEvent] {
        &self.events
    }

    pub fn beat_interval_ms(&self) -> f64 {
        self.beat_interval_ms
    }

    /// True once every event has fired and no follow-up wall is waiting.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.events.len() && self.queued.is_empty()
    }

    /// Events due at `music_time_ms`, each returned exactly once. A clock that
    /// steps backwards never re-fires anything.
    pub fn due_events(&mut self, music_time_ms: f64) -> Vec<SpawnEvent> {
        let mut due = Vec::new();
        while let Some(event) = self.events.get_mut(self.cursor) {
            if event.spawn_at_ms > music_time_ms {
                break;
            }
            if !event.spawned {
                event.spawned = true;
                due.push(event.clone());
            }
            self.cursor += 1;
        }
        due
    }

    /// Walls to create this tick. Newly due events are expanded into their
    /// walls and queued; everything whose due time has passed is released in
    /// due order.
    pub fn due_walls(&mut self, music_time_ms: f64, wall_time_ms: f64) -> Vec<WallSpawn> {
        for event in self.due_events(music_time_ms) {
            log::debug!(
                "beat {} fires {:?} ({})",
                event.beat_index,
                event.pattern.kind(),
                event.section.as_deref().unwrap_or("-")
            );
            for (ordinal, offset) in event
                .pattern
                .wall_offsets(self.beat_interval_ms)
                .into_iter()
                .enumerate()
            {
                // The first wall of a pattern is anchored to the music timeline
                // in either mode; only follow-ups honour the fan-out timing.
                let timing = if ordinal == 0 {
                    FanOutTiming::MusicTime
                } else {
                    self.fan_out
                };
                let due_ms = match timing {
                    FanOutTiming::MusicTime => event.spawn_at_ms + offset,
                    FanOutTiming::WallClock => wall_time_ms + offset,
                };
                self.queued.push(QueuedWall {
                    beat_index: event.beat_index,
                    ordinal: ordinal as u32,
                    due_ms,
                    arrival_at_ms: event.arrival_at_ms + offset,
                    timing,
                });
            }
        }
        self.release(Some(music_time_ms), wall_time_ms)
    }

    /// Release wall-clock follow-ups only. Used while the session is paused.
    pub fn due_wall_clock_walls(&mut self, wall_time_ms: f64) -> Vec<WallSpawn> {
        self.release(None, wall_time_ms)
    }

    fn release(&mut self, music_time_ms: Option<f64>, wall_time_ms: f64) -> Vec<WallSpawn> {
        let mut released = Vec::new();
        self.queued.retain(|q| {
            let now = match q.timing {
                FanOutTiming::MusicTime => match music_time_ms {
                    Some(t) => t,
                    None => return true,
                },
                FanOutTiming::WallClock => wall_time_ms,
            };
            if q.due_ms <= now {
                released.push(WallSpawn {
                    beat_index: q.beat_index,
                    ordinal: q.ordinal,
                    due_ms: q.due_ms,
                    arrival_at_ms: q.arrival_at_ms,
                    lateness_ms: now - q.due_ms,
                });
                false
            } else {
                true
            }
        });
        released.sort_by(|a, b| {
            (a.beat_index, a.ordinal).cmp(&(b.beat_index, b.ordinal))
        });
        released
    }
}
