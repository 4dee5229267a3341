//! Probabilistic beat patterns.
//!
//! One uniform draw per eligible beat picks a pattern by walking the cumulative
//! probability bands in a fixed order. Multi-wall patterns then fan out into
//! several walls spaced by a subdivision of the beat.

use rand::Rng;
use rand::rngs::SmallRng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::TrackConfig;

/// Source of uniform draws in `[0, 1)`. Injected so schedules are reproducible.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

impl RandomSource for SmallRng {
    fn next_unit(&mut self) -> f64 {
        self.random::<f64>()
    }
}

impl RandomSource for Box<dyn RandomSource> {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

/// Replays a fixed list of draws, cycling when exhausted. Useful for replays
/// and for pinning a schedule in tests.
#[derive(Clone, Debug)]
pub struct ScriptedDraws {
    draws: Vec<f64>,
    cursor: usize,
}

impl ScriptedDraws {
    pub fn new(draws: Vec<f64>) -> Self {
        Self { draws, cursor: 0 }
    }
}

impl RandomSource for ScriptedDraws {
    fn next_unit(&mut self) -> f64 {
        if self.draws.is_empty() {
            return 0.0;
        }
        let value = self.draws[self.cursor % self.draws.len()];
        self.cursor += 1;
        value.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

/// Pattern families, in sampling order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PatternKind {
    Skip,
    Normal,
    Combo,
    TripleCombo,
    RapidCombo,
    DelayedCombo,
}

impl PatternKind {
    pub fn name(self) -> &'static str {
        match self {
            PatternKind::Skip => "skip",
            PatternKind::Normal => "normal",
            PatternKind::Combo => "combo",
            PatternKind::TripleCombo => "triple_combo",
            PatternKind::RapidCombo => "rapid_combo",
            PatternKind::DelayedCombo => "delayed_combo",
        }
    }
}

/// What happens on one beat.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PatternResult {
    Skip,
    Normal,
    Combo { count: u32, division: u32 },
    TripleCombo { count: u32, division: u32 },
    RapidCombo { count: u32, division: u32 },
    DelayedCombo { count: u32, division: u32, delay_fraction: f64 },
}

impl PatternResult {
    pub fn kind(&self) -> PatternKind {
        match self {
            PatternResult::Skip => PatternKind::Skip,
            PatternResult::Normal => PatternKind::Normal,
            PatternResult::Combo { .. } => PatternKind::Combo,
            PatternResult::TripleCombo { .. } => PatternKind::TripleCombo,
            PatternResult::RapidCombo { .. } => PatternKind::RapidCombo,
            PatternResult::DelayedCombo { .. } => PatternKind::DelayedCombo,
        }
    }

    pub fn wall_count(&self) -> u32 {
        match *self {
            PatternResult::Skip => 0,
            PatternResult::Normal => 1,
            PatternResult::Combo { count, .. }
            | PatternResult::TripleCombo { count, .. }
            | PatternResult::RapidCombo { count, .. }
            | PatternResult::DelayedCombo { count, .. } => count,
        }
    }

    /// Offsets (ms, relative to the beat's spawn time) of every wall this
    /// pattern creates. Walls of a combo are `beat / division` apart; a delayed
    /// combo shifts the whole run by `delay_fraction` of a beat.
    pub fn wall_offsets(&self, beat_interval_ms: f64) -> Vec<f64> {
        let (count, division, initial) = match *self {
            PatternResult::Skip => return Vec::new(),
            PatternResult::Normal => return vec![0.0],
            PatternResult::Combo { count, division }
            | PatternResult::TripleCombo { count, division }
            | PatternResult::RapidCombo { count, division } => (count, division, 0.0),
            PatternResult::DelayedCombo {
                count,
                division,
                delay_fraction,
            } => (count, division, beat_interval_ms * delay_fraction),
        };
        let step = beat_interval_ms / division.max(1) as f64;
        (0..count).map(|i| initial + i as f64 * step).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedBeat {
    pub pattern: PatternResult,
    pub section: Option<String>,
}

/// Classifies beats into patterns from a track's probability table.
pub struct PatternGenerator<R: RandomSource> {
    source: R,
}

impl<R: RandomSource> PatternGenerator<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Pattern for the beat arriving at `music_time_ms`, tagged with the
    /// section that beat falls in.
    pub fn classify(&mut self, music_time_ms: f64, track: &TrackConfig) -> ClassifiedBeat {
        ClassifiedBeat {
            pattern: self.draw(track),
            section: track.section_at(music_time_ms).map(|s| s.name.clone()),
        }
    }

    /// One draw decides the pattern; a plain combo spends a second draw on its
    /// length. The first band whose cumulative bound exceeds the draw wins and
    /// leftover mass becomes a normal wall.
    fn draw(&mut self, track: &TrackConfig) -> PatternResult {
        let r = self.source.next_unit();
        let shape = &track.combo;
        let mut cumulative = 0.0;
        for (kind, probability) in track.probabilities.bands() {
            cumulative += probability;
            if r >= cumulative {
                continue;
            }
            return match kind {
                PatternKind::Skip => PatternResult::Skip,
                PatternKind::Normal => PatternResult::Normal,
                PatternKind::Combo => {
                    let span = (shape.combo_count.max - shape.combo_count.min + 1) as f64;
                    let extra = (self.source.next_unit() * span).floor() as u32;
                    PatternResult::Combo {
                        count: (shape.combo_count.min + extra).min(shape.combo_count.max),
                        division: shape.combo_division,
                    }
                }
                PatternKind::TripleCombo => PatternResult::TripleCombo {
                    count: shape.triple_count,
                    division: shape.combo_division,
                },
                PatternKind::RapidCombo => PatternResult::RapidCombo {
                    count: shape.rapid_count,
                    division: shape.rapid_division,
                },
                PatternKind::DelayedCombo => PatternResult::DelayedCombo {
                    count: shape.delayed_count,
                    division: shape.combo_division,
                    delay_fraction: shape.delay_fraction,
                },
            };
        }
        PatternResult::Normal
    }
}
