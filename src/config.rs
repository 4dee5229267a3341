//! Track and rule configuration.
//!
//! `TrackConfig` is the immutable per-song record the scheduler compiles from;
//! `GameRules` carries every tuning constant of the playfield, the character and
//! the scoring tables. Both are plain data with `serde` support behind the
//! `serde` feature so a host page can ship its own songs as JSON.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pattern::PatternKind;

// --- Track -------------------------------------------------------------------

/// Probability of each pattern on an eligible beat. Bands are accumulated in
/// declaration order; any mass left below 1.0 falls back to a normal wall.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PatternProbabilities {
    pub skip: f64,
    pub normal: f64,
    pub combo: f64,
    pub triple_combo: f64,
    pub rapid_combo: f64,
    pub delayed_combo: f64,
}

impl PatternProbabilities {
    /// Bands in sampling order.
    pub fn bands(&self) -> [(PatternKind, f64); 6] {
        [
            (PatternKind::Skip, self.skip),
            (PatternKind::Normal, self.normal),
            (PatternKind::Combo, self.combo),
            (PatternKind::TripleCombo, self.triple_combo),
            (PatternKind::RapidCombo, self.rapid_combo),
            (PatternKind::DelayedCombo, self.delayed_combo),
        ]
    }

    pub fn total(&self) -> f64 {
        self.bands().iter().map(|(_, p)| p).sum()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (kind, value) in self.bands() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ProbabilityOutOfRange {
                    name: kind.name(),
                    value,
                });
            }
        }
        let total = self.total();
        // Tolerate float noise from tables written as decimals (0.45 + 0.15 + ...).
        if total > 1.0 + 1e-9 {
            return Err(ConfigError::ProbabilitySumExceedsOne(total));
        }
        Ok(())
    }
}

/// Inclusive range for the number of walls in a plain combo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CountRange {
    pub min: u32,
    pub max: u32,
}

/// Shape parameters for the multi-wall patterns.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComboShape {
    pub combo_count: CountRange,
    pub triple_count: u32,
    pub rapid_count: u32,
    pub delayed_count: u32,
    /// Beat subdivision between walls of combo, triple and delayed patterns.
    pub combo_division: u32,
    /// Beat subdivision between walls of a rapid pattern (4 = sixteenth notes).
    pub rapid_division: u32,
    /// Fraction of a beat the first wall of a delayed combo is pushed back.
    pub delay_fraction: f64,
}

impl ComboShape {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let CountRange { min, max } = self.combo_count;
        if min == 0 || min > max {
            return Err(ConfigError::InvalidComboRange { min, max });
        }
        for (name, count) in [
            ("triple_count", self.triple_count),
            ("rapid_count", self.rapid_count),
            ("delayed_count", self.delayed_count),
        ] {
            if count == 0 {
                return Err(ConfigError::ZeroComboCount(name));
            }
        }
        if self.combo_division == 0 {
            return Err(ConfigError::ZeroDivisionFactor("combo_division"));
        }
        if self.rapid_division == 0 {
            return Err(ConfigError::ZeroDivisionFactor("rapid_division"));
        }
        if !(0.0..1.0).contains(&self.delay_fraction) {
            return Err(ConfigError::DelayFractionOutOfRange(self.delay_fraction));
        }
        Ok(())
    }
}

/// A `[start_ms, end_ms)` slice of the song with its own wall speed.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Section {
    pub name: String,
    pub start_ms: f64,
    pub end_ms: f64,
    pub speed_multiplier: f64,
}

impl Section {
    pub fn new(name: &str, start_ms: f64, end_ms: f64, speed_multiplier: f64) -> Self {
        Self {
            name: name.to_string(),
            start_ms,
            end_ms,
            speed_multiplier,
        }
    }

    pub fn contains(&self, music_time_ms: f64) -> bool {
        music_time_ms >= self.start_ms && music_time_ms < self.end_ms
    }
}

/// Immutable per-song record.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackConfig {
    pub name: String,
    pub bpm: f64,
    pub beat_offset_ms: f64,
    pub travel_time_ms: f64,
    /// Only every `beat_division`-th beat is eligible for a spawn.
    pub beat_division: u32,
    pub probabilities: PatternProbabilities,
    pub combo: ComboShape,
    pub sections: Vec<Section>,
}

impl TrackConfig {
    pub fn beat_interval_ms(&self) -> f64 {
        60_000.0 / self.bpm
    }

    /// First section whose range contains `music_time_ms`.
    pub fn section_at(&self, music_time_ms: f64) -> Option<&Section> {
        self.sections.iter().find(|s| s.contains(music_time_ms))
    }

    /// Fail-fast validation run before any schedule is compiled.
    pub fn validate(&self, max_speed_multiplier: f64) -> Result<(), ConfigError> {
        if !(self.bpm > 0.0) || !self.bpm.is_finite() {
            return Err(ConfigError::NonPositiveBpm(self.bpm));
        }
        if !(self.travel_time_ms > 0.0) {
            return Err(ConfigError::NonPositiveTravelTime(self.travel_time_ms));
        }
        if !(self.beat_offset_ms >= 0.0) {
            return Err(ConfigError::NegativeBeatOffset(self.beat_offset_ms));
        }
        if self.beat_division == 0 {
            return Err(ConfigError::ZeroBeatDivision);
        }
        self.probabilities.validate()?;
        self.combo.validate()?;

        let mut previous_end = f64::NEG_INFINITY;
        for section in &self.sections {
            if !(section.start_ms < section.end_ms) {
                return Err(ConfigError::InvalidSectionRange {
                    name: section.name.clone(),
                    start_ms: section.start_ms,
                    end_ms: section.end_ms,
                });
            }
            if section.start_ms < previous_end {
                return Err(ConfigError::OverlappingSections {
                    name: section.name.clone(),
                });
            }
            if !(section.speed_multiplier > 0.0) {
                return Err(ConfigError::NonPositiveSectionMultiplier {
                    name: section.name.clone(),
                    multiplier: section.speed_multiplier,
                });
            }
            if section.speed_multiplier > max_speed_multiplier {
                return Err(ConfigError::SectionMultiplierTooHigh {
                    name: section.name.clone(),
                    multiplier: section.speed_multiplier,
                    max: max_speed_multiplier,
                });
            }
            previous_end = section.end_ms;
        }
        Ok(())
    }

    /// Parse a track from JSON (field names as in this struct).
    #[cfg(feature = "serde_json")]
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Json(e.to_string()))
    }
}

// --- Rules -------------------------------------------------------------------

/// When the follow-up walls of a multi-wall pattern fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FanOutTiming {
    /// Queued on the music timeline; pausing suspends them.
    #[default]
    MusicTime,
    /// Queued on the wall clock; they keep firing while the session is paused.
    WallClock,
}

/// Playfield geometry and wall movement. Speeds are in pixels per 60 Hz frame.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlayfieldRules {
    pub width: f64,
    pub height: f64,
    /// Walls appear this far past the right edge.
    pub spawn_margin: f64,
    pub wall_width: f64,
    pub wall_height: f64,
    pub wall_base_speed: f64,
    pub max_speed_multiplier: f64,
    pub destroy_effect_ms: f64,
    pub min_spawn_spacing: f64,
    pub min_spawn_spacing_floor: f64,
    pub hit_zone_offset: f64,
    pub hit_zone_width: f64,
    pub body_width: f64,
    pub background_base_speed: f64,
    /// Number of wall sprites the renderer rotates through.
    pub wall_variants: usize,
}

impl PlayfieldRules {
    pub fn character_x(&self) -> f64 {
        self.width / 5.0
    }

    pub fn ground_y(&self) -> f64 {
        self.height - 200.0
    }

    pub fn wall_y(&self) -> f64 {
        self.height - 400.0
    }
}

/// Character timings in milliseconds; jump values are per 60 Hz frame.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CombatRules {
    pub punch_ms: f64,
    pub jump_punch_ms: f64,
    pub damaged_ms: f64,
    pub death_ms: f64,
    pub input_buffer_ms: f64,
    pub invincibility_ms: f64,
    pub jump_speed: f64,
    pub gravity: f64,
    pub damage_cooldown_ms: f64,
    /// Delay between the death transition and the defeat screen.
    pub death_to_end_ms: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScoringRules {
    pub wow_points: u32,
    pub great_points: u32,
    pub good_points: u32,
    pub miss_points: u32,
    pub max_health: u32,
    pub damage_per_hit: u32,
    pub clear_countdown_ms: f64,
    pub defeat_countdown_ms: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GameRules {
    pub playfield: PlayfieldRules,
    pub combat: CombatRules,
    pub scoring: ScoringRules,
    pub fan_out: FanOutTiming,
    pub ranking_capacity: usize,
}

impl Default for PlayfieldRules {
    fn default() -> Self {
        Self {
            width: 1600.0,
            height: 900.0,
            spawn_margin: 50.0,
            wall_width: 160.0,
            wall_height: 300.0,
            wall_base_speed: 8.0,
            max_speed_multiplier: 2.0,
            destroy_effect_ms: 300.0,
            min_spawn_spacing: 100.0,
            min_spawn_spacing_floor: 80.0,
            hit_zone_offset: 150.0,
            hit_zone_width: 200.0,
            body_width: 100.0,
            background_base_speed: 3.0,
            wall_variants: 4,
        }
    }
}

impl Default for CombatRules {
    fn default() -> Self {
        Self {
            // 6 frames @ 50 fps
            punch_ms: 120.0,
            // 14 frames @ 35 fps
            jump_punch_ms: 400.0,
            // 8 frames @ 59 fps
            damaged_ms: 136.0,
            death_ms: 1000.0,
            input_buffer_ms: 500.0,
            invincibility_ms: 2000.0,
            jump_speed: -15.0,
            gravity: 1.0,
            damage_cooldown_ms: 1000.0,
            death_to_end_ms: 1000.0,
        }
    }
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            wow_points: 50,
            great_points: 30,
            good_points: 15,
            miss_points: 5,
            max_health: 7,
            damage_per_hit: 1,
            clear_countdown_ms: 120_000.0,
            defeat_countdown_ms: 10_000.0,
        }
    }
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            playfield: PlayfieldRules::default(),
            combat: CombatRules::default(),
            scoring: ScoringRules::default(),
            fan_out: FanOutTiming::default(),
            ranking_capacity: 10,
        }
    }
}
