//! Configuration errors surfaced when a track is loaded or a schedule compiled.
//! Everything past load time is total; these are the only failures the core reports.

/// A track or rule set that cannot produce a playable schedule.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("bpm must be positive, got {0}")]
    NonPositiveBpm(f64),
    #[error("travel time must be positive, got {0} ms")]
    NonPositiveTravelTime(f64),
    #[error("beat offset must not be negative, got {0} ms")]
    NegativeBeatOffset(f64),
    #[error("beat division must be at least 1")]
    ZeroBeatDivision,
    #[error("probability `{name}` must lie in [0, 1], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },
    #[error("pattern probabilities sum to {0}, which exceeds 1")]
    ProbabilitySumExceedsOne(f64),
    #[error("combo count range {min}..={max} is empty")]
    InvalidComboRange { min: u32, max: u32 },
    #[error("combo count `{0}` must be at least 1")]
    ZeroComboCount(&'static str),
    #[error("division factor `{0}` must be at least 1")]
    ZeroDivisionFactor(&'static str),
    #[error("delay fraction must lie in [0, 1), got {0}")]
    DelayFractionOutOfRange(f64),
    #[error("section `{name}` has an empty or inverted range [{start_ms}, {end_ms})")]
    InvalidSectionRange {
        name: String,
        start_ms: f64,
        end_ms: f64,
    },
    #[error("section `{name}` starts before the previous section ends")]
    OverlappingSections { name: String },
    #[error("section `{name}` multiplier {multiplier} exceeds the maximum {max}")]
    SectionMultiplierTooHigh {
        name: String,
        multiplier: f64,
        max: f64,
    },
    #[error("section `{name}` multiplier must be positive, got {multiplier}")]
    NonPositiveSectionMultiplier { name: String, multiplier: f64 },
    #[error("track duration must be positive, got {0} ms")]
    NonPositiveDuration(f64),
    #[error("song spans {beats} beats, more than the {max} a schedule may hold")]
    TooManyBeats { beats: f64, max: u32 },
    #[cfg(feature = "serde_json")]
    #[error("track config JSON is malformed: {0}")]
    Json(String),
}
