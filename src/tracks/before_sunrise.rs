// Track 2: "Before Sunrise Commute", 90 BPM. Slow enough for a wall on every beat.
use super::TrackPreset;
use crate::config::{ComboShape, CountRange, PatternProbabilities, Section, TrackConfig};
use std::sync::OnceLock;

pub fn before_sunrise() -> &'static TrackPreset {
    static PRESET: OnceLock<TrackPreset> = OnceLock::new();
    PRESET.get_or_init(|| TrackPreset {
        config: TrackConfig {
            name: "Before Sunrise Commute".to_string(),
            bpm: 90.0,
            beat_offset_ms: 0.0,
            travel_time_ms: 2000.0,
            beat_division: 1,
            probabilities: PatternProbabilities {
                skip: 0.10,
                normal: 0.55,
                combo: 0.15,
                triple_combo: 0.10,
                rapid_combo: 0.05,
                delayed_combo: 0.05,
            },
            combo: ComboShape {
                combo_count: CountRange { min: 2, max: 2 },
                triple_count: 3,
                rapid_count: 4,
                delayed_count: 2,
                combo_division: 2,
                rapid_division: 3,
                delay_fraction: 0.25,
            },
            sections: vec![
                Section::new("intro", 0.0, 30_000.0, 1.0),
                Section::new("verse", 30_000.0, 90_000.0, 1.1),
                Section::new("chorus", 90_000.0, 150_000.0, 1.25),
                Section::new("outro", 150_000.0, 999_999.0, 1.2),
            ],
        },
        audio_file: "assets/music/before_sunrise_commute.mp3",
        lyrics_file: Some("assets/music/before_sunrise_commute.lrc"),
        volume: 0.7,
    })
}
