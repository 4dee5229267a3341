// Track 1: "BGM 1", 130 BPM, a wall on every second beat.
use super::TrackPreset;
use crate::config::{ComboShape, CountRange, PatternProbabilities, Section, TrackConfig};
use std::sync::OnceLock;

pub fn bgm1() -> &'static TrackPreset {
    static PRESET: OnceLock<TrackPreset> = OnceLock::new();
    PRESET.get_or_init(|| TrackPreset {
        config: TrackConfig {
            name: "BGM 1".to_string(),
            bpm: 130.0,
            beat_offset_ms: 0.0,
            travel_time_ms: 2000.0,
            beat_division: 2,
            probabilities: PatternProbabilities {
                skip: 0.15,
                normal: 0.45,
                combo: 0.15,
                triple_combo: 0.10,
                rapid_combo: 0.10,
                delayed_combo: 0.05,
            },
            combo: ComboShape {
                combo_count: CountRange { min: 2, max: 3 },
                triple_count: 3,
                rapid_count: 5,
                delayed_count: 2,
                combo_division: 2,
                // sixteenth notes
                rapid_division: 4,
                delay_fraction: 0.3,
            },
            sections: vec![
                Section::new("intro", 0.0, 20_000.0, 1.0),
                Section::new("verse", 20_000.0, 60_000.0, 1.1),
                Section::new("chorus", 60_000.0, 90_000.0, 1.2),
                Section::new("bridge", 90_000.0, 120_000.0, 1.15),
                Section::new("outro", 120_000.0, 999_999.0, 1.3),
            ],
        },
        audio_file: "assets/music/bgm.mp3",
        lyrics_file: None,
        volume: 0.7,
    })
}
