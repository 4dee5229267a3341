// Track 3: "Ttimi's Rhythm Race", 155 BPM with longer rapid runs and steeper sections.
use super::TrackPreset;
use crate::config::{ComboShape, CountRange, PatternProbabilities, Section, TrackConfig};
use std::sync::OnceLock;

pub fn rhythm_race() -> &'static TrackPreset {
    static PRESET: OnceLock<TrackPreset> = OnceLock::new();
    PRESET.get_or_init(|| TrackPreset {
        config: TrackConfig {
            name: "Ttimi's Rhythm Race".to_string(),
            bpm: 155.0,
            beat_offset_ms: 0.0,
            travel_time_ms: 2000.0,
            beat_division: 2,
            probabilities: PatternProbabilities {
                skip: 0.10,
                normal: 0.40,
                combo: 0.20,
                triple_combo: 0.15,
                rapid_combo: 0.10,
                delayed_combo: 0.05,
            },
            combo: ComboShape {
                combo_count: CountRange { min: 2, max: 3 },
                triple_count: 3,
                rapid_count: 6,
                delayed_count: 2,
                combo_division: 2,
                rapid_division: 4,
                delay_fraction: 0.35,
            },
            sections: vec![
                Section::new("intro", 0.0, 15_000.0, 1.0),
                Section::new("verse", 15_000.0, 45_000.0, 1.15),
                Section::new("chorus", 45_000.0, 75_000.0, 1.35),
                Section::new("bridge", 75_000.0, 105_000.0, 1.25),
                Section::new("outro", 105_000.0, 999_999.0, 1.4),
            ],
        },
        audio_file: "assets/music/ttimi_rhythm_race.mp3",
        lyrics_file: None,
        volume: 0.7,
    })
}
