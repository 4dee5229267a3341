// Invariants of the built-in track data and the schedules compiled from it.
// Native-friendly: no wasm or browser APIs.

use std::collections::HashSet;

use ppusyong::config::GameRules;
use ppusyong::pattern::{PatternGenerator, PatternResult};
use ppusyong::schedule::BeatScheduler;
use ppusyong::tracks;
use rand::SeedableRng;
use rand::rngs::SmallRng;

const THREE_MINUTES_MS: f64 = 180_000.0;

#[test]
fn presets_validate_against_default_rules() {
    let max = GameRules::default().playfield.max_speed_multiplier;
    for preset in tracks() {
        preset
            .config
            .validate(max)
            .unwrap_or_else(|e| panic!("{}: {}", preset.config.name, e));
    }
}

#[test]
fn preset_names_and_assets_are_unique() {
    let mut names = HashSet::new();
    let mut files = HashSet::new();
    for preset in tracks() {
        assert!(names.insert(preset.config.name.as_str()), "duplicate {}", preset.config.name);
        assert!(files.insert(preset.audio_file), "duplicate {}", preset.audio_file);
        assert!(preset.volume > 0.0 && preset.volume <= 1.0);
    }
}

#[test]
fn sections_cover_the_song_from_zero() {
    for preset in tracks() {
        let sections = &preset.config.sections;
        assert_eq!(sections.first().map(|s| s.start_ms), Some(0.0));
        for pair in sections.windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms, "gap in {}", preset.config.name);
        }
    }
}

#[test]
fn compiled_schedules_are_ordered_and_in_range() {
    for (seed, preset) in tracks().iter().enumerate() {
        let track = &preset.config;
        let mut generator = PatternGenerator::new(SmallRng::seed_from_u64(seed as u64));
        let schedule = BeatScheduler::compile(track, THREE_MINUTES_MS, &mut generator).unwrap();
        let events = schedule.events();
        assert!(!events.is_empty(), "{} produced no walls", track.name);

        for pair in events.windows(2) {
            assert!(pair[0].beat_index < pair[1].beat_index);
            assert!(pair[0].spawn_at_ms < pair[1].spawn_at_ms);
        }
        for event in events {
            assert!(event.spawn_at_ms >= 0.0);
            assert!(event.arrival_at_ms < THREE_MINUTES_MS);
            assert_eq!(event.beat_index % track.beat_division, 0);
            assert!((event.arrival_at_ms - event.spawn_at_ms - track.travel_time_ms).abs() < 1e-6);
            assert_ne!(event.pattern, PatternResult::Skip);
            assert!(!event.spawned);
            assert_eq!(
                event.section.as_deref(),
                track.section_at(event.arrival_at_ms).map(|s| s.name.as_str())
            );
        }
    }
}

#[test]
fn fan_out_offsets_are_increasing() {
    for (seed, preset) in tracks().iter().enumerate() {
        let track = &preset.config;
        let mut generator = PatternGenerator::new(SmallRng::seed_from_u64(100 + seed as u64));
        let schedule = BeatScheduler::compile(track, THREE_MINUTES_MS, &mut generator).unwrap();
        let interval = schedule.beat_interval_ms();
        for event in schedule.events() {
            let offsets = event.pattern.wall_offsets(interval);
            assert_eq!(offsets.len() as u32, event.pattern.wall_count());
            assert!(offsets.windows(2).all(|w| w[0] < w[1]));
            match event.pattern {
                PatternResult::DelayedCombo { delay_fraction, .. } => {
                    assert!((offsets[0] - interval * delay_fraction).abs() < 1e-9);
                }
                _ => assert_eq!(offsets[0], 0.0),
            }
        }
    }
}
