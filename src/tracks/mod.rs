//! Built-in songs and the selector the title screen cycles through.
//!
//! Each song lives in its own file and exposes a getter returning a
//! `&'static TrackPreset`; `tracks()` gathers them in menu order.

mod before_sunrise;
mod bgm1;
mod rhythm_race;

pub use before_sunrise::before_sunrise;
pub use bgm1::bgm1;
pub use rhythm_race::rhythm_race;

use crate::config::TrackConfig;

/// A playable song: the schedule-relevant config plus what the audio host needs.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackPreset {
    pub config: TrackConfig,
    pub audio_file: &'static str,
    pub lyrics_file: Option<&'static str>,
    pub volume: f64,
}

/// All built-in tracks in menu order.
pub fn tracks() -> &'static [&'static TrackPreset] {
    use std::sync::OnceLock;
    static TRACKS: OnceLock<&'static [&'static TrackPreset]> = OnceLock::new();
    TRACKS.get_or_init(|| Box::leak(vec![bgm1(), before_sunrise(), rhythm_race()].into_boxed_slice()))
}

/// Menu cursor over a track list, wrapping at both ends.
#[derive(Clone, Copy, Debug)]
pub struct TrackSelector {
    tracks: &'static [&'static TrackPreset],
    index: usize,
}

impl Default for TrackSelector {
    fn default() -> Self {
        Self::new(tracks())
    }
}

impl TrackSelector {
    pub fn new(tracks: &'static [&'static TrackPreset]) -> Self {
        Self { tracks, index: 0 }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current(&self) -> Option<&'static TrackPreset> {
        self.tracks.get(self.index).copied()
    }

    pub fn next(&mut self) -> Option<&'static TrackPreset> {
        if !self.tracks.is_empty() {
            self.index = (self.index + 1) % self.tracks.len();
        }
        self.current()
    }

    pub fn prev(&mut self) -> Option<&'static TrackPreset> {
        if !self.tracks.is_empty() {
            self.index = (self.index + self.tracks.len() - 1) % self.tracks.len();
        }
        self.current()
    }

    /// Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) -> Option<&'static TrackPreset> {
        if index < self.tracks.len() {
            self.index = index;
        }
        self.current()
    }
}
