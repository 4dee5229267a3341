//! Per-section speed multipliers.

use crate::config::Section;

/// Emitted when the section under the playhead changes the wall speed.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeedChange {
    pub multiplier: f64,
    pub background_speed: f64,
    /// True when the new multiplier is faster than the previous one; the
    /// renderer flashes the screen.
    pub sped_up: bool,
    pub section: Option<String>,
}

pub struct SectionSpeedController {
    sections: Vec<Section>,
    background_base_speed: f64,
    current: f64,
}

impl SectionSpeedController {
    /// Differences at or below this are not worth a speed change.
    const EPSILON: f64 = 0.01;

    pub fn new(sections: Vec<Section>, background_base_speed: f64) -> Self {
        Self {
            sections,
            background_base_speed,
            current: 1.0,
        }
    }

    /// Multiplier of the first section containing `music_time_ms`, else 1.0.
    pub fn multiplier_for(&self, music_time_ms: f64) -> f64 {
        self.sections
            .iter()
            .find(|s| s.contains(music_time_ms))
            .map_or(1.0, |s| s.speed_multiplier)
    }

    pub fn current_multiplier(&self) -> f64 {
        self.current
    }

    pub fn background_speed(&self) -> f64 {
        self.background_base_speed * self.current
    }

    pub fn update(&mut self, music_time_ms: f64) -> Option<SpeedChange> {
        let target = self.multiplier_for(music_time_ms);
        if (target - self.current).abs() <= Self::EPSILON {
            return None;
        }
        let sped_up = target > self.current;
        self.current = target;
        let section = self
            .sections
            .iter()
            .find(|s| s.contains(music_time_ms))
            .map(|s| s.name.clone());
        log::info!(
            "speed x{:.2} ({})",
            target,
            section.as_deref().unwrap_or("no section")
        );
        Some(SpeedChange {
            multiplier: target,
            background_speed: self.background_speed(),
            sped_up,
            section,
        })
    }

    pub fn reset(&mut self) {
        self.current = 1.0;
    }
}
