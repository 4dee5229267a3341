//! Score, combo and health bookkeeping.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::config::ScoringRules;
use crate::obstacle::Judgment;

/// Score multiplier for a combo count. Non-decreasing step function.
pub fn combo_multiplier(combo: u32) -> f64 {
    const STEPS: [(u32, f64); 5] = [(100, 2.5), (50, 2.0), (30, 1.8), (20, 1.5), (10, 1.2)];
    STEPS
        .iter()
        .find(|(threshold, _)| combo >= *threshold)
        .map_or(1.0, |(_, multiplier)| *multiplier)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct JudgmentCounts {
    pub wow: u32,
    pub great: u32,
    pub good: u32,
    pub miss: u32,
}

impl JudgmentCounts {
    pub fn get(&self, tier: Judgment) -> u32 {
        match tier {
            Judgment::Wow => self.wow,
            Judgment::Great => self.great,
            Judgment::Good => self.good,
            Judgment::Miss => self.miss,
        }
    }

    fn bump(&mut self, tier: Judgment) {
        match tier {
            Judgment::Wow => self.wow += 1,
            Judgment::Great => self.great += 1,
            Judgment::Good => self.good += 1,
            Judgment::Miss => self.miss += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.wow + self.great + self.good + self.miss
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SessionEnd {
    pub cleared: bool,
    pub at_ms: f64,
}

/// Mutable score state for one session. Frozen once the session ends.
#[derive(Clone, Debug)]
pub struct ScoreLedger {
    rules: ScoringRules,
    score: u64,
    combo: u32,
    max_combo: u32,
    health: u32,
    walls_destroyed: u32,
    counts: JudgmentCounts,
    ended: Option<SessionEnd>,
}

impl ScoreLedger {
    pub fn new(rules: ScoringRules) -> Self {
        Self {
            rules,
            score: 0,
            combo: 0,
            max_combo: 0,
            health: rules.max_health,
            walls_destroyed: 0,
            counts: JudgmentCounts::default(),
            ended: None,
        }
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub fn multiplier(&self) -> f64 {
        combo_multiplier(self.combo)
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn max_health(&self) -> u32 {
        self.rules.max_health
    }

    pub fn walls_destroyed(&self) -> u32 {
        self.walls_destroyed
    }

    pub fn counts(&self) -> JudgmentCounts {
        self.counts
    }

    pub fn ended(&self) -> Option<SessionEnd> {
        self.ended
    }

    pub fn is_ended(&self) -> bool {
        self.ended.is_some()
    }

    pub fn base_points(&self, tier: Judgment) -> u32 {
        match tier {
            Judgment::Wow => self.rules.wow_points,
            Judgment::Great => self.rules.great_points,
            Judgment::Good => self.rules.good_points,
            Judgment::Miss => self.rules.miss_points,
        }
    }

    /// Score a landed judgment. The combo is bumped first, so a hit counts
    /// towards its own multiplier. Returns the points awarded.
    pub fn record_judgment(&mut self, tier: Judgment) -> u32 {
        if self.is_ended() {
            return 0;
        }
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        let points = (self.base_points(tier) as f64 * combo_multiplier(self.combo)).floor() as u32;
        self.score += u64::from(points);
        self.walls_destroyed += 1;
        self.counts.bump(tier);
        points
    }

    /// Count a MISS without touching score or combo.
    pub fn record_miss(&mut self) {
        if !self.is_ended() {
            self.counts.bump(Judgment::Miss);
        }
    }

    pub fn break_combo(&mut self) {
        if self.is_ended() || self.combo == 0 {
            return;
        }
        log::debug!("combo broken at {}", self.combo);
        self.combo = 0;
    }

    /// Lose health; true only on the hit that empties the pool.
    pub fn take_damage(&mut self) -> bool {
        if self.is_ended() || self.health == 0 {
            return false;
        }
        self.health = self.health.saturating_sub(self.rules.damage_per_hit);
        log::debug!("damage taken, health {}/{}", self.health, self.rules.max_health);
        self.health == 0
    }

    /// One-shot. Returns false if the session had already ended.
    pub fn end_session(&mut self, cleared: bool, now_ms: f64) -> bool {
        if self.is_ended() {
            return false;
        }
        self.ended = Some(SessionEnd {
            cleared,
            at_ms: now_ms,
        });
        log::info!(
            "session {}: score {}, max combo {}, walls {}",
            if cleared { "cleared" } else { "lost" },
            self.score,
            self.max_combo,
            self.walls_destroyed
        );
        true
    }

    /// Whole seconds left on the end screen, or `None` while still playing.
    pub fn remaining_countdown(&self, now_ms: f64) -> Option<u32> {
        let end = self.ended?;
        let duration = if end.cleared {
            self.rules.clear_countdown_ms
        } else {
            self.rules.defeat_countdown_ms
        };
        let remaining = ((duration - (now_ms - end.at_ms)) / 1000.0).ceil();
        Some(remaining.max(0.0) as u32)
    }

    pub fn countdown_finished(&self, now_ms: f64) -> bool {
        self.remaining_countdown(now_ms) == Some(0)
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.rules);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> ScoreLedger {
        ScoreLedger::new(ScoringRules::default())
    }

    #[test]
    fn test_multiplier_steps_are_monotonic() {
        assert_eq!(combo_multiplier(0), 1.0);
        assert_eq!(combo_multiplier(9), 1.0);
        assert_eq!(combo_multiplier(10), 1.2);
        assert_eq!(combo_multiplier(20), 1.5);
        assert_eq!(combo_multiplier(30), 1.8);
        assert_eq!(combo_multiplier(50), 2.0);
        assert_eq!(combo_multiplier(99), 2.0);
        assert_eq!(combo_multiplier(100), 2.5);
        let mut last = 0.0;
        for combo in 0..250 {
            let m = combo_multiplier(combo);
            assert!(m >= last);
            last = m;
        }
    }

    #[test]
    fn test_combo_counts_itself() {
        let mut l = ledger();
        for _ in 0..9 {
            assert_eq!(l.record_judgment(Judgment::Good), 15);
        }
        // Tenth hit is scored at x1.2.
        assert_eq!(l.record_judgment(Judgment::Good), 18);
        assert_eq!(l.combo(), 10);
        assert_eq!(l.counts().good, 10);
        assert_eq!(l.walls_destroyed(), 10);
    }

    #[test]
    fn test_break_then_wow() {
        let mut l = ledger();
        for _ in 0..25 {
            l.record_judgment(Judgment::Great);
        }
        let before = l.score();
        l.break_combo();
        assert_eq!(l.combo(), 0);
        assert_eq!(l.max_combo(), 25);
        assert_eq!(l.score(), before);
        l.record_judgment(Judgment::Wow);
        assert_eq!(l.combo(), 1);
        assert_eq!(l.multiplier(), 1.0);
        assert_eq!(l.score(), before + 50);
        assert_eq!(l.max_combo(), 25);
    }

    #[test]
    fn test_miss_is_counted_only() {
        let mut l = ledger();
        l.record_judgment(Judgment::Wow);
        l.record_miss();
        assert_eq!(l.counts().miss, 1);
        assert_eq!(l.combo(), 1);
        assert_eq!(l.score(), 50);
        assert_eq!(l.counts().total(), 2);
    }

    #[test]
    fn test_seventh_hit_is_fatal() {
        let mut l = ledger();
        for hit in 1..=7 {
            let dead = l.take_damage();
            assert_eq!(dead, hit == 7, "hit {}", hit);
        }
        assert_eq!(l.health(), 0);
        assert!(!l.take_damage());
        assert_eq!(l.health(), 0);
    }

    #[test]
    fn test_frozen_after_end() {
        let mut l = ledger();
        l.record_judgment(Judgment::Wow);
        assert!(l.end_session(true, 1_000.0));
        assert!(!l.end_session(false, 2_000.0));
        assert_eq!(l.record_judgment(Judgment::Wow), 0);
        l.record_miss();
        l.break_combo();
        assert!(!l.take_damage());
        assert_eq!(l.score(), 50);
        assert_eq!(l.combo(), 1);
        assert_eq!(l.health(), 7);
        assert_eq!(l.counts().miss, 0);
        assert_eq!(l.ended(), Some(SessionEnd { cleared: true, at_ms: 1_000.0 }));
    }

    #[test]
    fn test_countdowns() {
        let mut l = ledger();
        assert_eq!(l.remaining_countdown(0.0), None);
        l.end_session(false, 1_000.0);
        assert_eq!(l.remaining_countdown(1_000.0), Some(10));
        assert_eq!(l.remaining_countdown(1_001.0), Some(10));
        assert_eq!(l.remaining_countdown(2_000.0), Some(9));
        assert_eq!(l.remaining_countdown(11_000.0), Some(0));
        assert!(l.countdown_finished(50_000.0));

        let mut l = ledger();
        l.end_session(true, 0.0);
        assert_eq!(l.remaining_countdown(0.0), Some(120));
    }

    #[test]
    fn test_reset_restores_fresh_state() {
        let mut l = ledger();
        l.record_judgment(Judgment::Wow);
        l.take_damage();
        l.end_session(false, 0.0);
        l.reset();
        assert_eq!(l.score(), 0);
        assert_eq!(l.health(), 7);
        assert!(!l.is_ended());
    }
}
