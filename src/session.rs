//! One play-through of one track.
//!
//! `GameSession` owns every service and runs them in a fixed order per tick:
//! clock, due spawns, section speed, wall movement, character, attack
//! resolution, judgment and score, collision and damage, end detection.
//! Nothing outside the session mutates its parts.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::clock::TransportClock;
use crate::combat::{AttackResolutionContext, CombatState, CombatStateMachine};
use crate::config::{GameRules, TrackConfig};
use crate::error::ConfigError;
use crate::obstacle::{JudgmentOutcome, ObstacleRegistry, Wall};
use crate::pattern::{PatternGenerator, RandomSource};
use crate::ranking::RankEntry;
use crate::schedule::{BeatScheduler, WallSpawn};
use crate::score::{JudgmentCounts, ScoreLedger, SessionEnd};
use crate::speed::{SectionSpeedController, SpeedChange};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum SessionPhase {
    /// Loaded, waiting for the start input.
    Ready,
    Playing,
    Paused,
    Ended,
}

/// What happened during one tick, for the renderer and audio cues.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub music_time_ms: f64,
    pub spawned: Vec<u64>,
    /// Walls dropped by the spacing guard.
    pub skipped_spawns: u32,
    pub speed_change: Option<SpeedChange>,
    pub judgment: Option<JudgmentOutcome>,
    pub points: u32,
    pub combo_broken: bool,
    pub damaged: bool,
    pub died: bool,
    pub ended: Option<SessionEnd>,
}

pub struct GameSession {
    track: TrackConfig,
    rules: GameRules,
    duration_ms: f64,
    generator: PatternGenerator<Box<dyn RandomSource>>,
    scheduler: BeatScheduler,
    clock: TransportClock,
    speed: SectionSpeedController,
    obstacles: ObstacleRegistry,
    combat: CombatStateMachine,
    ledger: ScoreLedger,
    attack: AttackResolutionContext,
    phase: SessionPhase,
    last_music_ms: f64,
    last_damage_ms: Option<f64>,
    died_at_ms: Option<f64>,
    last_judgment: Option<JudgmentOutcome>,
}

impl GameSession {
    /// Validate the track against the rules and compile its schedule.
    pub fn new(
        track: TrackConfig,
        rules: GameRules,
        source: Box<dyn RandomSource>,
        duration_ms: f64,
    ) -> Result<Self, ConfigError> {
        track.validate(rules.playfield.max_speed_multiplier)?;
        let mut generator = PatternGenerator::new(source);
        let scheduler =
            BeatScheduler::compile(&track, duration_ms, &mut generator)?.with_fan_out(rules.fan_out);
        log::info!("session ready: {} ({:.0} ms)", track.name, duration_ms);
        Ok(Self {
            speed: SectionSpeedController::new(
                track.sections.clone(),
                rules.playfield.background_base_speed,
            ),
            obstacles: ObstacleRegistry::new(rules.playfield),
            combat: CombatStateMachine::new(rules.combat),
            ledger: ScoreLedger::new(rules.scoring),
            track,
            rules,
            duration_ms,
            generator,
            scheduler,
            clock: TransportClock::new(),
            attack: AttackResolutionContext::default(),
            phase: SessionPhase::Ready,
            last_music_ms: 0.0,
            last_damage_ms: None,
            died_at_ms: None,
            last_judgment: None,
        })
    }

    pub fn track(&self) -> &TrackConfig {
        &self.track
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn scheduler(&self) -> &BeatScheduler {
        &self.scheduler
    }

    pub fn obstacles(&self) -> &ObstacleRegistry {
        &self.obstacles
    }

    pub fn combat(&self) -> &CombatStateMachine {
        &self.combat
    }

    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    pub fn actor_x(&self) -> f64 {
        self.rules.playfield.character_x()
    }

    pub fn music_time(&self, now_ms: f64) -> f64 {
        self.clock.current_time(now_ms)
    }

    pub fn start(&mut self, now_ms: f64) -> bool {
        if self.phase != SessionPhase::Ready {
            return false;
        }
        self.clock.start(now_ms);
        self.combat.start(0.0);
        self.phase = SessionPhase::Playing;
        true
    }

    /// Pause or resume. Pausing drops any buffered input.
    pub fn toggle_pause(&mut self, now_ms: f64) -> SessionPhase {
        match self.phase {
            SessionPhase::Playing => {
                self.clock.pause(now_ms);
                self.combat.clear_buffer();
                self.phase = SessionPhase::Paused;
            }
            SessionPhase::Paused => {
                self.clock.resume(now_ms);
                self.phase = SessionPhase::Playing;
            }
            SessionPhase::Ready | SessionPhase::Ended => {}
        }
        self.phase
    }

    pub fn press_attack(&mut self, now_ms: f64) -> bool {
        if self.phase != SessionPhase::Playing {
            return false;
        }
        let t = self.clock.current_time(now_ms);
        self.combat.press_attack(t)
    }

    pub fn press_jump(&mut self, now_ms: f64) -> bool {
        if self.phase != SessionPhase::Playing {
            return false;
        }
        let t = self.clock.current_time(now_ms);
        self.combat.press_jump(t)
    }

    pub fn reset_combo_step(&mut self) {
        self.combat.reset_combo_step();
    }

    /// Run one simulation step at host time `now_ms`.
    pub fn tick(&mut self, now_ms: f64) -> TickReport {
        let mut report = TickReport {
            music_time_ms: self.clock.current_time(now_ms),
            ..TickReport::default()
        };
        match self.phase {
            SessionPhase::Ready | SessionPhase::Ended => return report,
            SessionPhase::Paused => {
                // Only wall-clock fan-out can still produce walls here.
                let walls = self.scheduler.due_wall_clock_walls(now_ms);
                self.spawn_walls(&walls, &mut report);
                return report;
            }
            SessionPhase::Playing => {}
        }

        let t = self.clock.tick(now_ms);
        let dt = (t - self.last_music_ms).max(0.0);
        self.last_music_ms = t;
        report.music_time_ms = t;

        let walls = self.scheduler.due_walls(t, now_ms);
        self.spawn_walls(&walls, &mut report);

        if let Some(change) = self.speed.update(t) {
            self.obstacles.set_speed_multiplier(change.multiplier);
            report.speed_change = Some(change);
        }

        self.obstacles.advance(dt);
        self.combat.update(t, dt);

        let (attack, break_combo) = self.attack.begin_tick(self.combat.state());
        self.attack = attack;
        if break_combo && self.ledger.combo() > 0 {
            self.ledger.break_combo();
            report.combo_broken = true;
        }
        self.resolve_attack(&mut report);
        self.resolve_collision(t, &mut report);
        self.detect_end(t, now_ms, &mut report);
        report
    }

    fn spawn_walls(&mut self, walls: &[WallSpawn], report: &mut TickReport) {
        for wall in walls {
            match self.obstacles.spawn(wall) {
                Some(id) => report.spawned.push(id),
                None => report.skipped_spawns += 1,
            }
        }
    }

    fn resolve_attack(&mut self, report: &mut TickReport) {
        if !self.attack.can_judge() {
            return;
        }
        let Some(outcome) = self.obstacles.judge(self.actor_x()) else {
            return;
        };
        if outcome.destroyed {
            report.points = self.ledger.record_judgment(outcome.tier);
            self.attack = self.attack.record_hit();
        } else {
            self.ledger.record_miss();
        }
        self.last_judgment = Some(outcome);
        report.judgment = Some(outcome);
    }

    fn resolve_collision(&mut self, t: f64, report: &mut TickReport) {
        let state = self.combat.state();
        if matches!(state, CombatState::Damaged | CombatState::Dead)
            || self.combat.is_invincible(t)
            || self.combat.is_attacking()
        {
            return;
        }
        if self
            .last_damage_ms
            .is_some_and(|at| t - at < self.rules.combat.damage_cooldown_ms)
        {
            return;
        }
        let actor_x = self.actor_x();
        if !self.obstacles.check_collision(actor_x) {
            return;
        }

        let dead = self.ledger.take_damage();
        self.last_damage_ms = Some(t);
        if self.ledger.combo() > 0 {
            self.ledger.break_combo();
            report.combo_broken = true;
        }
        self.obstacles.destroy_colliding(actor_x);
        report.damaged = true;
        if dead {
            log::info!("character died at music time {:.0}", t);
            self.combat.kill(t);
            self.died_at_ms = Some(t);
            report.died = true;
        } else {
            self.combat.damage(t);
        }
    }

    fn detect_end(&mut self, t: f64, now_ms: f64, report: &mut TickReport) {
        let cleared = match self.died_at_ms {
            Some(died) if t - died >= self.rules.combat.death_to_end_ms => false,
            Some(_) => return,
            None if t >= self.duration_ms => true,
            None => return,
        };
        if self.ledger.end_session(cleared, now_ms) {
            self.clock.stop();
            self.combat.reset(t);
            self.phase = SessionPhase::Ended;
            report.ended = self.ledger.ended();
        }
    }

    /// Fresh session on the same track. The schedule is drawn again from the
    /// same random source, so a new run gets new patterns.
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        self.scheduler = BeatScheduler::compile(&self.track, self.duration_ms, &mut self.generator)?
            .with_fan_out(self.rules.fan_out);
        self.clock.stop();
        self.speed.reset();
        self.obstacles.reset();
        self.combat.reset(0.0);
        self.ledger.reset();
        self.attack = AttackResolutionContext::default();
        self.phase = SessionPhase::Ready;
        self.last_music_ms = 0.0;
        self.last_damage_ms = None;
        self.died_at_ms = None;
        self.last_judgment = None;
        log::info!("session reset: {}", self.track.name);
        Ok(())
    }

    /// Ranking entry for a finished session.
    pub fn rank_entry(&self, name: &str, date: &str) -> Option<RankEntry> {
        self.ledger.is_ended().then(|| {
            RankEntry::new(
                name,
                self.ledger.score(),
                self.ledger.walls_destroyed(),
                date,
            )
        })
    }

    pub fn snapshot(&self, now_ms: f64) -> SessionSnapshot {
        let playfield = &self.rules.playfield;
        let t = self.clock.current_time(now_ms).max(self.last_music_ms);
        SessionSnapshot {
            phase: self.phase,
            track: self.track.name.clone(),
            music_time_ms: t,
            duration_ms: self.duration_ms,
            walls: self.obstacles.walls().to_vec(),
            character: CharacterView {
                state: self.combat.state(),
                x: playfield.character_x(),
                y: playfield.ground_y() + self.combat.jump().offset,
                combo_step: self.combat.combo_step(),
                animation_progress: self.combat.animation_progress(t),
                invincible: self.combat.is_invincible(t),
            },
            score: ScoreView {
                score: self.ledger.score(),
                combo: self.ledger.combo(),
                max_combo: self.ledger.max_combo(),
                multiplier: self.ledger.multiplier(),
                health: self.ledger.health(),
                max_health: self.ledger.max_health(),
                walls_destroyed: self.ledger.walls_destroyed(),
                counts: self.ledger.counts(),
            },
            speed_multiplier: self.obstacles.speed_multiplier(),
            background_speed: self.speed.background_speed(),
            last_judgment: self.last_judgment,
            ended: self.ledger.ended(),
            countdown_s: self.ledger.remaining_countdown(now_ms),
        }
    }
}

/// Read-only view handed to the renderer each frame.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub track: String,
    pub music_time_ms: f64,
    pub duration_ms: f64,
    pub walls: Vec<Wall>,
    pub character: CharacterView,
    pub score: ScoreView,
    pub speed_multiplier: f64,
    pub background_speed: f64,
    pub last_judgment: Option<JudgmentOutcome>,
    pub ended: Option<SessionEnd>,
    pub countdown_s: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CharacterView {
    pub state: CombatState,
    pub x: f64,
    pub y: f64,
    pub combo_step: u8,
    pub animation_progress: Option<f64>,
    pub invincible: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ScoreView {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub multiplier: f64,
    pub health: u32,
    pub max_health: u32,
    pub walls_destroyed: u32,
    pub counts: JudgmentCounts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ComboShape, CountRange, PatternProbabilities, Section};
    use crate::obstacle::FRAME_MS;
    use crate::pattern::ScriptedDraws;

    fn normal_track() -> TrackConfig {
        TrackConfig {
            name: "session-test".into(),
            bpm: 120.0,
            beat_offset_ms: 0.0,
            travel_time_ms: 2000.0,
            beat_division: 1,
            probabilities: PatternProbabilities {
                skip: 0.0,
                normal: 1.0,
                combo: 0.0,
                triple_combo: 0.0,
                rapid_combo: 0.0,
                delayed_combo: 0.0,
            },
            combo: ComboShape {
                combo_count: CountRange { min: 2, max: 3 },
                triple_count: 3,
                rapid_count: 5,
                delayed_count: 2,
                combo_division: 2,
                rapid_division: 4,
                delay_fraction: 0.3,
            },
            sections: vec![Section::new("all", 0.0, 1_000_000.0, 1.0)],
        }
    }

    fn session(track: TrackConfig, duration_ms: f64) -> GameSession {
        GameSession::new(
            track,
            GameRules::default(),
            Box::new(ScriptedDraws::new(vec![0.5])),
            duration_ms,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_section_faster_than_max() {
        let mut track = normal_track();
        track.sections[0].speed_multiplier = 2.5;
        let result = GameSession::new(
            track,
            GameRules::default(),
            Box::new(ScriptedDraws::new(vec![0.5])),
            10_000.0,
        );
        assert!(matches!(
            result,
            Err(ConfigError::SectionMultiplierTooHigh { .. })
        ));
    }

    #[test]
    fn test_ready_session_ignores_input_and_ticks() {
        let mut s = session(normal_track(), 10_000.0);
        assert!(!s.press_attack(0.0));
        let report = s.tick(1_000.0);
        assert!(report.spawned.is_empty());
        assert_eq!(s.phase(), SessionPhase::Ready);
        assert_eq!(s.combat().state(), CombatState::Idle);
    }

    #[test]
    fn test_first_wall_spawns_on_start() {
        let mut s = session(normal_track(), 10_000.0);
        assert!(s.start(0.0));
        assert_eq!(s.combat().state(), CombatState::Run);
        let report = s.tick(0.0);
        assert_eq!(report.spawned, vec![0]);
        assert_eq!(s.scheduler().events()[0].beat_index, 4);
    }

    #[test]
    fn test_pause_skips_simulation() {
        let mut s = session(normal_track(), 10_000.0);
        s.start(0.0);
        let mut now = 0.0;
        while now < 1_000.0 {
            s.tick(now);
            now += FRAME_MS;
        }
        let x_before = s.obstacles().walls()[0].x;
        let t_before = s.music_time(now);
        assert_eq!(s.toggle_pause(now), SessionPhase::Paused);
        for _ in 0..100 {
            now += FRAME_MS;
            let report = s.tick(now);
            assert!(report.spawned.is_empty());
            assert_eq!(report.music_time_ms, t_before);
        }
        assert_eq!(s.obstacles().walls()[0].x, x_before);
        assert!(!s.press_attack(now));
        assert_eq!(s.toggle_pause(now), SessionPhase::Playing);
        assert!((s.music_time(now) - t_before).abs() < 1e-6);
    }

    #[test]
    fn test_clears_at_track_end() {
        let mut track = normal_track();
        track.probabilities.normal = 0.0;
        track.probabilities.skip = 1.0;
        let mut s = session(track, 3_000.0);
        s.start(1_000.0);
        let mut now = 1_000.0;
        let mut ended = None;
        while ended.is_none() && now < 10_000.0 {
            now += FRAME_MS;
            ended = s.tick(now).ended;
        }
        let end = ended.unwrap();
        assert!(end.cleared);
        assert!(now >= 4_000.0);
        assert_eq!(s.phase(), SessionPhase::Ended);
        assert_eq!(s.combat().state(), CombatState::Idle);
        assert_eq!(s.ledger().remaining_countdown(now), Some(120));
        assert!(s.rank_entry("p", "today").is_some());
    }

    #[test]
    fn test_reset_returns_to_ready() {
        let mut s = session(normal_track(), 10_000.0);
        s.start(0.0);
        for frame in 0..120 {
            s.tick(frame as f64 * FRAME_MS);
        }
        assert!(!s.obstacles().walls().is_empty());
        s.reset().unwrap();
        assert_eq!(s.phase(), SessionPhase::Ready);
        assert!(s.obstacles().walls().is_empty());
        assert!(s.scheduler().events().iter().all(|e| !e.spawned));
        assert_eq!(s.ledger().health(), 7);
        assert!(s.rank_entry("p", "today").is_none());
    }
}
