//! Character state machine.
//!
//! All timestamps are music time in milliseconds so a paused session freezes
//! animations, invincibility and the input buffer along with the walls.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::config::CombatRules;
use crate::obstacle::FRAME_MS;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum CombatState {
    Idle,
    Run,
    RightPunch,
    LeftPunch,
    Uppercut,
    JumpPunch,
    Damaged,
    Dead,
}

impl CombatState {
    pub fn is_attacking(self) -> bool {
        matches!(
            self,
            CombatState::RightPunch
                | CombatState::LeftPunch
                | CombatState::Uppercut
                | CombatState::JumpPunch
        )
    }

    /// Punch for a combo step (0, 1, 2).
    fn punch(step: u8) -> CombatState {
        match step % 3 {
            0 => CombatState::RightPunch,
            1 => CombatState::LeftPunch,
            _ => CombatState::Uppercut,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Intent {
    Attack,
    Jump,
}

/// Holds at most one pending intent. A newer press overwrites the old one.
#[derive(Clone, Copy, Debug)]
pub struct InputBuffer {
    window_ms: f64,
    pending: Option<(Intent, f64)>,
}

impl InputBuffer {
    pub fn new(window_ms: f64) -> Self {
        Self {
            window_ms,
            pending: None,
        }
    }

    pub fn push(&mut self, intent: Intent, now_ms: f64) {
        self.pending = Some((intent, now_ms));
    }

    /// Take the pending intent if it is still inside the window. Stale intents
    /// are dropped.
    pub fn take(&mut self, now_ms: f64) -> Option<Intent> {
        let (intent, at) = self.pending.take()?;
        if now_ms - at > self.window_ms {
            log::debug!("buffered {:?} expired after {:.0} ms", intent, now_ms - at);
            return None;
        }
        Some(intent)
    }

    pub fn peek(&self) -> Option<Intent> {
        self.pending.map(|(intent, _)| intent)
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

/// Vertical jump offset, integrated per reference frame. `offset` is
/// negative while airborne (screen y grows downwards).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JumpPhysics {
    pub offset: f64,
    pub velocity: f64,
    pub airborne: bool,
}

impl JumpPhysics {
    fn launch(&mut self, speed: f64) {
        if !self.airborne {
            self.airborne = true;
            self.velocity = speed;
        }
    }

    fn land(&mut self) {
        *self = JumpPhysics::default();
    }

    /// Integrate `dt_ms`; returns true on the tick the character lands.
    fn step(&mut self, gravity: f64, dt_ms: f64) -> bool {
        if !self.airborne {
            return false;
        }
        let frames = dt_ms / FRAME_MS;
        self.velocity += gravity * frames;
        self.offset += self.velocity * frames;
        if self.offset >= 0.0 {
            self.land();
            return true;
        }
        false
    }
}

pub struct CombatStateMachine {
    rules: CombatRules,
    state: CombatState,
    entered_at_ms: f64,
    combo_step: u8,
    buffer: InputBuffer,
    jump: JumpPhysics,
    invincible_until_ms: Option<f64>,
}

impl CombatStateMachine {
    pub fn new(rules: CombatRules) -> Self {
        Self {
            rules,
            state: CombatState::Idle,
            entered_at_ms: 0.0,
            combo_step: 0,
            buffer: InputBuffer::new(rules.input_buffer_ms),
            jump: JumpPhysics::default(),
            invincible_until_ms: None,
        }
    }

    pub fn state(&self) -> CombatState {
        self.state
    }

    /// Next punch in the cycle: 0 right, 1 left, 2 uppercut.
    pub fn combo_step(&self) -> u8 {
        self.combo_step
    }

    pub fn jump(&self) -> JumpPhysics {
        self.jump
    }

    pub fn buffered(&self) -> Option<Intent> {
        self.buffer.peek()
    }

    pub fn is_attacking(&self) -> bool {
        self.state.is_attacking()
    }

    pub fn is_invincible(&self, now_ms: f64) -> bool {
        self.invincible_until_ms.is_some_and(|until| now_ms < until)
    }

    /// Same-state entries are ignored except for `Dead`; once dead only `Idle`
    /// is reachable.
    fn transition(&mut self, next: CombatState, now_ms: f64) -> bool {
        if self.state == next && next != CombatState::Dead {
            return false;
        }
        if self.state == CombatState::Dead && !matches!(next, CombatState::Idle | CombatState::Dead) {
            return false;
        }
        log::debug!("combat {:?} -> {:?}", self.state, next);
        self.state = next;
        self.entered_at_ms = now_ms;
        match next {
            CombatState::JumpPunch => self.jump.launch(self.rules.jump_speed),
            CombatState::Idle => self.jump.land(),
            _ => {}
        }
        true
    }

    /// Session start: the character starts running.
    pub fn start(&mut self, now_ms: f64) {
        self.transition(CombatState::Run, now_ms);
    }

    /// Attack press. Interrupts any running attack immediately; buffered while
    /// the character is reeling from a hit. Returns whether a punch started.
    /// Repeating the punch already playing does not restart it.
    pub fn press_attack(&mut self, now_ms: f64) -> bool {
        match self.state {
            CombatState::Dead => false,
            CombatState::Damaged => {
                self.buffer.push(Intent::Attack, now_ms);
                false
            }
            _ => {
                let punch = CombatState::punch(self.combo_step);
                self.combo_step = (self.combo_step + 1) % 3;
                self.transition(punch, now_ms)
            }
        }
    }

    /// Jump press. Buffered while reeling from a hit.
    pub fn press_jump(&mut self, now_ms: f64) -> bool {
        match self.state {
            CombatState::Dead => false,
            CombatState::Damaged => {
                self.buffer.push(Intent::Jump, now_ms);
                false
            }
            _ => {
                self.transition(CombatState::JumpPunch, now_ms);
                self.state == CombatState::JumpPunch
            }
        }
    }

    pub fn reset_combo_step(&mut self) {
        self.combo_step = 0;
    }

    /// Dropped on pause so nothing fires on resume.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    fn animation_ms(&self) -> Option<f64> {
        match self.state {
            CombatState::RightPunch | CombatState::LeftPunch | CombatState::Uppercut => {
                Some(self.rules.punch_ms)
            }
            CombatState::JumpPunch => Some(self.rules.jump_punch_ms),
            CombatState::Damaged => Some(self.rules.damaged_ms),
            _ => None,
        }
    }

    /// Advance animations and jump physics. Returns the buffered intent that
    /// was executed this tick, if any.
    pub fn update(&mut self, now_ms: f64, dt_ms: f64) -> Option<Intent> {
        let mut executed = None;
        if let Some(until) = self.invincible_until_ms {
            if now_ms >= until {
                self.invincible_until_ms = None;
            }
        }

        let finished = self
            .animation_ms()
            .is_some_and(|duration| now_ms - self.entered_at_ms >= duration);
        if finished {
            if self.state == CombatState::Damaged {
                self.invincible_until_ms = Some(now_ms + self.rules.invincibility_ms);
                self.transition(CombatState::Run, now_ms);
                executed = self.buffer.take(now_ms);
                match executed {
                    Some(Intent::Attack) => {
                        self.press_attack(now_ms);
                    }
                    Some(Intent::Jump) => {
                        self.press_jump(now_ms);
                    }
                    None => {}
                }
            } else {
                self.transition(CombatState::Run, now_ms);
            }
        }

        if self.jump.step(self.rules.gravity, dt_ms) && self.state == CombatState::JumpPunch {
            self.transition(CombatState::Run, now_ms);
        }
        executed
    }

    /// Hit by a wall. Overrides everything but death.
    pub fn damage(&mut self, now_ms: f64) {
        self.transition(CombatState::Damaged, now_ms);
    }

    pub fn kill(&mut self, now_ms: f64) {
        self.buffer.clear();
        self.transition(CombatState::Dead, now_ms);
    }

    /// The only way out of `Dead`.
    pub fn reset(&mut self, now_ms: f64) {
        self.transition(CombatState::Idle, now_ms);
        self.combo_step = 0;
        self.buffer.clear();
        self.invincible_until_ms = None;
    }

    /// How far the current state's animation has played, in `[0, 1]`.
    /// `None` for looping states (idle, run).
    pub fn animation_progress(&self, now_ms: f64) -> Option<f64> {
        let length = match self.state {
            CombatState::Dead => Some(self.rules.death_ms),
            _ => self.animation_ms(),
        }?;
        Some((self.state_elapsed(now_ms) / length).clamp(0.0, 1.0))
    }

    /// Milliseconds spent in the current state.
    pub fn state_elapsed(&self, now_ms: f64) -> f64 {
        now_ms - self.entered_at_ms
    }
}

/// Per-attack bookkeeping carried from one tick to the next: whether the
/// current attack may still judge a wall and whether it has landed a hit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AttackResolutionContext {
    pub was_attacking_last_tick: bool,
    pub can_judge_current_attack: bool,
    pub hit_landed_this_attack: bool,
    pub last_attack_state: Option<CombatState>,
}

impl AttackResolutionContext {
    /// Fold this tick's combat state in. The flag is true when an attack just
    /// ended or was replaced without landing a hit, which breaks the combo.
    pub fn begin_tick(self, state: CombatState) -> (Self, bool) {
        let attacking = state.is_attacking();
        let started = !self.was_attacking_last_tick && attacking;
        let switched = attacking && self.last_attack_state.is_some_and(|last| last != state);
        let ended = self.was_attacking_last_tick && !attacking;

        let mut next = self;
        let break_combo = (switched || ended) && !self.hit_landed_this_attack;
        if started || switched {
            next.can_judge_current_attack = true;
            next.hit_landed_this_attack = false;
        }
        if ended {
            next.can_judge_current_attack = false;
            next.hit_landed_this_attack = false;
            next.last_attack_state = None;
        }
        next.was_attacking_last_tick = attacking;
        if attacking {
            next.last_attack_state = Some(state);
        }
        (next, break_combo)
    }

    pub fn can_judge(&self) -> bool {
        self.was_attacking_last_tick && self.can_judge_current_attack
    }

    /// One destroyed wall per attack.
    pub fn record_hit(self) -> Self {
        Self {
            can_judge_current_attack: false,
            hit_landed_this_attack: true,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> CombatStateMachine {
        let mut machine = CombatStateMachine::new(CombatRules::default());
        machine.start(0.0);
        machine
    }

    #[test]
    fn test_starts_idle_then_runs() {
        let mut machine = CombatStateMachine::new(CombatRules::default());
        assert_eq!(machine.state(), CombatState::Idle);
        machine.start(0.0);
        assert_eq!(machine.state(), CombatState::Run);
    }

    #[test]
    fn test_attack_cycles_and_interrupts() {
        let mut machine = running();
        assert!(machine.press_attack(10.0));
        assert_eq!(machine.state(), CombatState::RightPunch);
        assert!(machine.press_attack(20.0));
        assert_eq!(machine.state(), CombatState::LeftPunch);
        assert!(machine.press_attack(30.0));
        assert_eq!(machine.state(), CombatState::Uppercut);
        assert_eq!(machine.combo_step(), 0);
        assert!(machine.press_attack(40.0));
        assert_eq!(machine.state(), CombatState::RightPunch);
    }

    #[test]
    fn test_attack_returns_to_run_when_animation_ends() {
        let mut machine = running();
        machine.press_attack(100.0);
        machine.update(200.0, 16.0);
        assert_eq!(machine.state(), CombatState::RightPunch);
        machine.update(220.0, 16.0);
        assert_eq!(machine.state(), CombatState::Run);
        // The cycle position survives the return to Run.
        machine.press_attack(300.0);
        assert_eq!(machine.state(), CombatState::LeftPunch);
    }

    #[test]
    fn test_reset_combo_step() {
        let mut machine = running();
        machine.press_attack(0.0);
        machine.press_attack(10.0);
        machine.reset_combo_step();
        machine.update(200.0, 16.0);
        machine.press_attack(210.0);
        assert_eq!(machine.state(), CombatState::RightPunch);
    }

    #[test]
    fn test_repeated_punch_is_not_restarted() {
        let mut machine = running();
        assert!(machine.press_attack(0.0));
        machine.reset_combo_step();
        assert!(!machine.press_attack(100.0));
        assert_eq!(machine.state(), CombatState::RightPunch);
        assert_eq!(machine.state_elapsed(100.0), 100.0);
        machine.update(125.0, 16.0);
        assert_eq!(machine.state(), CombatState::Run);
    }

    #[test]
    fn test_animation_progress() {
        let mut machine = running();
        assert_eq!(machine.animation_progress(0.0), None);
        machine.press_attack(100.0);
        assert_eq!(machine.animation_progress(160.0), Some(0.5));
        machine.kill(200.0);
        assert_eq!(machine.animation_progress(450.0), Some(0.25));
        assert_eq!(machine.animation_progress(9_000.0), Some(1.0));
    }

    #[test]
    fn test_jump_punch_lands_back_to_run() {
        let mut rules = CombatRules::default();
        // Keep the animation longer than the jump so landing decides.
        rules.jump_punch_ms = 10_000.0;
        let mut machine = CombatStateMachine::new(rules);
        machine.start(0.0);
        assert!(machine.press_jump(0.0));
        assert_eq!(machine.state(), CombatState::JumpPunch);
        assert!(machine.jump().airborne);
        let mut now = 0.0;
        let mut peak: f64 = 0.0;
        while machine.jump().airborne && now < 5_000.0 {
            now += FRAME_MS;
            machine.update(now, FRAME_MS);
            peak = peak.min(machine.jump().offset);
        }
        assert!(!machine.jump().airborne);
        assert_eq!(machine.state(), CombatState::Run);
        // v0 = -15, g = 1: apex after 15 frames at -105 px.
        assert!((peak + 105.0).abs() < 1e-6);
    }

    #[test]
    fn test_damage_overrides_and_grants_invincibility() {
        let rules = CombatRules::default();
        let mut machine = running();
        machine.press_attack(0.0);
        machine.damage(50.0);
        assert_eq!(machine.state(), CombatState::Damaged);
        assert!(!machine.is_invincible(60.0));
        machine.update(50.0 + rules.damaged_ms, 16.0);
        assert_eq!(machine.state(), CombatState::Run);
        let recovered = 50.0 + rules.damaged_ms;
        assert!(machine.is_invincible(recovered + 1_999.0));
        assert!(!machine.is_invincible(recovered + rules.invincibility_ms));
    }

    #[test]
    fn test_input_buffered_during_damage_runs_on_recovery() {
        let mut machine = running();
        machine.damage(0.0);
        assert!(!machine.press_attack(20.0));
        assert_eq!(machine.buffered(), Some(Intent::Attack));
        assert_eq!(machine.update(140.0, 16.0), Some(Intent::Attack));
        assert_eq!(machine.state(), CombatState::RightPunch);
    }

    #[test]
    fn test_newer_input_overwrites_buffer() {
        let mut machine = running();
        machine.damage(0.0);
        machine.press_attack(10.0);
        machine.press_jump(20.0);
        assert_eq!(machine.update(140.0, 16.0), Some(Intent::Jump));
        assert_eq!(machine.state(), CombatState::JumpPunch);
    }

    #[test]
    fn test_stale_buffer_is_dropped() {
        let mut buffer = InputBuffer::new(500.0);
        buffer.push(Intent::Attack, 0.0);
        assert_eq!(buffer.take(501.0), None);
        assert_eq!(buffer.peek(), None);
        buffer.push(Intent::Jump, 0.0);
        assert_eq!(buffer.take(500.0), Some(Intent::Jump));
    }

    #[test]
    fn test_dead_rejects_everything_but_reset() {
        let mut machine = running();
        machine.kill(0.0);
        assert_eq!(machine.state(), CombatState::Dead);
        assert!(!machine.press_attack(10.0));
        assert!(!machine.press_jump(10.0));
        machine.damage(20.0);
        machine.start(30.0);
        machine.update(5_000.0, 16.0);
        assert_eq!(machine.state(), CombatState::Dead);
        // Re-entering Dead restarts its timer.
        machine.kill(6_000.0);
        assert_eq!(machine.state_elapsed(6_000.0), 0.0);
        machine.reset(7_000.0);
        assert_eq!(machine.state(), CombatState::Idle);
    }

    #[test]
    fn test_same_state_is_a_no_op() {
        let mut machine = running();
        machine.press_jump(0.0);
        machine.press_jump(100.0);
        assert_eq!(machine.state_elapsed(100.0), 100.0);
    }

    #[test]
    fn test_context_breaks_combo_on_whiffed_attack() {
        let ctx = AttackResolutionContext::default();
        let (ctx, brk) = ctx.begin_tick(CombatState::Run);
        assert!(!brk && !ctx.can_judge());

        let (ctx, brk) = ctx.begin_tick(CombatState::RightPunch);
        assert!(!brk);
        assert!(ctx.can_judge());

        // Switching to the next punch without a hit breaks the combo.
        let (ctx, brk) = ctx.begin_tick(CombatState::LeftPunch);
        assert!(brk);
        assert!(ctx.can_judge());

        let ctx = ctx.record_hit();
        assert!(!ctx.can_judge());
        let (ctx, brk) = ctx.begin_tick(CombatState::LeftPunch);
        assert!(!brk && !ctx.can_judge());

        // Ending after a hit keeps the combo.
        let (ctx, brk) = ctx.begin_tick(CombatState::Run);
        assert!(!brk);
        assert_eq!(ctx, AttackResolutionContext::default());
    }

    #[test]
    fn test_context_breaks_when_attack_ends_empty() {
        let (ctx, _) = AttackResolutionContext::default().begin_tick(CombatState::Uppercut);
        let (_, brk) = ctx.begin_tick(CombatState::Damaged);
        assert!(brk);
    }
}
