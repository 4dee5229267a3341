//! Ppusyong core crate.
//!
//! A side-scrolling rhythm brawler: walls are spawned on the beat of a song
//! and must be punched inside a hit zone. The gameplay core (scheduling,
//! walls, combat, scoring) is plain Rust and runs natively under `cargo test`;
//! `web` wires it to the browser through wasm-bindgen.

use wasm_bindgen::prelude::*;

pub mod clock;
pub mod combat;
pub mod config;
pub mod error;
pub mod logger;
pub mod obstacle;
pub mod pattern;
pub mod ranking;
pub mod schedule;
pub mod score;
pub mod session;
pub mod speed;
pub mod tracks;
#[cfg(feature = "serde_json")]
pub mod web;

pub use clock::{AudioLoadWatchdog, LoadStatus, TransportClock};
pub use combat::{AttackResolutionContext, CombatState, CombatStateMachine, Intent};
pub use config::{FanOutTiming, GameRules, PatternProbabilities, Section, TrackConfig};
pub use error::ConfigError;
pub use obstacle::{Judgment, JudgmentOutcome, ObstacleRegistry, Wall};
pub use pattern::{PatternGenerator, PatternKind, PatternResult, RandomSource};
pub use ranking::{Leaderboard, MemoryRankingStore, RankEntry, RankingStore};
pub use schedule::{BeatScheduler, SpawnEvent, WallSpawn};
pub use score::ScoreLedger;
pub use session::{GameSession, SessionPhase, SessionSnapshot, TickReport};
pub use speed::SectionSpeedController;
pub use tracks::{TrackPreset, TrackSelector, tracks};

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logger::init(log::LevelFilter::Info);
}
