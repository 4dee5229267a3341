//! Browser driver.
//!
//! Owns the running `GameSession`, drives it from `requestAnimationFrame` and
//! turns key presses into intents. Drawing and audio playback stay in JS,
//! which reads `snapshot_json()` each frame and reports audio readiness with
//! `audio_ready()`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::window;

use crate::clock::{AudioLoadWatchdog, DEFAULT_AUDIO_LOAD_TIMEOUT_MS, LoadStatus};
use crate::config::GameRules;
use crate::ranking::{Leaderboard, RankEntry, RankingStore, RankingTable};
use crate::session::{GameSession, SessionPhase, SessionSnapshot};
use crate::tracks::TrackSelector;

/// Used until the host reports the real length of a song's audio.
const DEFAULT_TRACK_DURATION_MS: f64 = 180_000.0;

pub const RANKING_STORAGE_KEY: &str = "ppusyong_rankings";

fn now_ms() -> f64 {
    window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

fn seed() -> u64 {
    #[cfg(feature = "rng")]
    {
        let mut buf = [0u8; 8];
        if getrandom::getrandom(&mut buf).is_ok() {
            return u64::from_le_bytes(buf);
        }
    }
    now_ms().to_bits()
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

struct WebGame {
    selector: TrackSelector,
    durations: Vec<f64>,
    rules: GameRules,
    session: GameSession,
    watchdog: AudioLoadWatchdog,
    audio: LoadStatus,
    flash: bool,
    damaged: bool,
}

impl WebGame {
    fn new(track_index: usize, duration_ms: f64, now: f64) -> Result<Self, JsValue> {
        let mut selector = TrackSelector::default();
        selector.select(track_index);
        let mut durations = vec![DEFAULT_TRACK_DURATION_MS; selector.len()];
        if duration_ms > 0.0 {
            if let Some(slot) = durations.get_mut(selector.index()) {
                *slot = duration_ms;
            }
        }
        let rules = GameRules::default();
        let session = build_session(&selector, &durations, rules)?;
        Ok(Self {
            selector,
            durations,
            rules,
            session,
            watchdog: AudioLoadWatchdog::new(now, DEFAULT_AUDIO_LOAD_TIMEOUT_MS),
            audio: LoadStatus::Pending,
            flash: false,
            damaged: false,
        })
    }

    fn song(&self) -> String {
        self.session.track().name.clone()
    }

    fn rebuild(&mut self, now: f64) {
        match build_session(&self.selector, &self.durations, self.rules) {
            Ok(session) => {
                self.session = session;
                self.watchdog = AudioLoadWatchdog::new(now, DEFAULT_AUDIO_LOAD_TIMEOUT_MS);
                self.audio = LoadStatus::Pending;
            }
            Err(e) => log::warn!("could not load track: {:?}", e),
        }
    }

    fn restart(&mut self) {
        if let Err(e) = self.session.reset() {
            log::warn!("could not restart session: {}", e);
        }
    }

    fn try_start(&mut self, now: f64) -> bool {
        if self.audio == LoadStatus::Pending {
            log::info!("waiting for audio before starting");
            return false;
        }
        self.session.start(now)
    }

    /// Returns true when the key was consumed.
    fn handle_key(&mut self, key: &str, now: f64) -> bool {
        let phase = self.session.phase();
        match key {
            " " => match phase {
                SessionPhase::Ready => self.try_start(now),
                SessionPhase::Playing => self.session.press_jump(now),
                _ => false,
            },
            "a" | "A" => self.session.press_attack(now),
            "r" | "R" => {
                self.session.reset_combo_step();
                true
            }
            "Escape" if matches!(phase, SessionPhase::Playing | SessionPhase::Paused) => {
                log::info!("{:?}", self.session.toggle_pause(now));
                true
            }
            "ArrowLeft" | "ArrowRight" if phase == SessionPhase::Ready => {
                if key == "ArrowRight" {
                    self.selector.next();
                } else {
                    self.selector.prev();
                }
                self.rebuild(now);
                true
            }
            "Enter" if phase == SessionPhase::Ended => {
                self.restart();
                true
            }
            _ => false,
        }
    }

    fn frame(&mut self, ts: f64) {
        if self.audio == LoadStatus::Pending {
            self.audio = self.watchdog.poll(ts);
        }
        let report = self.session.tick(ts);
        self.flash = report.speed_change.as_ref().is_some_and(|c| c.sped_up);
        self.damaged = report.damaged;
        if self.session.phase() == SessionPhase::Ended && self.session.ledger().countdown_finished(ts) {
            self.restart();
        }
    }
}

fn build_session(
    selector: &TrackSelector,
    durations: &[f64],
    rules: GameRules,
) -> Result<GameSession, JsValue> {
    let preset = selector
        .current()
        .ok_or_else(|| JsValue::from_str("no tracks"))?;
    let duration_ms = durations
        .get(selector.index())
        .copied()
        .unwrap_or(DEFAULT_TRACK_DURATION_MS);
    GameSession::new(
        preset.config.clone(),
        rules,
        Box::new(SmallRng::seed_from_u64(seed())),
        duration_ms,
    )
    .map_err(js_err)
}

thread_local! {
    static GAME: RefCell<Option<WebGame>> = const { RefCell::new(None) };
    static WIRED: Cell<bool> = const { Cell::new(false) };
}

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// Load a track and wait for the start key. The keyboard listener and frame
/// loop are installed on the first call only.
#[wasm_bindgen]
pub fn start_game(track_index: usize, duration_ms: f64) -> Result<(), JsValue> {
    let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let doc = win
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let game = WebGame::new(track_index, duration_ms, now_ms())?;
    log::info!("loaded {}", game.song());
    GAME.with(|cell| *cell.borrow_mut() = Some(game));

    if WIRED.with(|wired| wired.replace(true)) {
        return Ok(());
    }
    let closure = Closure::wrap(Box::new(move |evt: web_sys::KeyboardEvent| {
        let consumed = GAME.with(|cell| {
            cell.borrow_mut()
                .as_mut()
                .is_some_and(|game| game.handle_key(&evt.key(), now_ms()))
        });
        if consumed {
            evt.prevent_default();
        }
    }) as Box<dyn FnMut(_)>);
    doc.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())?;
    closure.forget();

    start_loop();
    Ok(())
}

fn start_loop() {
    let f: FrameCallback = Rc::new(RefCell::new(None));
    let g = f.clone();
    *g.borrow_mut() = Some(Closure::wrap(Box::new(move |ts: f64| {
        GAME.with(|cell| {
            if let Some(game) = cell.borrow_mut().as_mut() {
                game.frame(ts);
            }
        });
        if let (Some(w), Some(cb)) = (window(), f.borrow().as_ref()) {
            let _ = w.request_animation_frame(cb.as_ref().unchecked_ref());
        }
    }) as Box<dyn FnMut(f64)>));
    if let (Some(w), Some(cb)) = (window(), g.borrow().as_ref()) {
        let _ = w.request_animation_frame(cb.as_ref().unchecked_ref());
    }
}

/// Audio for the selected track finished loading.
#[wasm_bindgen]
pub fn audio_ready() {
    GAME.with(|cell| {
        if let Some(game) = cell.borrow_mut().as_mut() {
            game.watchdog.mark_ready();
            game.audio = game.watchdog.poll(now_ms());
        }
    });
}

/// Record the real length of a song once its audio metadata is known.
#[wasm_bindgen]
pub fn set_track_duration(track_index: usize, duration_ms: f64) {
    GAME.with(|cell| {
        if let Some(game) = cell.borrow_mut().as_mut() {
            let Some(slot) = game.durations.get_mut(track_index) else {
                return;
            };
            *slot = duration_ms;
            if track_index == game.selector.index() && game.session.phase() == SessionPhase::Ready {
                match build_session(&game.selector, &game.durations, game.rules) {
                    Ok(session) => game.session = session,
                    Err(e) => log::warn!("rejected duration {}: {:?}", duration_ms, e),
                }
            }
        }
    });
}

#[derive(serde::Serialize)]
struct WebFrame<'a> {
    #[serde(flatten)]
    snapshot: &'a SessionSnapshot,
    track_index: usize,
    audio_file: &'static str,
    lyrics_file: Option<&'static str>,
    volume: f64,
    audio: LoadStatus,
    flash: bool,
    damaged: bool,
}

/// Everything the renderer needs for the current frame, as JSON.
#[wasm_bindgen]
pub fn snapshot_json() -> Result<String, JsValue> {
    GAME.with(|cell| {
        let borrow = cell.borrow();
        let game = borrow
            .as_ref()
            .ok_or_else(|| JsValue::from_str("game not started"))?;
        let preset = game
            .selector
            .current()
            .ok_or_else(|| JsValue::from_str("no tracks"))?;
        let snapshot = game.session.snapshot(now_ms());
        serde_json::to_string(&WebFrame {
            snapshot: &snapshot,
            track_index: game.selector.index(),
            audio_file: preset.audio_file,
            lyrics_file: preset.lyrics_file,
            volume: preset.volume,
            audio: game.audio,
            flash: game.flash,
            damaged: game.damaged,
        })
        .map_err(js_err)
    })
}

/// Whether the finished session's score would make the current song's table.
#[wasm_bindgen]
pub fn can_enter_ranking() -> Result<bool, JsValue> {
    GAME.with(|cell| {
        let borrow = cell.borrow();
        let game = borrow
            .as_ref()
            .ok_or_else(|| JsValue::from_str("game not started"))?;
        if !game.session.ledger().is_ended() {
            return Ok(false);
        }
        let store = LocalStorageRankingStore::open(game.rules.ranking_capacity)?;
        Ok(store.can_enter(&game.song(), game.session.ledger().score()))
    })
}

/// Save the finished session under `name`. Returns the 1-based rank, or
/// `None` when the score did not place.
#[wasm_bindgen]
pub fn save_ranking(name: &str, date: &str) -> Result<Option<u32>, JsValue> {
    GAME.with(|cell| {
        let borrow = cell.borrow();
        let game = borrow
            .as_ref()
            .ok_or_else(|| JsValue::from_str("game not started"))?;
        let entry = game
            .session
            .rank_entry(name, date)
            .ok_or_else(|| JsValue::from_str("session has not ended"))?;
        let mut store = LocalStorageRankingStore::open(game.rules.ranking_capacity)?;
        Ok(store.save(&game.song(), entry).map(|rank| rank as u32))
    })
}

#[wasm_bindgen]
pub fn ranking_json(song: &str) -> Result<String, JsValue> {
    let store = LocalStorageRankingStore::open(GameRules::default().ranking_capacity)?;
    serde_json::to_string(&store.load(song)).map_err(js_err)
}

#[wasm_bindgen]
pub fn clear_ranking(song: &str) -> Result<(), JsValue> {
    LocalStorageRankingStore::open(GameRules::default().ranking_capacity)?.clear(song);
    Ok(())
}

#[wasm_bindgen]
pub fn clear_all_rankings() -> Result<(), JsValue> {
    LocalStorageRankingStore::open(GameRules::default().ranking_capacity)?.clear_all();
    Ok(())
}

/// Rankings kept in `localStorage` as one JSON object keyed by song name.
pub struct LocalStorageRankingStore {
    board: Leaderboard,
    storage: web_sys::Storage,
}

impl LocalStorageRankingStore {
    pub fn open(capacity: usize) -> Result<Self, JsValue> {
        let storage = window()
            .ok_or_else(|| JsValue::from_str("no window"))?
            .local_storage()?
            .ok_or_else(|| JsValue::from_str("no localStorage"))?;
        Ok(Self {
            board: Leaderboard::new(capacity),
            storage,
        })
    }

    fn read(&self) -> RankingTable {
        match self.storage.get_item(RANKING_STORAGE_KEY) {
            Ok(Some(text)) => serde_json::from_str(&text).unwrap_or_else(|e| {
                log::warn!("discarding unreadable rankings: {}", e);
                RankingTable::new()
            }),
            Ok(None) => RankingTable::new(),
            Err(e) => {
                log::warn!("localStorage read failed: {:?}", e);
                RankingTable::new()
            }
        }
    }

    fn write(&self, table: &RankingTable) {
        let result = serde_json::to_string(table)
            .map_err(js_err)
            .and_then(|text| self.storage.set_item(RANKING_STORAGE_KEY, &text));
        if let Err(e) = result {
            log::warn!("localStorage write failed: {:?}", e);
        }
    }
}

impl RankingStore for LocalStorageRankingStore {
    fn load(&self, song: &str) -> Vec<RankEntry> {
        self.read().remove(song).unwrap_or_default()
    }

    fn save(&mut self, song: &str, entry: RankEntry) -> Option<usize> {
        let mut table = self.read();
        let rank = self
            .board
            .place(table.entry(song.to_string()).or_default(), entry);
        if rank.is_some() {
            self.write(&table);
        }
        rank
    }

    fn can_enter(&self, song: &str, score: u64) -> bool {
        let table = self.read();
        self.board
            .qualifies(table.get(song).map_or(&[], |v| v.as_slice()), score)
    }

    fn clear(&mut self, song: &str) {
        let mut table = self.read();
        if table.remove(song).is_some() {
            self.write(&table);
        }
    }

    fn clear_all(&mut self) {
        if let Err(e) = self.storage.remove_item(RANKING_STORAGE_KEY) {
            log::warn!("localStorage clear failed: {:?}", e);
        }
    }
}
