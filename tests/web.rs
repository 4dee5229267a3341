// Browser-only checks: run with `wasm-pack test --headless --firefox`.
#![cfg(all(target_arch = "wasm32", feature = "serde_json"))]

use ppusyong::RankEntry;
use ppusyong::ranking::RankingStore;
use ppusyong::web::{LocalStorageRankingStore, snapshot_json, start_game};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn local_storage_store_survives_reopen() {
    let mut store = LocalStorageRankingStore::open(3).unwrap();
    store.clear_all();
    assert_eq!(store.save("BGM 1", RankEntry::new("a", 120, 2, "d")), Some(1));
    assert_eq!(store.save("BGM 1", RankEntry::new("b", 300, 6, "d")), Some(1));

    let reopened = LocalStorageRankingStore::open(3).unwrap();
    let entries = reopened.load("BGM 1");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "b");
    assert!(reopened.can_enter("BGM 1", 0));
    store.clear_all();
    assert!(reopened.load("BGM 1").is_empty());
}

#[wasm_bindgen_test]
fn started_game_waits_in_ready_phase() {
    start_game(1, 30_000.0).unwrap();
    let json = snapshot_json().unwrap();
    assert!(json.contains("\"phase\":\"Ready\""));
    assert!(json.contains("Before Sunrise Commute"));
    assert!(json.contains("\"audio\":\"Pending\""));
}
