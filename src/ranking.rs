//! Per-song high-score tables.
//!
//! `Leaderboard` holds the ordering rules; stores only decide where the
//! tables live. The browser store is in `web.rs`.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RankEntry {
    pub name: String,
    pub score: u64,
    #[cfg_attr(feature = "serde", serde(rename = "walls"))]
    pub walls_destroyed: u32,
    /// Display date, formatted by the host.
    pub date: String,
}

impl RankEntry {
    pub fn new(name: &str, score: u64, walls_destroyed: u32, date: &str) -> Self {
        Self {
            name: name.to_string(),
            score,
            walls_destroyed,
            date: date.to_string(),
        }
    }
}

/// All songs' tables keyed by song name.
pub type RankingTable = BTreeMap<String, Vec<RankEntry>>;

/// Ordering and capacity rules shared by every store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Leaderboard {
    capacity: usize,
}

impl Leaderboard {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `score` would make it onto a table holding `entries`.
    pub fn qualifies(&self, entries: &[RankEntry], score: u64) -> bool {
        if entries.len() < self.capacity {
            return true;
        }
        entries.last().is_some_and(|lowest| score > lowest.score)
    }

    /// Insert below every entry with an equal or higher score, then trim to
    /// capacity. Returns the 1-based rank, or `None` if the entry fell off.
    pub fn place(&self, entries: &mut Vec<RankEntry>, entry: RankEntry) -> Option<usize> {
        let index = entries.partition_point(|e| e.score >= entry.score);
        entries.insert(index, entry);
        entries.truncate(self.capacity);
        (index < self.capacity).then_some(index + 1)
    }
}

/// Key-value contract for ranking persistence.
pub trait RankingStore {
    /// Entries for `song`, best first.
    fn load(&self, song: &str) -> Vec<RankEntry>;

    /// Add an entry; returns its 1-based rank or `None` when not placed.
    fn save(&mut self, song: &str, entry: RankEntry) -> Option<usize>;

    fn can_enter(&self, song: &str, score: u64) -> bool;

    fn clear(&mut self, song: &str);

    fn clear_all(&mut self);
}

/// In-process store, used natively and in tests.
#[derive(Clone, Debug)]
pub struct MemoryRankingStore {
    board: Leaderboard,
    table: RankingTable,
}

impl MemoryRankingStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            board: Leaderboard::new(capacity),
            table: RankingTable::new(),
        }
    }

    pub fn table(&self) -> &RankingTable {
        &self.table
    }
}

impl RankingStore for MemoryRankingStore {
    fn load(&self, song: &str) -> Vec<RankEntry> {
        self.table.get(song).cloned().unwrap_or_default()
    }

    fn save(&mut self, song: &str, entry: RankEntry) -> Option<usize> {
        let entries = self.table.entry(song.to_string()).or_default();
        self.board.place(entries, entry)
    }

    fn can_enter(&self, song: &str, score: u64) -> bool {
        self.board
            .qualifies(self.table.get(song).map_or(&[], |v| v.as_slice()), score)
    }

    fn clear(&mut self, song: &str) {
        self.table.remove(song);
    }

    fn clear_all(&mut self) {
        self.table.clear();
    }
}
