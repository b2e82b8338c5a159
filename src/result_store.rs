use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::types::{GameMode, ResultKind};

#[derive(Debug, Error)]
pub enum ResultStoreError {
    #[error("failed to create {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("player name is empty")]
    EmptyName,
}

/// Where finished matches are reported. Callers log failures and move on.
pub trait ResultStore: Send {
    fn record_result(
        &mut self,
        player: &str,
        mode: GameMode,
        result: ResultKind,
    ) -> Result<(), ResultStoreError>;

    fn reward_player(&mut self, player: &str, amount: i64) -> Result<(), ResultStoreError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeRecord {
    pub wins: u64,
    pub losses: u64,
    #[serde(default)]
    pub draws: u64,
}

impl ModeRecord {
    fn matches(&self) -> u64 {
        self.wins + self.losses + self.draws
    }

    fn absorb(&mut self, other: &ModeRecord) {
        self.wins += other.wins;
        self.losses += other.losses;
        self.draws += other.draws;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredPlayer {
    name: String,
    #[serde(default)]
    modes: BTreeMap<String, ModeRecord>,
    #[serde(default)]
    balance: i64,
    #[serde(rename = "updatedAtMs", alias = "updated_at_ms", default)]
    updated_at_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ResultFile {
    version: u8,
    players: HashMap<String, StoredPlayer>,
}

#[derive(Clone, Debug, Deserialize)]
struct ResultFileRaw {
    version: u8,
    players: HashMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResultEntry {
    pub name: String,
    pub matches: u64,
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    pub balance: i64,
    pub modes: BTreeMap<String, ModeRecord>,
    #[serde(rename = "updatedAtMs")]
    pub updated_at_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResultsResponse {
    #[serde(rename = "generatedAtIso")]
    pub generated_at_iso: String,
    pub entries: Vec<ResultEntry>,
}

/// Per-player results kept in one JSON file, rewritten after every update.
pub struct JsonResultStore {
    file_path: PathBuf,
    players: HashMap<String, StoredPlayer>,
}

impl JsonResultStore {
    pub fn new(file_path: PathBuf) -> Self {
        let players = load_players(&file_path);
        Self { file_path, players }
    }

    pub fn build_response(&self, requested_limit: Option<usize>) -> ResultsResponse {
        ResultsResponse {
            generated_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            entries: self.get_top(requested_limit),
        }
    }

    fn get_top(&self, requested_limit: Option<usize>) -> Vec<ResultEntry> {
        let limit = requested_limit.unwrap_or(10).clamp(1, 100);
        let mut entries: Vec<ResultEntry> = self
            .players
            .values()
            .map(|stored| {
                let mut total = ModeRecord::default();
                for record in stored.modes.values() {
                    total.absorb(record);
                }
                ResultEntry {
                    name: stored.name.clone(),
                    matches: total.matches(),
                    wins: total.wins,
                    losses: total.losses,
                    draws: total.draws,
                    balance: stored.balance,
                    modes: stored.modes.clone(),
                    updated_at_ms: stored.updated_at_ms,
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            b.wins
                .cmp(&a.wins)
                .then_with(|| win_rate(b).partial_cmp(&win_rate(a)).unwrap_or(Ordering::Equal))
                .then_with(|| b.balance.cmp(&a.balance))
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        entries.truncate(limit);
        entries
    }

    /// Entries are keyed case-insensitively; the latest spelling becomes the
    /// display name.
    fn entry(&mut self, player: &str) -> Result<&mut StoredPlayer, ResultStoreError> {
        let key = player_key(player);
        if key.is_empty() {
            return Err(ResultStoreError::EmptyName);
        }
        let stored = self.players.entry(key).or_insert_with(|| StoredPlayer {
            name: player.trim().to_string(),
            modes: BTreeMap::new(),
            balance: 0,
            updated_at_ms: 0,
        });
        stored.name = player.trim().to_string();
        stored.updated_at_ms = now_ms();
        Ok(stored)
    }

    fn save(&self) -> Result<(), ResultStoreError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).map_err(|source| ResultStoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload = ResultFile {
            version: 1,
            players: self.players.clone(),
        };
        let text = serde_json::to_string_pretty(&payload)?;
        fs::write(&self.file_path, text).map_err(|source| ResultStoreError::Write {
            path: self.file_path.clone(),
            source,
        })
    }
}

impl ResultStore for JsonResultStore {
    fn record_result(
        &mut self,
        player: &str,
        mode: GameMode,
        result: ResultKind,
    ) -> Result<(), ResultStoreError> {
        let stored = self.entry(player)?;
        let record = stored.modes.entry(mode.key().to_string()).or_default();
        match result {
            ResultKind::Win => record.wins += 1,
            ResultKind::Loss => record.losses += 1,
            ResultKind::Draw => record.draws += 1,
        }
        self.save()
    }

    fn reward_player(&mut self, player: &str, amount: i64) -> Result<(), ResultStoreError> {
        let stored = self.entry(player)?;
        stored.balance = stored.balance.saturating_add(amount);
        self.save()
    }
}

fn win_rate(entry: &ResultEntry) -> f64 {
    entry.wins as f64 / entry.matches.max(1) as f64
}

fn load_players(path: &Path) -> HashMap<String, StoredPlayer> {
    let text = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) => {
            if error.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), %error, "results.read_failed");
            }
            return HashMap::new();
        }
    };
    let parsed = match serde_json::from_str::<ResultFileRaw>(&text) {
        Ok(value) if value.version == 1 => value,
        Ok(value) => {
            warn!(path = %path.display(), version = value.version, "results.unsupported_version");
            return HashMap::new();
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "results.parse_failed");
            return HashMap::new();
        }
    };

    let mut players = HashMap::<String, StoredPlayer>::new();
    for (raw_key, raw_value) in parsed.players {
        let stored: StoredPlayer = match serde_json::from_value(raw_value) {
            Ok(entry) => entry,
            Err(error) => {
                warn!(path = %path.display(), entry = %raw_key, %error, "results.entry_skipped");
                continue;
            }
        };
        let name = stored.name.trim().to_string();
        let key = player_key(&name);
        if key.is_empty() {
            continue;
        }

        match players.get_mut(&key) {
            Some(current) => {
                for (mode, record) in &stored.modes {
                    current.modes.entry(mode.clone()).or_default().absorb(record);
                }
                current.balance = current.balance.saturating_add(stored.balance);
                current.updated_at_ms = current.updated_at_ms.max(stored.updated_at_ms);
            }
            None => {
                players.insert(key, StoredPlayer { name, ..stored });
            }
        }
    }
    players
}

fn player_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        let unique = format!(
            "{}-{}-{}",
            name,
            std::process::id(),
            now_ms().saturating_add(rand::random::<u32>() as u64)
        );
        std::env::temp_dir().join(unique).join("results.json")
    }

    fn cleanup(path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn records_results_per_mode_and_persists_them() {
        let path = temp_file("results-record");
        let mut store = JsonResultStore::new(path.clone());
        store
            .record_result("Alice", GameMode::Standard, ResultKind::Win)
            .expect("record win");
        store
            .record_result("alice ", GameMode::LastManStanding, ResultKind::Loss)
            .expect("record loss");
        store
            .record_result("Bob", GameMode::Standard, ResultKind::Draw)
            .expect("record draw");
        store.reward_player("Alice", 100).expect("reward");
        store.reward_player("Bob", 10).expect("reward");

        let reloaded = JsonResultStore::new(path.clone());
        let response = reloaded.build_response(Some(10));
        assert_eq!(response.entries.len(), 2);
        let alice = &response.entries[0];
        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.matches, 2);
        assert_eq!(alice.wins, 1);
        assert_eq!(alice.losses, 1);
        assert_eq!(alice.balance, 100);
        assert_eq!(alice.modes.get("standard").map(|r| r.wins), Some(1));
        assert_eq!(response.entries[1].draws, 1);

        cleanup(&path);
    }

    #[test]
    fn empty_player_name_is_an_error() {
        let path = temp_file("results-empty");
        let mut store = JsonResultStore::new(path.clone());
        let err = store
            .record_result("  ", GameMode::Standard, ResultKind::Win)
            .expect_err("blank name");
        assert!(matches!(err, ResultStoreError::EmptyName));
        cleanup(&path);
    }

    #[test]
    fn load_skips_broken_entries_and_merges_case_variants() {
        let path = temp_file("results-load");
        let parent = path.parent().expect("parent exists").to_path_buf();
        fs::create_dir_all(&parent).expect("create dir");
        let raw = r#"{
  "version": 1,
  "players": {
    "ALICE": {
      "name": "Alice",
      "modes": { "standard": { "wins": 2, "losses": 1 } },
      "balance": 200,
      "updatedAtMs": 10
    },
    "alice_old": {
      "name": " alice ",
      "modes": { "standard": { "wins": 1, "losses": 0, "draws": 1 } },
      "balance": 20,
      "updatedAtMs": 20
    },
    "broken": {
      "name": "Broken",
      "balance": "lots"
    }
  }
}"#;
        fs::write(&path, raw).expect("write file");

        let store = JsonResultStore::new(path.clone());
        let response = store.build_response(None);
        assert_eq!(response.entries.len(), 1);
        let entry = &response.entries[0];
        assert_eq!(entry.name.to_lowercase(), "alice");
        assert_eq!(entry.wins, 3);
        assert_eq!(entry.draws, 1);
        assert_eq!(entry.balance, 220);
        assert_eq!(entry.updated_at_ms, 20);

        cleanup(&path);
    }

    #[test]
    fn unsupported_version_starts_empty() {
        let path = temp_file("results-version");
        let parent = path.parent().expect("parent exists").to_path_buf();
        fs::create_dir_all(&parent).expect("create dir");
        fs::write(&path, r#"{"version":9,"players":{}}"#).expect("write file");

        let store = JsonResultStore::new(path.clone());
        assert!(store.build_response(None).entries.is_empty());

        cleanup(&path);
    }

    #[test]
    fn build_response_limits_range() {
        let path = temp_file("results-limit");
        let mut store = JsonResultStore::new(path.clone());
        for name in ["P1", "P2", "P3"] {
            store
                .record_result(name, GameMode::Standard, ResultKind::Loss)
                .expect("record");
        }

        assert_eq!(store.build_response(Some(1)).entries.len(), 1);
        assert_eq!(store.build_response(Some(0)).entries.len(), 1);
        assert_eq!(store.build_response(Some(999)).entries.len(), 3);

        cleanup(&path);
    }
}
