// src/state.rs

//! Persisted run-state
//!
//! The state file maps each artefact identifier to the SHA-256 of its
//! last download. Every run compares new hashes against it to build a
//! change set, then writes it back pruned to the identifiers that are
//! still configured.

use crate::artefact::Artefact;
use crate::error::{Error, Result};
use crate::identity::Identifier;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// What changed for one artefact this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub platform: String,
    pub name: String,
    pub version: Option<String>,
    pub architecture: String,
}

impl Change {
    /// Describe an artefact for the change set
    pub fn from_artefact(artefact: &Artefact) -> Result<Self> {
        Ok(Self {
            platform: artefact.platform().name.clone(),
            name: artefact.config().name.clone(),
            version: artefact.version()?.map(str::to_string),
            architecture: artefact.config().architecture.clone(),
        })
    }
}

/// Outcome of recording one artefact's hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashUpdate {
    /// Identifier not seen before
    FirstSeen,
    /// Stored hash differs from the new one
    Changed,
    Unchanged,
}

/// Run-state document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Unix time this run started
    pub last_run: i64,
    #[serde(default)]
    pub inventory: BTreeMap<Identifier, String>,
    /// Changes in the order artefacts were processed
    #[serde(default)]
    pub changes: IndexMap<Identifier, Change>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    /// Empty state stamped with the current time
    pub fn new() -> Self {
        Self {
            last_run: chrono::Utc::now().timestamp(),
            inventory: BTreeMap::new(),
            changes: IndexMap::new(),
        }
    }

    /// Load the state for a new run
    ///
    /// A missing or unreadable file yields a fresh state. The timestamp is
    /// refreshed and the previous run's changes are dropped.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state file at {}, starting fresh", path.display());
                return Self::new();
            }
            Err(e) => {
                warn!("Cannot read state file {}: {}, starting fresh", path.display(), e);
                return Self::new();
            }
        };

        match serde_json::from_str::<RunState>(&content) {
            Ok(mut state) => {
                state.last_run = chrono::Utc::now().timestamp();
                state.changes.clear();
                debug!("Loaded {} inventory entries from {}", state.inventory.len(), path.display());
                state
            }
            Err(e) => {
                warn!("Ignoring malformed state file {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    /// Record a new content hash for an identifier
    ///
    /// First sightings are stored without a change entry. A differing hash
    /// overwrites the stored one and adds `change` to the change set.
    pub fn apply(&mut self, identifier: &Identifier, hash: &str, change: Change) -> HashUpdate {
        match self.inventory.get_mut(identifier) {
            None => {
                self.inventory.insert(identifier.clone(), hash.to_string());
                HashUpdate::FirstSeen
            }
            Some(existing) if existing.as_str() != hash => {
                *existing = hash.to_string();
                self.changes.insert(identifier.clone(), change);
                HashUpdate::Changed
            }
            Some(_) => HashUpdate::Unchanged,
        }
    }

    /// Record a downloaded artefact
    pub fn diff_and_update(&mut self, artefact: &Artefact) -> Result<HashUpdate> {
        let hash = artefact.hash()?;
        let change = Change::from_artefact(artefact)?;
        let update = self.apply(artefact.identifier(), hash, change);
        debug!("{}: {:?}", artefact.label(), update);
        Ok(update)
    }

    /// Drop inventory entries for identifiers no longer configured
    pub fn prune(&mut self, current: &HashSet<Identifier>) {
        let before = self.inventory.len();
        self.inventory.retain(|id, _| current.contains(id));
        let removed = before - self.inventory.len();
        if removed > 0 {
            info!("Pruned {} stale inventory entries", removed);
        }
    }

    /// Prune and write the state atomically
    ///
    /// The document goes to a temporary file next to `path` which is then
    /// renamed over it, so an interrupted save leaves the old file intact.
    pub fn save(&mut self, current: &HashSet<Identifier>, path: &Path) -> Result<()> {
        self.prune(current);

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::IoError(format!("Failed to create state directory {}: {}", dir.display(), e))
        })?;

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::ParseError(format!("Failed to serialize state: {}", e)))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| {
            Error::IoError(format!("Failed to write state file {}: {}", path.display(), e))
        })?;

        info!("Saved {} inventory entries to {}", self.inventory.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(name: &str) -> Change {
        Change {
            platform: "linux".to_string(),
            name: name.to_string(),
            version: Some("2.0".to_string()),
            architecture: "amd64".to_string(),
        }
    }

    #[test]
    fn test_first_seen_records_no_change() {
        let mut state = RunState::new();
        let id = Identifier::from("id1");

        assert_eq!(state.apply(&id, "abc", change("a")), HashUpdate::FirstSeen);
        assert_eq!(state.inventory.get(&id).map(String::as_str), Some("abc"));
        assert!(state.changes.is_empty());
    }

    #[test]
    fn test_changed_hash_is_recorded() {
        let mut state = RunState::new();
        let id = Identifier::from("id1");
        state.inventory.insert(id.clone(), "abc".to_string());

        assert_eq!(state.apply(&id, "def", change("a")), HashUpdate::Changed);
        assert_eq!(state.inventory.get(&id).map(String::as_str), Some("def"));
        assert_eq!(state.changes.get(&id), Some(&change("a")));
    }

    #[test]
    fn test_changes_keep_processing_order() {
        let mut state = RunState::new();
        let names = ["zeta", "alpha", "mid", "beta", "omega"];
        for name in names {
            state.inventory.insert(Identifier::from(name), "old".to_string());
        }

        for name in names {
            state.apply(&Identifier::from(name), "new", change(name));
        }

        let order: Vec<&str> = state.changes.values().map(|c| c.name.as_str()).collect();
        assert_eq!(order, names);
    }

    #[test]
    fn test_unchanged_hash_mutates_nothing() {
        let mut state = RunState::new();
        let id = Identifier::from("id1");
        state.inventory.insert(id.clone(), "abc".to_string());
        let before = state.clone();

        assert_eq!(state.apply(&id, "abc", change("a")), HashUpdate::Unchanged);
        assert_eq!(state, before);
    }

    #[test]
    fn test_save_prunes_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = RunState::new();
        state.inventory.insert(Identifier::from("id1"), "h1".to_string());
        state.inventory.insert(Identifier::from("id2"), "h2".to_string());

        let current: HashSet<_> = [Identifier::from("id1")].into_iter().collect();
        state.save(&current, &path).unwrap();

        let loaded = RunState::load(&path);
        assert_eq!(loaded.inventory.len(), 1);
        assert_eq!(loaded.inventory.get(&Identifier::from("id1")).map(String::as_str), Some("h1"));
    }

    #[test]
    fn test_round_trip_keeps_inventory_and_clears_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.json");

        let mut state = RunState::new();
        let id = Identifier::from("id1");
        state.inventory.insert(id.clone(), "abc".to_string());
        state.apply(&id, "def", change("a"));

        let current: HashSet<_> = [id.clone()].into_iter().collect();
        state.save(&current, &path).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["changes"]["id1"]["name"], "a");

        let loaded = RunState::load(&path);
        assert_eq!(loaded.inventory, state.inventory);
        assert!(loaded.changes.is_empty());
    }

    #[test]
    fn test_missing_or_malformed_file_gives_fresh_state() {
        let dir = tempfile::tempdir().unwrap();

        let missing = RunState::load(&dir.path().join("absent.json"));
        assert!(missing.inventory.is_empty());
        assert!(missing.last_run > 0);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        let recovered = RunState::load(&bad);
        assert!(recovered.inventory.is_empty());
        assert!(recovered.changes.is_empty());
    }

    #[test]
    fn test_reads_legacy_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"last_run": 1700000000, "inventory": {"id1": "abc"},
                "changes": {"id1": {"platform": "p", "name": "n", "version": null, "architecture": "a"}}}"#,
        )
        .unwrap();

        let state = RunState::load(&path);
        assert_eq!(state.inventory.get(&Identifier::from("id1")).map(String::as_str), Some("abc"));
        assert!(state.changes.is_empty());
        assert!(state.last_run > 1_700_000_000);
    }
}
