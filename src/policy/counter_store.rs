use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GuideError;
use crate::model::context_model::{ContextKey, ContextKind};

/// Integer counters kept per Assist/Discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Presented,
    DismissedByUser,
    FlowCompleted,
}

/// Membership sets kept per Assist/Discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    Muted,
    Terminated,
    OptedOut,
}

/// Key-value store for suppression state that outlives the process.
pub trait CounterStore {
    fn count(&self, counter: Counter, key: ContextKey) -> i64;
    fn set_count(&mut self, counter: Counter, key: ContextKey, value: i64);
    fn is_marked(&self, marker: Marker, key: ContextKey) -> bool;
    fn set_marked(&mut self, marker: Marker, key: ContextKey, marked: bool);

    fn increment(&mut self, counter: Counter, key: ContextKey) -> i64 {
        let next = self.count(counter, key) + 1;
        self.set_count(counter, key, next);
        next
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCounterStore {
    #[serde(default)]
    counters: BTreeMap<String, i64>,
    #[serde(default)]
    markers: BTreeMap<String, BTreeSet<String>>,
}

fn store_key(key: ContextKey) -> String {
    let kind = match key.kind {
        ContextKind::Assist => "assist",
        ContextKind::Discovery => "discovery",
    };
    format!("{}:{}", kind, key.id)
}

fn counter_key(counter: Counter, key: ContextKey) -> String {
    format!("{:?}/{}", counter, store_key(key))
}

fn marker_name(marker: Marker) -> String {
    format!("{:?}", marker)
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryCounterStore {
    fn count(&self, counter: Counter, key: ContextKey) -> i64 {
        self.counters
            .get(&counter_key(counter, key))
            .copied()
            .unwrap_or(0)
    }

    fn set_count(&mut self, counter: Counter, key: ContextKey, value: i64) {
        self.counters.insert(counter_key(counter, key), value);
    }

    fn is_marked(&self, marker: Marker, key: ContextKey) -> bool {
        self.markers
            .get(&marker_name(marker))
            .map(|set| set.contains(&store_key(key)))
            .unwrap_or(false)
    }

    fn set_marked(&mut self, marker: Marker, key: ContextKey, marked: bool) {
        let set = self.markers.entry(marker_name(marker)).or_default();
        if marked {
            set.insert(store_key(key));
        } else {
            set.remove(&store_key(key));
        }
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// Persists every write to a JSON file. Write failures are logged, never
/// surfaced to detection.
#[derive(Debug)]
pub struct JsonFileCounterStore {
    path: PathBuf,
    inner: MemoryCounterStore,
}

impl JsonFileCounterStore {
    /// Open the store, starting empty if the file does not exist yet.
    pub fn open(path: &Path) -> Result<Self, GuideError> {
        let inner = match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| GuideError::Json {
                context: format!("counter store {}", path.display()),
                source: e,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryCounterStore::default(),
            Err(e) => {
                return Err(GuideError::Io {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    fn flush(&self) {
        let json = match serde_json::to_string_pretty(&self.inner) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "failed to serialize counter store");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, json) {
            warn!(path = %self.path.display(), error = %e, "failed to write counter store");
        }
    }
}

impl CounterStore for JsonFileCounterStore {
    fn count(&self, counter: Counter, key: ContextKey) -> i64 {
        self.inner.count(counter, key)
    }

    fn set_count(&mut self, counter: Counter, key: ContextKey, value: i64) {
        self.inner.set_count(counter, key, value);
        self.flush();
    }

    fn is_marked(&self, marker: Marker, key: ContextKey) -> bool {
        self.inner.is_marked(marker, key)
    }

    fn set_marked(&mut self, marker: Marker, key: ContextKey, marked: bool) {
        self.inner.set_marked(marker, key, marked);
        self.flush();
    }
}
