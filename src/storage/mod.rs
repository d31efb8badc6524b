//! Seen-state persistence.
//!
//! The state file is the only memory the monitor has between runs. It holds
//! the ids of postings whose notification was confirmed, oldest first:
//!
//! ```text
//! {
//!   "version": 1,
//!   "updated_at": "2026-10-19T08:30:00Z",
//!   "last_run_at": "2026-10-19T08:30:00Z",
//!   "seen": ["81000001", "81000002", "url-3f2a9c0d1e4b5a67"]
//! }
//! ```
//!
//! A bare JSON array of ids is read as well and rewritten in the format
//! above on the next save.

pub mod local;
pub mod lock;
#[cfg(feature = "s3")]
pub mod s3;

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

// Re-export for convenience
pub use local::LocalStateStore;
pub use lock::RunLock;
#[cfg(feature = "s3")]
pub use s3::S3StateStore;

/// Current on-disk format version.
pub const STATE_VERSION: u32 = 1;

/// Bounded, insertion-ordered set of notified posting ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenState {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
    last_run_at: Option<DateTime<Utc>>,
}

impl SeenState {
    /// Empty state holding at most `capacity` ids.
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            members: HashSet::new(),
            capacity: capacity.max(1),
            last_run_at: None,
        }
    }

    /// State pre-filled with `ids`, oldest first.
    pub fn with_ids<I, S>(capacity: usize, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = Self::new(capacity);
        for id in ids {
            state.insert(id);
        }
        state
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Record `id` as the newest entry, evicting the oldest past capacity.
    ///
    /// Returns `false` when the id was already present; its position is
    /// left unchanged.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.members.contains(&id) {
            return false;
        }
        self.members.insert(id.clone());
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
        true
    }

    /// Move an already-present id to the newest position.
    ///
    /// Membership never changes. Returns `false` for unknown ids.
    pub fn touch(&mut self, id: &str) -> bool {
        if !self.members.contains(id) {
            return false;
        }
        if let Some(pos) = self.order.iter().position(|seen| seen == id) {
            if let Some(entry) = self.order.remove(pos) {
                self.order.push_back(entry);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ids oldest first.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        self.last_run_at
    }

    pub fn set_last_run_at(&mut self, at: DateTime<Utc>) {
        self.last_run_at = Some(at);
    }

    /// Decode a stored document, current or legacy format.
    pub fn from_json(bytes: &[u8], capacity: usize) -> Result<Self, StateError> {
        match serde_json::from_slice::<StoredState>(bytes)? {
            StoredState::Current(doc) => {
                if doc.version > STATE_VERSION {
                    log::warn!(
                        "State file has version {} (newer than {}), reading it anyway",
                        doc.version,
                        STATE_VERSION
                    );
                }
                let mut state = Self::with_ids(capacity, doc.seen);
                state.last_run_at = doc.last_run_at;
                Ok(state)
            }
            StoredState::Legacy(ids) => {
                log::info!("Upgrading legacy state file ({} ids)", ids.len());
                Ok(Self::with_ids(
                    capacity,
                    ids.into_iter().map(LegacyId::into_string),
                ))
            }
        }
    }

    /// Encode in the current format, stamped with the write time.
    pub fn to_json(&self) -> Result<Vec<u8>, StateError> {
        let doc = StateDocument {
            version: STATE_VERSION,
            updated_at: Some(Utc::now()),
            last_run_at: self.last_run_at,
            seen: self.order.iter().cloned().collect(),
        };
        Ok(serde_json::to_vec_pretty(&doc)?)
    }
}

impl Default for SeenState {
    fn default() -> Self {
        Self::new(2000)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    version: u32,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    last_run_at: Option<DateTime<Utc>>,
    seen: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredState {
    Current(StateDocument),
    Legacy(Vec<LegacyId>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyId {
    Text(String),
    Number(serde_json::Number),
}

impl LegacyId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Backend that persists [`SeenState`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the persisted state.
    ///
    /// Never fails: missing, unreadable or corrupt state yields an empty
    /// state and a warning.
    async fn load(&self) -> SeenState;

    /// Persist `state` so that an interrupted write leaves the previous
    /// version intact.
    async fn save(&self, state: &SeenState) -> Result<(), StateError>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}

/// Decode raw backend bytes, falling back to an empty state.
pub(crate) fn decode_or_empty(
    read: Result<Option<Vec<u8>>, StateError>,
    capacity: usize,
    location: &str,
) -> SeenState {
    let bytes = match read {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            log::info!("No state at {location}, starting fresh");
            return SeenState::new(capacity);
        }
        Err(e) => {
            log::warn!("State at {location} is unreadable ({e}), starting fresh");
            return SeenState::new(capacity);
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        log::warn!("State at {location} is empty, starting fresh");
        return SeenState::new(capacity);
    }

    match SeenState::from_json(&bytes, capacity) {
        Ok(state) => {
            log::info!("Loaded {} seen ids from {location}", state.len());
            state
        }
        Err(e) => {
            log::warn!("State at {location} is corrupt ({e}), starting fresh");
            SeenState::new(capacity)
        }
    }
}
