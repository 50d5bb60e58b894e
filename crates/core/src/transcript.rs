use crate::persona::Persona;
use crate::turn::Turn;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedMutexGuard, watch};

pub const TITLE_MAX_CHARS: usize = 80;
pub const DEFAULT_TITLE: &str = "Сессия собеседования";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranscriptId(String);

impl TranscriptId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TranscriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TranscriptId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TranscriptId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// What a save hands to the store. Ids and timestamps are the store's business.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTranscript {
    pub title: String,
    pub job_description: String,
    pub persona: Persona,
    pub turns: Vec<Turn>,
}

/// A persisted interview. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub id: TranscriptId,
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub persona: Persona,
    #[serde(default)]
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transcript {
    pub fn from_new(
        id: TranscriptId,
        owner_id: &str,
        new: NewTranscript,
        stamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id: owner_id.to_string(),
            title: new.title,
            job_description: new.job_description,
            persona: new.persona,
            turns: new.turns,
            created_at: stamp,
            updated_at: stamp,
        }
    }
}

/// First `TITLE_MAX_CHARS` characters of the opening turn, or the default title.
pub fn derive_title(first_visible: Option<&Turn>) -> String {
    match first_visible {
        Some(turn) if !turn.content.is_empty() => {
            turn.content.chars().take(TITLE_MAX_CHARS).collect()
        }
        _ => DEFAULT_TITLE.to_string(),
    }
}

/// Most recently updated first.
pub fn sort_by_recency(transcripts: &mut [Transcript]) {
    transcripts.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.as_str().cmp(b.id.as_str()))
    });
}

/// Hands out strictly increasing timestamps so saves within the same clock tick
/// still list in the order they happened.
#[derive(Debug, Default)]
pub struct StampClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl StampClock {
    pub fn next(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let stamp = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid owner id: {0:?}")]
    InvalidOwner(String),
}

/// Per-owner transcript persistence. No method ever reads or touches another
/// owner's documents.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn create(&self, owner: &str, transcript: NewTranscript)
    -> Result<TranscriptId, StoreError>;

    /// Ordered by `updated_at`, newest first.
    async fn list(&self, owner: &str) -> Result<Vec<Transcript>, StoreError>;

    /// Removing an id that does not exist is not an error.
    async fn delete(&self, owner: &str, id: &TranscriptId) -> Result<(), StoreError>;

    /// Live view of `list(owner)`. Dropping the feed unsubscribes.
    async fn subscribe(&self, owner: &str) -> Result<TranscriptFeed, StoreError>;
}

/// Owner ids double as directory names: non-empty ASCII alphanumerics, `-` and `_`.
pub fn is_valid_owner_id(owner: &str) -> bool {
    !owner.is_empty()
        && owner
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub(crate) fn check_owner(owner: &str) -> Result<(), StoreError> {
    if is_valid_owner_id(owner) {
        Ok(())
    } else {
        Err(StoreError::InvalidOwner(owner.to_string()))
    }
}

/// A subscription to one owner's transcript list.
pub struct TranscriptFeed {
    rx: watch::Receiver<Vec<Transcript>>,
    primed: bool,
}

impl TranscriptFeed {
    /// The list as of the last delivered update.
    pub fn current(&self) -> Vec<Transcript> {
        self.rx.borrow().clone()
    }

    /// Yields the current list on the first call, then waits for the next change.
    /// Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Vec<Transcript>> {
        if !self.primed {
            self.primed = true;
            return Some(self.rx.borrow_and_update().clone());
        }
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// The watch channels behind every live feed, keyed by owner.
///
/// Stores must read a snapshot and hand it over while holding that owner's
/// [`gate`](FeedHub::gate), otherwise a slow reader can publish an older list
/// over a newer one.
#[derive(Default)]
pub struct FeedHub {
    senders: Mutex<HashMap<String, watch::Sender<Vec<Transcript>>>>,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FeedHub {
    pub async fn gate(&self, owner: &str) -> OwnedMutexGuard<()> {
        let gate = {
            let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(gates.entry(owner.to_string()).or_default())
        };
        gate.lock_owned().await
    }

    pub fn subscribe(&self, owner: &str, current: Vec<Transcript>) -> TranscriptFeed {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        let rx = match senders.get(owner) {
            Some(tx) => {
                tx.send_replace(current);
                tx.subscribe()
            }
            None => {
                let (tx, rx) = watch::channel(current);
                senders.insert(owner.to_string(), tx);
                rx
            }
        };
        TranscriptFeed { rx, primed: false }
    }

    pub fn is_watched(&self, owner: &str) -> bool {
        let senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders
            .get(owner)
            .is_some_and(|tx| tx.receiver_count() > 0)
    }

    pub fn publish(&self, owner: &str, list: Vec<Transcript>) {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = senders.get(owner) {
            if tx.receiver_count() == 0 {
                senders.remove(owner);
                return;
            }
            tx.send_replace(list);
            tracing::debug!(owner, "published transcript list update");
        }
    }
}
