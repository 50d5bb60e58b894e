use crate::transcript::{
    FeedHub, NewTranscript, StampClock, StoreError, Transcript, TranscriptFeed, TranscriptId,
    TranscriptStore, check_owner, sort_by_recency,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

type Docs = HashMap<String, Vec<Transcript>>;

/// Process-local store. Everything is lost when the process exits.
#[derive(Default)]
pub struct MemoryTranscriptStore {
    docs: Mutex<Docs>,
    clock: StampClock,
    hub: FeedHub,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(docs: &Docs, owner: &str) -> Vec<Transcript> {
        let mut list = docs.get(owner).cloned().unwrap_or_default();
        sort_by_recency(&mut list);
        list
    }

    // Called with `docs` still locked so updates reach the feed in write order.
    fn notify(&self, docs: &Docs, owner: &str) {
        if self.hub.is_watched(owner) {
            self.hub.publish(owner, Self::sorted(docs, owner));
        }
    }

    fn docs(&self) -> MutexGuard<'_, Docs> {
        self.docs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn create(
        &self,
        owner: &str,
        transcript: NewTranscript,
    ) -> Result<TranscriptId, StoreError> {
        check_owner(owner)?;
        let id = TranscriptId::generate();
        let doc = Transcript::from_new(id.clone(), owner, transcript, self.clock.next());

        let mut docs = self.docs();
        docs.entry(owner.to_string()).or_default().push(doc);
        self.notify(&docs, owner);
        Ok(id)
    }

    async fn list(&self, owner: &str) -> Result<Vec<Transcript>, StoreError> {
        check_owner(owner)?;
        Ok(Self::sorted(&self.docs(), owner))
    }

    async fn delete(&self, owner: &str, id: &TranscriptId) -> Result<(), StoreError> {
        check_owner(owner)?;
        let mut docs = self.docs();
        let removed = match docs.get_mut(owner) {
            Some(list) => {
                let before = list.len();
                list.retain(|t| &t.id != id);
                before != list.len()
            }
            None => false,
        };
        if removed {
            self.notify(&docs, owner);
        }
        Ok(())
    }

    async fn subscribe(&self, owner: &str) -> Result<TranscriptFeed, StoreError> {
        check_owner(owner)?;
        let docs = self.docs();
        Ok(self.hub.subscribe(owner, Self::sorted(&docs, owner)))
    }
}
