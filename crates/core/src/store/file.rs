use crate::transcript::{
    FeedHub, NewTranscript, StampClock, StoreError, Transcript, TranscriptFeed, TranscriptId,
    TranscriptStore, check_owner, sort_by_recency,
};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One JSON document per transcript.
///
/// ```text
/// root/
/// ├── <owner>/
/// │   ├── <id>.json
/// │   └── <id>.json
/// └── <owner>/
/// ```
pub struct FileTranscriptStore {
    root: PathBuf,
    clock: StampClock,
    hub: FeedHub,
}

impl FileTranscriptStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            clock: StampClock::default(),
            hub: FeedHub::default(),
        }
    }

    fn owner_dir(&self, owner: &str) -> Result<PathBuf, StoreError> {
        check_owner(owner)?;
        Ok(self.root.join(owner))
    }

    fn doc_path(&self, owner: &str, id: &TranscriptId) -> Result<Option<PathBuf>, StoreError> {
        let dir = self.owner_dir(owner)?;
        // Ids come from callers on delete; anything that is not a bare name cannot exist.
        if check_owner(id.as_str()).is_err() {
            return Ok(None);
        }
        Ok(Some(dir.join(format!("{id}.json"))))
    }

    async fn read_all(&self, owner: &str) -> Result<Vec<Transcript>, StoreError> {
        let dir = self.owner_dir(owner)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut list = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            // Deleted since the directory was read.
            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_slice::<Transcript>(&bytes) {
                Ok(doc) if doc.owner_id == owner => list.push(doc),
                Ok(_) => tracing::warn!("Skipping {}: owner mismatch", path.display()),
                Err(e) => {
                    tracing::warn!("Skipping unreadable transcript {}: {}", path.display(), e)
                }
            }
        }
        sort_by_recency(&mut list);
        Ok(list)
    }

    /// Republishes the owner's list. Runs after a successful write, so a failed
    /// read is logged rather than reported.
    async fn notify(&self, owner: &str) {
        let _gate = self.hub.gate(owner).await;
        if !self.hub.is_watched(owner) {
            return;
        }
        match self.read_all(owner).await {
            Ok(list) => self.hub.publish(owner, list),
            Err(e) => tracing::warn!(owner, "Failed to refresh transcript feed: {}", e),
        }
    }
}

#[async_trait]
impl TranscriptStore for FileTranscriptStore {
    async fn create(
        &self,
        owner: &str,
        transcript: NewTranscript,
    ) -> Result<TranscriptId, StoreError> {
        let dir = self.owner_dir(owner)?;
        fs::create_dir_all(&dir).await?;

        let id = TranscriptId::generate();
        let doc = Transcript::from_new(id.clone(), owner, transcript, self.clock.next());
        let json = serde_json::to_vec_pretty(&doc)?;

        // Write to a temp file first so a crash never leaves half a document behind.
        let tmp = dir.join(format!(".{id}.json.tmp"));
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, dir.join(format!("{id}.json"))).await?;
        tracing::info!(owner, id = %id, "saved transcript");

        self.notify(owner).await;
        Ok(id)
    }

    async fn list(&self, owner: &str) -> Result<Vec<Transcript>, StoreError> {
        self.read_all(owner).await
    }

    async fn delete(&self, owner: &str, id: &TranscriptId) -> Result<(), StoreError> {
        let Some(path) = self.doc_path(owner, id)? else {
            return Ok(());
        };
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(owner, id = %id, "deleted transcript");
                self.notify(owner).await;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn subscribe(&self, owner: &str) -> Result<TranscriptFeed, StoreError> {
        self.owner_dir(owner)?;
        let _gate = self.hub.gate(owner).await;
        let current = self.read_all(owner).await?;
        Ok(self.hub.subscribe(owner, current))
    }
}
