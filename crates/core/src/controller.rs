use crate::auth::Identity;
use crate::error::{InterviewError, Result};
use crate::gateway::ModelGateway;
use crate::persona::Persona;
use crate::session_state::{InterviewSession, Phase};
use crate::settings::VoiceSettings;
use crate::speech::Narrator;
use crate::transcript::{Transcript, TranscriptFeed, TranscriptId, TranscriptStore};
use crate::turn::Turn;
use std::sync::{Arc, Mutex};

/// Owns the active interview and everything it talks to.
///
/// Mutating calls are serialized on the session: while one is waiting on the model,
/// another gets [`InterviewError::Busy`] instead of racing it. The saved-transcript
/// feed is separate and never touches the active session.
pub struct InterviewController {
    gateway: Arc<dyn ModelGateway>,
    store: Arc<dyn TranscriptStore>,
    narrator: Option<Narrator>,
    voice: Mutex<VoiceSettings>,
    session: tokio::sync::Mutex<InterviewSession>,
}

impl InterviewController {
    pub fn new(gateway: Arc<dyn ModelGateway>, store: Arc<dyn TranscriptStore>) -> Self {
        Self {
            gateway,
            store,
            narrator: None,
            voice: Mutex::new(VoiceSettings::default()),
            session: tokio::sync::Mutex::new(InterviewSession::new()),
        }
    }

    pub fn with_narrator(mut self, narrator: Narrator, voice: VoiceSettings) -> Self {
        self.narrator = Some(narrator);
        self.voice = Mutex::new(voice);
        self
    }

    pub fn voice_settings(&self) -> VoiceSettings {
        self.voice.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn update_voice_settings(&self, update: impl FnOnce(&mut VoiceSettings)) {
        let mut voice = self.voice.lock().unwrap_or_else(|e| e.into_inner());
        update(&mut voice);
        if !voice.enabled {
            if let Some(narrator) = &self.narrator {
                narrator.silence();
            }
        }
    }

    fn narrate(&self, session: &InterviewSession) {
        if let Some(narrator) = &self.narrator {
            narrator.narrate(session.turns(), &self.voice_settings());
        }
    }

    fn claim(&self) -> Result<tokio::sync::MutexGuard<'_, InterviewSession>> {
        self.session.try_lock().map_err(|_| InterviewError::Busy)
    }

    /// Discards whatever was active and opens a new interview.
    pub async fn start(&self, job_description: &str, persona: Persona) -> Result<Turn> {
        let mut session = self.claim()?;
        let started =
            InterviewSession::start(job_description, persona, self.gateway.as_ref()).await?;
        let first = started
            .last_assistant_turn()
            .cloned()
            .ok_or_else(|| InterviewError::Transport("model returned no opening turn".into()))?;
        *session = started;
        self.narrate(&session);
        Ok(first)
    }

    pub async fn resume(&self, transcript: &Transcript) -> Result<()> {
        let mut session = self.claim()?;
        *session = InterviewSession::load(transcript);
        Ok(())
    }

    pub async fn send(&self, text: &str) -> Result<Turn> {
        let mut session = self.claim()?;
        let reply = session
            .append_user_turn(text, self.gateway.as_ref())
            .await?
            .clone();
        self.narrate(&session);
        Ok(reply)
    }

    /// Writes the visible turns as a new transcript owned by `identity`.
    pub async fn save(&self, identity: Option<&Identity>) -> Result<TranscriptId> {
        let identity = identity
            .ok_or_else(|| InterviewError::Precondition("sign in to save sessions".into()))?;
        let draft = self.claim()?.to_new_transcript()?;
        let id = self.store.create(&identity.uid, draft).await?;
        tracing::info!(uid = %identity.uid, id = %id, "session saved");
        Ok(id)
    }

    /// Deletes a saved transcript. Returns whether the active session was reset
    /// because it had been loaded from that transcript.
    pub async fn delete(&self, identity: &Identity, id: &TranscriptId) -> Result<bool> {
        self.store.delete(&identity.uid, id).await?;

        let mut session = self.session.lock().await;
        if session.source_transcript_id() == Some(id) {
            session.reset();
            if let Some(narrator) = &self.narrator {
                narrator.silence();
            }
            return Ok(true);
        }
        Ok(false)
    }

    pub async fn saved(&self, identity: &Identity) -> Result<TranscriptFeed> {
        Ok(self.store.subscribe(&identity.uid).await?)
    }

    pub async fn new_session(&self) -> Result<()> {
        self.claim()?.reset();
        if let Some(narrator) = &self.narrator {
            narrator.silence();
        }
        Ok(())
    }

    pub async fn phase(&self) -> Phase {
        self.session.lock().await.phase()
    }

    pub async fn visible_turns(&self) -> Vec<Turn> {
        self.session.lock().await.visible_turns().cloned().collect()
    }

    pub async fn session(&self) -> InterviewSession {
        self.session.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, MockModelGateway};
    use crate::store::MemoryTranscriptStore;
    use crate::transcript::StoreError;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn echo_gateway() -> Arc<dyn ModelGateway> {
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_complete()
            .returning(|turns: &[Turn]| Ok(Turn::assistant(format!("Q{}", turns.len()))));
        Arc::new(gateway)
    }

    fn alice() -> Identity {
        Identity::new("alice")
    }

    #[tokio::test]
    async fn test_save_requires_identity_and_turns() {
        let store = Arc::new(MemoryTranscriptStore::new());
        let controller = InterviewController::new(echo_gateway(), store.clone());

        let err = controller.save(Some(&alice())).await.unwrap_err();
        assert!(matches!(err, InterviewError::Precondition(_)));

        controller.start("Rust developer", Persona::Normal).await.unwrap();
        let err = controller.save(None).await.unwrap_err();
        assert!(matches!(err, InterviewError::Precondition(_)));

        let id = controller.save(Some(&alice())).await.unwrap();
        let list = store.list("alice").await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
        assert_eq!(list[0].title, "Q1");
    }

    #[tokio::test]
    async fn test_each_save_creates_a_new_transcript() {
        let store = Arc::new(MemoryTranscriptStore::new());
        let controller = InterviewController::new(echo_gateway(), store.clone());
        controller.start("Rust developer", Persona::Normal).await.unwrap();

        let first = controller.save(Some(&alice())).await.unwrap();
        controller.send("answer").await.unwrap();
        let second = controller.save(Some(&alice())).await.unwrap();

        assert_ne!(first, second);
        let list = store.list("alice").await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].turns.len(), 3);
        assert_eq!(list[1].turns.len(), 1);
    }

    #[tokio::test]
    async fn test_deleting_the_source_transcript_resets_the_session() {
        let store = Arc::new(MemoryTranscriptStore::new());
        let controller = InterviewController::new(echo_gateway(), store.clone());
        controller.start("Rust developer", Persona::Normal).await.unwrap();
        let kept = controller.save(Some(&alice())).await.unwrap();
        let loaded = controller.save(Some(&alice())).await.unwrap();

        let transcript = store
            .list("alice")
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.id == loaded)
            .unwrap();
        controller.resume(&transcript).await.unwrap();
        assert_eq!(controller.phase().await, Phase::Interviewing);

        assert!(!controller.delete(&alice(), &kept).await.unwrap());
        assert_eq!(controller.phase().await, Phase::Interviewing);

        assert!(controller.delete(&alice(), &loaded).await.unwrap());
        assert_eq!(controller.phase().await, Phase::Onboarding);
        assert!(controller.visible_turns().await.is_empty());
    }

    #[tokio::test]
    async fn test_feed_does_not_touch_active_session() {
        let store = Arc::new(MemoryTranscriptStore::new());
        let controller = InterviewController::new(echo_gateway(), store.clone());
        let mut feed = controller.saved(&alice()).await.unwrap();
        assert!(feed.next().await.unwrap().is_empty());

        controller.start("Rust developer", Persona::Strict).await.unwrap();
        let before = controller.session().await;
        controller.save(Some(&alice())).await.unwrap();

        assert_eq!(feed.next().await.unwrap().len(), 1);
        assert_eq!(controller.session().await, before);
    }

    struct GatedGateway {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl ModelGateway for GatedGateway {
        async fn complete(&self, turns: &[Turn]) -> std::result::Result<Turn, GatewayError> {
            if turns.len() > 1 {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(Turn::assistant("next"))
        }
    }

    #[tokio::test]
    async fn test_second_send_while_waiting_is_busy() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let gateway = Arc::new(GatedGateway {
            entered: entered.clone(),
            release: release.clone(),
        });
        let controller = Arc::new(InterviewController::new(
            gateway,
            Arc::new(MemoryTranscriptStore::new()),
        ));
        controller.start("Rust developer", Persona::Polite).await.unwrap();

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.send("first answer").await })
        };
        entered.notified().await;

        let err = controller.send("second answer").await.unwrap_err();
        assert!(matches!(err, InterviewError::Busy));
        assert!(matches!(
            controller.save(Some(&alice())).await,
            Err(InterviewError::Busy)
        ));

        release.notify_one();
        first.await.unwrap().unwrap();
        let turns = controller.visible_turns().await;
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1], Turn::user("first answer"));
    }

    #[tokio::test]
    async fn test_failed_start_keeps_previous_session() {
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_complete()
            .times(1)
            .returning(|_| Ok(Turn::assistant("Q1")));
        gateway
            .expect_complete()
            .times(1)
            .returning(|_| Err(GatewayError::Configuration("missing key".into())));
        let controller =
            InterviewController::new(Arc::new(gateway), Arc::new(MemoryTranscriptStore::new()));

        controller.start("first job", Persona::Polite).await.unwrap();
        let before = controller.session().await;
        let err = controller.start("second job", Persona::Strict).await.unwrap_err();

        assert!(matches!(err, InterviewError::Configuration(_)));
        assert_eq!(controller.session().await, before);
    }

    #[tokio::test]
    async fn test_non_assistant_opening_keeps_previous_session() {
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_complete()
            .times(1)
            .returning(|_| Ok(Turn::user("odd")));
        let controller =
            InterviewController::new(Arc::new(gateway), Arc::new(MemoryTranscriptStore::new()));

        let err = controller.start("Rust developer", Persona::Normal).await.unwrap_err();

        assert!(matches!(err, InterviewError::Transport(_)));
        assert_eq!(controller.phase().await, Phase::Onboarding);
        assert!(controller.visible_turns().await.is_empty());
    }

    struct BrokenStore;

    #[async_trait]
    impl TranscriptStore for BrokenStore {
        async fn create(
            &self,
            _owner: &str,
            _transcript: crate::transcript::NewTranscript,
        ) -> std::result::Result<TranscriptId, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }

        async fn list(&self, _owner: &str) -> std::result::Result<Vec<Transcript>, StoreError> {
            Ok(Vec::new())
        }

        async fn delete(
            &self,
            _owner: &str,
            _id: &TranscriptId,
        ) -> std::result::Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("read-only filesystem")))
        }

        async fn subscribe(&self, _owner: &str) -> std::result::Result<TranscriptFeed, StoreError> {
            Err(StoreError::InvalidOwner("unused".into()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_store_failures_surface_and_keep_the_session() {
        let controller = Arc::new(InterviewController::new(
            echo_gateway(),
            Arc::new(BrokenStore),
        ));
        controller.start("Rust developer", Persona::Normal).await.unwrap();
        let before = controller.session().await;

        let deletes: Vec<_> = (0..8)
            .map(|i| {
                let controller = controller.clone();
                tokio::spawn(async move {
                    let id = TranscriptId::from(format!("t{i}"));
                    controller.delete(&alice(), &id).await
                })
            })
            .collect();
        let saves: Vec<_> = (0..8)
            .map(|_| {
                let controller = controller.clone();
                tokio::spawn(async move { controller.save(Some(&alice())).await })
            })
            .collect();

        for delete in deletes {
            let err = delete.await.unwrap().unwrap_err();
            assert!(matches!(err, InterviewError::Persistence(_)));
        }
        for save in saves {
            let err = save.await.unwrap().unwrap_err();
            assert!(
                matches!(err, InterviewError::Persistence(_) | InterviewError::Busy),
                "unexpected error: {err:?}"
            );
        }
        assert_eq!(controller.session().await, before);
        controller.send("still usable").await.unwrap();
    }
}
