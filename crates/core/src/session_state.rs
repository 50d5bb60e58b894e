use crate::error::{InterviewError, Result};
use crate::gateway::ModelGateway;
use crate::persona::Persona;
use crate::transcript::{NewTranscript, Transcript, TranscriptId, derive_title};
use crate::turn::{Role, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Onboarding,
    Interviewing,
}

/// What the candidate picked before the interview started.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub job_description: String,
    pub persona: Persona,
}

impl SessionConfig {
    pub fn new(job_description: impl Into<String>, persona: Persona) -> Self {
        Self {
            job_description: job_description.into(),
            persona,
        }
    }

    /// The hidden instruction that opens every conversation.
    pub fn system_turn(&self) -> Turn {
        Turn::system(format!(
            "Ты — {} интервьюер и если кандидат не подходит ты должен закончить разговор. \
             Используй только эту вакансию:\n\n{}\n\nНачни собеседование с первого вопроса.",
            self.persona.label(),
            self.job_description
        ))
    }
}

/// The live conversation.
///
/// `turns[0]`, when present, is the system turn built from `config`; it is never
/// shown and never persisted. The session is `Interviewing` exactly when it holds
/// at least that turn.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterviewSession {
    config: SessionConfig,
    turns: Vec<Turn>,
    source_transcript_id: Option<TranscriptId>,
}

impl InterviewSession {
    /// A fresh session waiting in onboarding.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        if self.turns.is_empty() {
            Phase::Onboarding
        } else {
            Phase::Interviewing
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn source_transcript_id(&self) -> Option<&TranscriptId> {
        self.source_transcript_id.as_ref()
    }

    /// Validates the job description, asks the model for the opening question and
    /// returns the session already interviewing. Nothing is built if the call fails.
    pub async fn start<G>(job_description: &str, persona: Persona, gateway: &G) -> Result<Self>
    where
        G: ModelGateway + ?Sized,
    {
        if job_description.trim().is_empty() {
            return Err(InterviewError::Validation(
                "Введите описание вакансии".to_string(),
            ));
        }

        let config = SessionConfig::new(job_description, persona);
        let system = config.system_turn();
        let first = gateway.complete(std::slice::from_ref(&system)).await?;
        if first.role != Role::Assistant {
            return Err(InterviewError::Transport(format!(
                "expected an assistant turn, model returned {:?}",
                first.role
            )));
        }
        tracing::info!(persona = %persona, "interview started");

        Ok(Self {
            config,
            turns: vec![system, first],
            source_transcript_id: None,
        })
    }

    /// Rebuilds a session from a saved transcript without calling the model.
    ///
    /// The system turn is regenerated from the stored persona and job description
    /// rather than read back, so it always reflects the current template.
    pub fn load(transcript: &Transcript) -> Self {
        let config = SessionConfig::new(transcript.job_description.clone(), transcript.persona);
        let mut turns = Vec::with_capacity(transcript.turns.len() + 1);
        turns.push(config.system_turn());
        turns.extend(transcript.turns.iter().filter(|t| t.is_visible()).cloned());
        tracing::debug!(id = %transcript.id, turns = turns.len(), "session loaded");

        Self {
            config,
            turns,
            source_transcript_id: Some(transcript.id.clone()),
        }
    }

    /// Appends the candidate's answer and the model's reply.
    ///
    /// The request carries every turn, system turn included. If the model call fails
    /// the session is left exactly as it was, without the answer.
    pub async fn append_user_turn<G>(&mut self, text: &str, gateway: &G) -> Result<&Turn>
    where
        G: ModelGateway + ?Sized,
    {
        if self.phase() != Phase::Interviewing {
            return Err(InterviewError::Validation(
                "the interview has not started yet".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(InterviewError::Validation(
                "the answer is empty".to_string(),
            ));
        }

        let mut pending = self.turns.clone();
        pending.push(Turn::user(text));
        let reply = gateway.complete(&pending).await?;
        pending.push(reply);
        self.turns = pending;

        Ok(&self.turns[self.turns.len() - 1])
    }

    /// Everything the candidate sees, in order.
    pub fn visible_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| t.is_visible())
    }

    /// The latest turn, if it came from the interviewer.
    pub fn last_assistant_turn(&self) -> Option<&Turn> {
        self.turns.last().filter(|t| t.role == Role::Assistant)
    }

    /// The document a save writes. The source transcript, if any, is left alone:
    /// saving again always produces a new transcript.
    pub fn to_new_transcript(&self) -> Result<NewTranscript> {
        let turns: Vec<Turn> = self.visible_turns().cloned().collect();
        if turns.is_empty() {
            return Err(InterviewError::Precondition(
                "nothing to save yet".to_string(),
            ));
        }

        Ok(NewTranscript {
            title: derive_title(turns.first()),
            job_description: self.config.job_description.clone(),
            persona: self.config.persona,
            turns,
        })
    }

    /// Back to onboarding with no turns and no source transcript.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.source_transcript_id = None;
    }
}
