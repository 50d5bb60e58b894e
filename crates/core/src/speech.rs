use crate::settings::VoiceSettings;
use crate::turn::{Role, Turn};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub lang: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// Russian voices if there are any, otherwise everything on offer.
pub fn preferred_voices(all: Vec<Voice>) -> Vec<Voice> {
    let russian: Vec<Voice> = all
        .iter()
        .filter(|v| v.lang.to_lowercase().starts_with("ru"))
        .cloned()
        .collect();
    if russian.is_empty() { all } else { russian }
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech backend is not available: {0}")]
    Unavailable(String),
    #[error("no speech was recognized")]
    NoSpeech,
    #[error("speech backend failed: {0}")]
    Backend(String),
}

/// Text-to-speech. `utter` resolves when playback ends.
#[async_trait]
pub trait SpeechSynth: Send + Sync {
    async fn utter(&self, text: &str, settings: &VoiceSettings) -> Result<(), SpeechError>;

    async fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }
}

/// Speech-to-text. One activation yields one final transcript, never partial ones.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn listen(&self) -> Result<String, SpeechError>;
}

/// Reads interviewer turns aloud, one at a time. A new utterance cancels the one
/// still playing.
pub struct Narrator {
    synth: Arc<dyn SpeechSynth>,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl Narrator {
    pub fn new(synth: Arc<dyn SpeechSynth>) -> Self {
        Self {
            synth,
            current: Mutex::new(None),
        }
    }

    /// Speaks the last turn if voice is on and the interviewer said it.
    /// Returns whether anything was started.
    pub fn narrate(&self, turns: &[Turn], settings: &VoiceSettings) -> bool {
        if !settings.enabled {
            return false;
        }
        match turns.last() {
            Some(last) if last.role == Role::Assistant => {
                self.speak(last.content.clone(), settings.clone());
                true
            }
            _ => false,
        }
    }

    pub fn speak(&self, text: String, settings: VoiceSettings) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.take() {
            previous.abort();
        }
        let synth = Arc::clone(&self.synth);
        *current = Some(tokio::spawn(async move {
            if let Err(e) = synth.utter(&text, &settings).await {
                tracing::warn!("Speech output failed: {}", e);
            }
        }));
    }

    pub fn silence(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.take() {
            previous.abort();
        }
    }

}

impl Drop for Narrator {
    fn drop(&mut self) {
        self.silence();
    }
}

/// Drives an espeak-compatible program: `-v voice -s wpm -p pitch -- text`.
/// The child process is killed when the utterance is superseded.
pub struct CommandSynth {
    program: String,
}

const BASE_WORDS_PER_MINUTE: f32 = 175.0;
const BASE_PITCH: f32 = 50.0;

impl CommandSynth {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(text: &str, settings: &VoiceSettings) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(voice) = &settings.voice_name {
            args.push("-v".to_string());
            args.push(voice.clone());
        }
        args.push("-s".to_string());
        args.push(((BASE_WORDS_PER_MINUTE * settings.rate).round() as u32).to_string());
        args.push("-p".to_string());
        args.push(((BASE_PITCH * settings.pitch).round().min(99.0) as u32).to_string());
        // Text starting with `-` must not be read as an option.
        args.push("--".to_string());
        args.push(text.to_string());
        args
    }
}

fn spawn_error(program: &str, e: std::io::Error) -> SpeechError {
    if e.kind() == ErrorKind::NotFound {
        SpeechError::Unavailable(program.to_string())
    } else {
        SpeechError::Backend(e.to_string())
    }
}

#[async_trait]
impl SpeechSynth for CommandSynth {
    async fn utter(&self, text: &str, settings: &VoiceSettings) -> Result<(), SpeechError> {
        let status = Command::new(&self.program)
            .args(Self::args(text, settings))
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| spawn_error(&self.program, e))?;
        if status.success() {
            Ok(())
        } else {
            Err(SpeechError::Backend(format!("{} exited with {}", self.program, status)))
        }
    }

    /// Parses the `--voices` table: `Pty Language Age/Gender VoiceName File ...`.
    async fn voices(&self) -> Vec<Voice> {
        let output = match Command::new(&self.program).arg("--voices").output().await {
            Ok(output) if output.status.success() => output,
            _ => return Vec::new(),
        };
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .skip(1)
            .filter_map(|line| {
                let cols: Vec<&str> = line.split_whitespace().collect();
                match cols.as_slice() {
                    [_, lang, _, name, ..] => Some(Voice::new(*name, *lang)),
                    _ => None,
                }
            })
            .collect()
    }
}

/// Runs a speech-to-text program that records one utterance and prints the text.
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits a shell-style command line on whitespace.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    async fn listen(&self) -> Result<String, SpeechError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_error(&self.program, e))?;
        if !output.status.success() {
            return Err(SpeechError::Backend(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            Err(SpeechError::NoSpeech)
        } else {
            Ok(text)
        }
    }
}
