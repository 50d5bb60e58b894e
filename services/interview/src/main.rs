mod cli;
mod config;
mod repl;

use crate::cli::{Cli, Command};
use crate::config::{Config, resolve_user};
use anyhow::{Context, Result, bail};
use clap::Parser;
use interview_core::settings::{FileKeyValueStore, VoiceSettings};
use interview_core::speech::{
    CommandRecognizer, CommandSynth, Narrator, SpeechRecognizer, SpeechSynth, preferred_voices,
};
use interview_core::{
    FileTranscriptStore, Identity, InterviewController, ProxyGateway, Transcript, TranscriptId,
};
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let cli = Cli::parse();
    let identity = Identity::new(resolve_user(cli.user.clone())?);
    tracing::debug!(uid = %identity.uid, data_dir = %cli.data_dir.display(), "profile resolved");

    // --- 4. Device-local Settings and Speech ---
    let settings_store = FileKeyValueStore::open(cli.data_dir.join("settings.json"));
    let mut voice = VoiceSettings::load(&settings_store);
    let synth = config
        .tts_command
        .clone()
        .map(|program| Arc::new(CommandSynth::new(program)) as Arc<dyn SpeechSynth>);
    let recognizer = config
        .stt_command
        .as_deref()
        .and_then(CommandRecognizer::from_command_line);

    // --- 5. Controller Setup ---
    let gateway = Arc::new(ProxyGateway::new(cli.api_url.clone()));
    let store = Arc::new(FileTranscriptStore::new(cli.data_dir.join("transcripts")));
    let mut controller = InterviewController::new(gateway, store);
    if let Some(synth) = synth.clone() {
        voice.ensure_voice(&settings_store, &preferred_voices(synth.voices().await));
        controller = controller.with_narrator(Narrator::new(synth), voice);
    }

    // --- 6. Run the Command ---
    match cli.command {
        Command::Start { persona, job, job_file } => {
            let job = match (job, job_file) {
                (Some(job), _) => job,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => bail!("either --job or --job-file is required"),
            };
            println!("Стиль интервьюера: {} ({})", persona.difficulty(), persona);
            let first = controller.start(&job, persona).await?;
            repl::print_turn(&first);
            repl::run(&controller, &identity, recognizer_ref(&recognizer)).await?;
        }
        Command::Resume { id } => {
            let transcript = find_saved(&controller, &identity, &id.into()).await?;
            controller.resume(&transcript).await?;
            println!("{} ({})", transcript.title, transcript.persona.difficulty());
            for turn in controller.visible_turns().await {
                repl::print_turn(&turn);
            }
            repl::run(&controller, &identity, recognizer_ref(&recognizer)).await?;
        }
        Command::List => {
            let saved = controller.saved(&identity).await?.current();
            if saved.is_empty() {
                println!("Нет сохранённых сессий");
            }
            for t in saved {
                println!(
                    "{}  {}  {:<8} {}",
                    t.id,
                    t.updated_at
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M"),
                    t.persona.difficulty(),
                    t.title
                );
            }
        }
        Command::Delete { id } => {
            let id = TranscriptId::from(id);
            controller.delete(&identity, &id).await?;
            println!("Удалено: {id}");
        }
        Command::Voice { name, rate, pitch, list } => {
            if list {
                let Some(synth) = &synth else {
                    bail!("INTERVIEW_TTS_COMMAND is not set");
                };
                for v in preferred_voices(synth.voices().await) {
                    println!("{:<24} {}", v.name, v.lang);
                }
            }
            let mut voice = VoiceSettings::load(&settings_store);
            if let Some(name) = name {
                voice.set_voice(&settings_store, &name);
            }
            if let Some(rate) = rate {
                voice.set_rate(&settings_store, &rate);
            }
            if let Some(pitch) = pitch {
                voice.set_pitch(&settings_store, &pitch);
            }
            println!(
                "voice: {}  rate: {}  pitch: {}",
                voice.voice_name.as_deref().unwrap_or("(default)"),
                voice.rate,
                voice.pitch
            );
        }
    }

    Ok(())
}

fn recognizer_ref(recognizer: &Option<CommandRecognizer>) -> Option<&dyn SpeechRecognizer> {
    recognizer.as_ref().map(|r| r as &dyn SpeechRecognizer)
}

async fn find_saved(
    controller: &InterviewController,
    identity: &Identity,
    id: &TranscriptId,
) -> Result<Transcript> {
    controller
        .saved(identity)
        .await?
        .current()
        .into_iter()
        .find(|t| &t.id == id)
        .with_context(|| format!("No saved session with id {id}"))
}
