use anyhow::Result;
use interview_core::speech::SpeechRecognizer;
use interview_core::{Identity, InterviewController, InterviewError, Role, Turn};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// One line typed during an interview.
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    Answer(String),
    Save,
    Listen,
    Voice(bool),
    Quit,
    Unknown(String),
    Blank,
}

impl Line {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Line::Blank;
        }
        if !trimmed.starts_with('/') {
            return Line::Answer(trimmed.to_string());
        }
        let mut words = trimmed.split_whitespace();
        match (words.next(), words.next()) {
            (Some("/save"), None) => Line::Save,
            (Some("/listen"), None) => Line::Listen,
            (Some("/voice"), Some("on")) => Line::Voice(true),
            (Some("/voice"), Some("off")) => Line::Voice(false),
            (Some("/quit" | "/exit"), None) => Line::Quit,
            _ => Line::Unknown(trimmed.to_string()),
        }
    }
}

pub fn print_turn(turn: &Turn) {
    let speaker = match turn.role {
        Role::Assistant => "Интервьюер",
        Role::User => "Вы",
        Role::System => return,
    };
    println!("\n{speaker}: {}", turn.content);
}

pub fn report(err: &InterviewError) {
    eprintln!("! {err}");
}

async fn answer(controller: &InterviewController, text: &str) {
    match controller.send(text).await {
        Ok(reply) => print_turn(&reply),
        Err(e) => report(&e),
    }
}

/// Reads answers and commands from stdin until `/quit` or end of input.
pub async fn run(
    controller: &InterviewController,
    identity: &Identity,
    recognizer: Option<&dyn SpeechRecognizer>,
) -> Result<()> {
    println!("\nОтвечайте построчно. Команды: /save, /listen, /voice on|off, /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(raw) = lines.next_line().await? else {
            break;
        };

        match Line::parse(&raw) {
            Line::Blank => continue,
            Line::Quit => break,
            Line::Answer(text) => answer(controller, &text).await,
            Line::Save => match controller.save(Some(identity)).await {
                Ok(id) => println!("Сохранено: {id}"),
                Err(e) => report(&e),
            },
            Line::Listen => match recognizer {
                None => eprintln!("! speech input is not configured (INTERVIEW_STT_COMMAND)"),
                Some(recognizer) => match recognizer.listen().await {
                    Ok(text) => {
                        println!("Вы: {text}");
                        answer(controller, &text).await;
                    }
                    Err(e) => eprintln!("! {e}"),
                },
            },
            Line::Voice(enabled) => {
                controller.update_voice_settings(|voice| voice.enabled = enabled);
                println!("Озвучка {}", if enabled { "включена" } else { "выключена" });
            }
            Line::Unknown(command) => eprintln!("! unknown command: {command}"),
        }
    }

    Ok(())
}
