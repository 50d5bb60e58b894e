use clap::{Parser, Subcommand};
use interview_core::Persona;
use std::path::PathBuf;

/// Practice job interviews against a language model, in the terminal.
#[derive(Debug, Parser)]
#[command(name = "interview", version, about)]
pub struct Cli {
    /// Base URL of the interview proxy.
    #[arg(long, env = "INTERVIEW_API_URL", default_value = "http://127.0.0.1:3000")]
    pub api_url: String,

    /// Where transcripts and voice settings are kept.
    #[arg(long, env = "INTERVIEW_DATA_DIR", default_value = ".interview")]
    pub data_dir: PathBuf,

    /// Profile that owns saved transcripts. Defaults to the login name.
    #[arg(long, env = "INTERVIEW_USER")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a new interview.
    Start {
        /// Interviewer style: polite, normal or strict.
        #[arg(long, default_value = "polite")]
        persona: Persona,

        /// Job description text.
        #[arg(long, required_unless_present = "job_file", conflicts_with = "job_file")]
        job: Option<String>,

        /// Read the job description from a file.
        #[arg(long)]
        job_file: Option<PathBuf>,
    },
    /// Continue a saved interview.
    Resume { id: String },
    /// List saved interviews, newest first.
    List,
    /// Delete a saved interview.
    Delete { id: String },
    /// Show or change speech output settings.
    Voice {
        #[arg(long)]
        name: Option<String>,
        /// Speech rate, 0.5 to 2.0.
        #[arg(long)]
        rate: Option<String>,
        /// Voice pitch, 0.5 to 2.0.
        #[arg(long)]
        pitch: Option<String>,
        /// List the voices the speech program offers.
        #[arg(long)]
        list: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_start_parses_persona_and_job() {
        let cli = Cli::try_parse_from([
            "interview", "--user", "anna", "start", "--persona", "strict", "--job", "Rust dev",
        ])
        .unwrap();
        assert_eq!(cli.user.as_deref(), Some("anna"));
        match cli.command {
            Command::Start { persona, job, job_file } => {
                assert_eq!(persona, Persona::Strict);
                assert_eq!(job.as_deref(), Some("Rust dev"));
                assert!(job_file.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_start_needs_exactly_one_job_source() {
        assert!(Cli::try_parse_from(["interview", "start"]).is_err());
        assert!(
            Cli::try_parse_from(["interview", "start", "--job", "a", "--job-file", "b.txt"])
                .is_err()
        );
    }

    #[test]
    fn test_unknown_persona_is_rejected() {
        let err = Cli::try_parse_from(["interview", "start", "--persona", "grumpy", "--job", "x"])
            .unwrap_err();
        assert!(err.to_string().contains("grumpy"));
    }
}
