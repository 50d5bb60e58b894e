//! Environment configuration for the terminal client.
//!
//! Flags that clap reads from the environment (`INTERVIEW_API_URL`,
//! `INTERVIEW_DATA_DIR`, `INTERVIEW_USER`) live on [`crate::cli::Cli`]; this
//! module covers what is not worth a flag.

use interview_core::transcript::is_valid_owner_id;
use std::env;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// espeak-compatible program used to read questions aloud.
    pub tts_command: Option<String>,
    /// Program (with arguments) that records one answer and prints its text.
    pub stt_command: Option<String>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// *   `INTERVIEW_TTS_COMMAND`: (Optional) Speech output program, e.g. "espeak-ng".
    /// *   `INTERVIEW_STT_COMMAND`: (Optional) Speech input command line.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "WARN".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Also feeds the clap `env` fallbacks, so it has to run before parsing.
        dotenvy::dotenv().ok();

        let non_blank = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "WARN".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            tts_command: non_blank("INTERVIEW_TTS_COMMAND"),
            stt_command: non_blank("INTERVIEW_STT_COMMAND"),
            log_level,
        })
    }
}

/// The owner id transcripts are stored under: the `--user` flag, then the login name.
///
/// An explicit flag must already be a valid owner id. Login names are mapped
/// with [`owner_from_login`].
pub fn resolve_user(flag: Option<String>) -> Result<String, ConfigError> {
    if let Some(user) = flag {
        if user.trim().is_empty() {
            return Err(ConfigError::MissingVar("INTERVIEW_USER".to_string()));
        }
        if !is_valid_owner_id(&user) {
            return Err(ConfigError::InvalidValue(
                "INTERVIEW_USER".to_string(),
                format!("'{}' may only contain ASCII letters, digits, '-' and '_'", user),
            ));
        }
        return Ok(user);
    }
    env::var("USER")
        .ok()
        .or_else(|| env::var("USERNAME").ok())
        .map(|login| owner_from_login(&login))
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ConfigError::MissingVar("INTERVIEW_USER".to_string()))
}

/// Maps a login name such as `john.doe` onto an owner id (`john_doe`).
pub fn owner_from_login(login: &str) -> String {
    login
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins_over_login_name() {
        assert_eq!(resolve_user(Some("anna".into())).unwrap(), "anna");
    }

    #[test]
    fn test_blank_flag_is_missing() {
        let err = resolve_user(Some("   ".into()));
        assert!(matches!(err, Err(ConfigError::MissingVar(_))));
    }

    #[test]
    fn test_invalid_flag_is_rejected() {
        let err = resolve_user(Some("john.doe".into()));
        assert!(matches!(err, Err(ConfigError::InvalidValue(var, _)) if var == "INTERVIEW_USER"));
    }

    #[test]
    fn test_login_names_become_owner_ids() {
        assert_eq!(owner_from_login("john.doe"), "john_doe");
        assert_eq!(owner_from_login(" anna-k "), "anna-k");
        assert_eq!(owner_from_login("ИВАН"), "____");
        assert!(is_valid_owner_id(&owner_from_login("DOMAIN\\j.smith@corp")));
    }
}
