use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The interviewer style. Only the label reaches the model, through the system turn.
///
/// Stored transcripts keep the label text. A label that matches no variant falls
/// back to [`Persona::Polite`], the same default a fresh onboarding starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Persona {
    #[default]
    Polite,
    Normal,
    Strict,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Polite, Persona::Normal, Persona::Strict];

    /// Text substituted into the system instruction.
    pub fn label(self) -> &'static str {
        match self {
            Persona::Polite => "вежливый спокойный",
            Persona::Normal => "нормальный",
            Persona::Strict => "давящий строгий",
        }
    }

    /// Difficulty name shown next to the style picker.
    pub fn difficulty(self) -> &'static str {
        match self {
            Persona::Polite => "Легкий",
            Persona::Normal => "Средний",
            Persona::Strict => "Сложный",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interviewer style: {0}")]
pub struct UnknownPersona(pub String);

impl FromStr for Persona {
    type Err = UnknownPersona;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Persona::ALL
            .into_iter()
            .find(|p| p.label() == needle || p.difficulty().to_lowercase() == needle)
            .or(match needle.as_str() {
                "easy" | "polite" => Some(Persona::Polite),
                "medium" | "normal" => Some(Persona::Normal),
                "hard" | "strict" => Some(Persona::Strict),
                _ => None,
            })
            .ok_or_else(|| UnknownPersona(s.to_string()))
    }
}

impl From<String> for Persona {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|e: UnknownPersona| {
            tracing::warn!("{e}, falling back to the default style");
            Persona::default()
        })
    }
}

impl From<Persona> for String {
    fn from(value: Persona) -> Self {
        value.label().to_string()
    }
}
