use serde::{Deserialize, Serialize};
use std::fmt;

/// Output language for the diagnosis.
///
/// The named variants are the ones offered to users; anything else the
/// caller sends is passed to the model as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    #[default]
    English,
    Hindi,
    Spanish,
    Telugu,
    Other(String),
}

impl Language {
    /// Parses a user-supplied language name, falling back to `default` when blank.
    pub fn parse_or(raw: &str, default: Language) -> Language {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return default;
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "english" => Language::English,
            "hindi" => Language::Hindi,
            "spanish" => Language::Spanish,
            "telugu" => Language::Telugu,
            _ => Language::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Spanish => "Spanish",
            Language::Telugu => "Telugu",
            Language::Other(name) => name,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Language {
    fn from(raw: String) -> Self {
        Language::parse_or(&raw, Language::default())
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.as_str().to_string()
    }
}
