use std::fmt;

use serde::{Deserialize, Serialize};

/// Display languages supported by the app. Unrecognized codes fall back to English.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(from = "String")]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "kn")]
    Kannada,
    #[serde(rename = "ta")]
    Tamil,
    #[serde(rename = "te")]
    Telugu,
    #[serde(rename = "ml")]
    Malayalam,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::English,
        Language::Kannada,
        Language::Tamil,
        Language::Telugu,
        Language::Malayalam,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Kannada => "kn",
            Language::Tamil => "ta",
            Language::Telugu => "te",
            Language::Malayalam => "ml",
        }
    }

    /// Accepts bare codes and region-tagged locales (`ta-IN`); anything else is English.
    pub fn from_code(code: &str) -> Self {
        let primary = code
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        Self::ALL
            .into_iter()
            .find(|lang| lang.code() == primary)
            .unwrap_or_default()
    }
}

impl From<String> for Language {
    fn from(code: String) -> Self {
        Language::from_code(&code)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
