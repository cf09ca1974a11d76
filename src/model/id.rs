//! Pretrained model identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

const NAMESPACE: &str = "facebook/";
const FAMILY: &str = "musicgen-";

/// A MusicGen checkpoint published under `facebook/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelId {
    Small,
    Medium,
    Large,
    /// The only checkpoint that accepts a reference melody.
    Melody,
}

impl ModelId {
    pub const ALL: [ModelId; 4] = [Self::Small, Self::Medium, Self::Large, Self::Melody];

    /// The choices offered by the browser UI, default first.
    pub const UI_CHOICES: [ModelId; 2] = [Self::Small, Self::Melody];

    fn size(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Melody => "melody",
        }
    }

    /// Hub name, e.g. `facebook/musicgen-small`.
    pub fn pretrained_name(self) -> String {
        format!("{NAMESPACE}{FAMILY}{}", self.size())
    }

    /// Name without the namespace, e.g. `musicgen-melody`.
    pub fn short_name(self) -> String {
        format!("{FAMILY}{}", self.size())
    }

    pub fn supports_melody(self) -> bool {
        matches!(self, Self::Melody)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretrained_name())
    }
}

impl FromStr for ModelId {
    type Err = Error;

    /// Accepts `facebook/musicgen-small`, `musicgen-small` or `small`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let name = raw.trim();
        let lowered = name.to_ascii_lowercase();
        let bare = lowered.strip_prefix(NAMESPACE).unwrap_or(&lowered);
        let size = bare.strip_prefix(FAMILY).unwrap_or(bare);
        Self::ALL
            .into_iter()
            .find(|id| id.size() == size)
            .ok_or_else(|| {
                let known: Vec<String> = Self::ALL.iter().map(|id| id.pretrained_name()).collect();
                Error::validation(format!(
                    "unsupported model '{name}'; expected one of: {}",
                    known.join(", ")
                ))
            })
    }
}

impl TryFrom<String> for ModelId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelId> for String {
    fn from(id: ModelId) -> Self {
        id.pretrained_name()
    }
}
