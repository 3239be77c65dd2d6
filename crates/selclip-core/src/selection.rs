//! Named selections.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named exclusive ownership slot on the display.
///
/// Only `Clipboard` is ever claimed. `Primary` can be read and is accepted
/// when matching conversion notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    /// The explicit copy/paste selection (`CLIPBOARD`).
    #[default]
    Clipboard,
    /// The legacy highlight-to-copy selection (`PRIMARY`).
    Primary,
}

impl Selection {
    /// Returns the atom name the display knows this selection by.
    pub fn atom_name(&self) -> &'static str {
        match self {
            Self::Clipboard => "CLIPBOARD",
            Self::Primary => "PRIMARY",
        }
    }

    /// Returns a short lowercase label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Clipboard => "clipboard",
            Self::Primary => "primary",
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a selection name is not recognised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown selection: {0} (expected \"clipboard\" or \"primary\")")]
pub struct ParseSelectionError(pub String);

impl FromStr for Selection {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clipboard" => Ok(Self::Clipboard),
            "primary" => Ok(Self::Primary),
            _ => Err(ParseSelectionError(s.to_string())),
        }
    }
}
