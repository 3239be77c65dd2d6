//! Protocol identifiers.

use std::fmt;

use selclip_core::Selection;
use serde::{Deserialize, Serialize};

/// Atom names used by the protocol.
pub mod names {
    /// Plain UTF-8 text target.
    pub const UTF8_STRING: &str = "UTF8_STRING";
    /// Meta target listing supported targets.
    pub const TARGETS: &str = "TARGETS";
    /// Type tag for atom-list properties.
    pub const ATOM: &str = "ATOM";
}

/// An interned identifier for a protocol name string.
///
/// Atoms are only meaningful within one display connection.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Atom(u32);

impl Atom {
    /// The `None` atom (also `AnyPropertyType` in property reads).
    pub const NONE: Atom = Atom(0);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Atom {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Window identifier; used only as an address for selection events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(u32);

impl WindowId {
    pub const NONE: WindowId = WindowId(0);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for WindowId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Server timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u32);

impl Timestamp {
    /// Asks the server to substitute its current time.
    pub const CURRENT_TIME: Timestamp = Timestamp(0);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn is_current_time(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Timestamp {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// The atoms a session resolves once and keeps for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolAtoms {
    pub clipboard: Atom,
    pub primary: Atom,
    pub utf8_text: Atom,
    pub targets: Atom,
    pub atom: Atom,
}

impl ProtocolAtoms {
    /// Returns the atom for a selection.
    pub fn selection(&self, selection: Selection) -> Atom {
        match selection {
            Selection::Clipboard => self.clipboard,
            Selection::Primary => self.primary,
        }
    }

    /// Maps an atom back to a known selection.
    pub fn selection_of(&self, atom: Atom) -> Option<Selection> {
        if atom == self.clipboard {
            Some(Selection::Clipboard)
        } else if atom == self.primary {
            Some(Selection::Primary)
        } else {
            None
        }
    }

    /// Targets advertised by an owner, in reply order.
    pub fn supported_targets(&self) -> [Atom; 2] {
        [self.targets, self.utf8_text]
    }
}
