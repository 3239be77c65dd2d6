//! Selection events exchanged with the display.

use serde::{Deserialize, Serialize};

use crate::atom::{Atom, Timestamp, WindowId};

/// Another client asks the owner to convert a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub time: Timestamp,
    pub owner: WindowId,
    pub requestor: WindowId,
    pub selection: Atom,
    pub target: Atom,
    pub property: Atom,
}

impl SelectionRequest {
    /// Property the reply should be written to.
    ///
    /// Obsolete requestors pass `None`; they expect the target atom to be
    /// used as the property name.
    pub fn reply_property(&self) -> Atom {
        if self.property.is_none() {
            self.target
        } else {
            self.property
        }
    }
}

/// Answer to a conversion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionNotify {
    pub time: Timestamp,
    pub requestor: WindowId,
    pub selection: Atom,
    pub target: Atom,
    /// `None` when the conversion was refused.
    pub property: Atom,
}

impl SelectionNotify {
    /// Reply announcing the data was written to the requested property.
    pub fn accept(request: &SelectionRequest) -> Self {
        Self {
            time: request.time,
            requestor: request.requestor,
            selection: request.selection,
            target: request.target,
            property: request.reply_property(),
        }
    }

    /// Reply refusing the conversion.
    pub fn refuse(request: &SelectionRequest) -> Self {
        Self {
            property: Atom::NONE,
            ..Self::accept(request)
        }
    }

    pub fn is_refusal(&self) -> bool {
        self.property.is_none()
    }
}

/// The owner lost a selection to another client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionClear {
    pub time: Timestamp,
    pub owner: WindowId,
    pub selection: Atom,
}

/// Events the selection handlers care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    SelectionRequest(SelectionRequest),
    SelectionNotify(SelectionNotify),
    SelectionClear(SelectionClear),
    /// Sent by a session to its own window to interrupt a blocked read.
    Wakeup,
    /// Anything else the connection delivered.
    Other(String),
}

impl ProtocolEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::SelectionRequest(_) => "SelectionRequest",
            Self::SelectionNotify(_) => "SelectionNotify",
            Self::SelectionClear(_) => "SelectionClear",
            Self::Wakeup => "Wakeup",
            Self::Other(kind) => kind,
        }
    }
}
