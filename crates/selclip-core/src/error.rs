//! Error types following panic-free policy.
//!
//! `TransportError` covers failures of the windowing connection itself.
//! `ClipboardError` is what `set`/`get` return to callers; every variant
//! carries enough context to print a readable cause chain.

use std::borrow::Cow;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Selection;

// ============================================================================
// Transport Errors
// ============================================================================

/// Errors raised by the windowing transport.
///
/// Serializable so a detached owner can hand its failure back to the
/// process that launched it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportError {
    /// Could not open a connection to the display.
    #[error("cannot connect to display {display}: {reason}")]
    Connect { display: String, reason: String },

    /// The connection is gone; no further requests or events will succeed.
    #[error("display connection lost: {0}")]
    Disconnected(String),

    /// The display rejected a request.
    #[error("request {request} failed: {reason}")]
    Request {
        request: Cow<'static, str>,
        reason: String,
    },

    /// A malformed or unexpected message arrived on the connection.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The display accepted the request but did not apply it.
    #[error("refused: {0}")]
    Refused(String),
}

impl TransportError {
    /// Creates a request error for the named request.
    pub fn request<E: std::fmt::Display>(request: &'static str, err: E) -> Self {
        Self::Request {
            request: Cow::Borrowed(request),
            reason: err.to_string(),
        }
    }

    /// Returns true if the connection can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Disconnected(_) | Self::Connect { .. })
    }
}

// ============================================================================
// Clipboard Errors
// ============================================================================

/// Errors returned by clipboard operations.
#[derive(Error, Debug)]
pub enum ClipboardError {
    /// No display is configured, or the configuration is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The configuration file exists but could not be read or parsed.
    #[error("failed to load config file {}", .path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The transport failed while setting up or serving a session.
    #[error("transport error")]
    Transport(#[from] TransportError),

    /// The ownership claim was rejected.
    #[error("failed to take ownership of the {selection} selection")]
    Ownership {
        selection: Selection,
        #[source]
        source: TransportError,
    },

    /// The session is not (or no longer) serving a selection.
    #[error("session does not own a selection")]
    NotOwner,

    /// The conversion request could not be issued.
    #[error("failed to request conversion of the {selection} selection")]
    Conversion {
        selection: Selection,
        #[source]
        source: TransportError,
    },

    /// The delivered payload exceeds the read bound.
    #[error("clipboard too large: more than {limit} bytes ({remaining} bytes past the limit)")]
    PayloadTooLarge { limit: u32, remaining: u32 },

    /// The selection owner did not answer in time.
    #[error("clipboard retrieval timed out after {}ms waiting for the {selection} owner", .waited.as_millis())]
    Timeout {
        selection: Selection,
        waited: Duration,
    },

    /// The detached owner failed before it could claim the selection.
    #[error("background clipboard owner failed: {0}")]
    ServerFailed(String),

    /// The async runtime or event loop thread could not start.
    #[error("failed to start background worker")]
    Runtime(#[source] io::Error),
}

impl ClipboardError {
    /// Creates a configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Returns true if the error is the retrieval timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type for clipboard operations.
pub type ClipboardResult<T> = Result<T, ClipboardError>;
