//! selclip Core - Shared types for selection-based clipboard access
//!
//! This crate provides the domain types shared between the wire
//! protocol (`selclip-protocol`), the selection owner/retriever
//! (`selclipd`) and the `selclip` CLI.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod config;
pub mod error;
pub mod selection;

// Re-exports for convenience
pub use config::{ClipboardConfig, CONFIG_FILE_NAME};
pub use error::{ClipboardError, ClipboardResult, TransportError};
pub use selection::{ParseSelectionError, Selection};
