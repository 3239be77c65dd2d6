//! selclip Protocol - Selection-ownership wire types
//!
//! This crate provides the identifiers, events and reply rules of the
//! selection-ownership protocol. It knows nothing about how events are
//! transported; `selclipd` moves them over a real display connection.

use std::time::Duration;

pub mod atom;
pub mod event;
pub mod response;

pub use atom::{names, Atom, ProtocolAtoms, Timestamp, WindowId};
pub use event::{ProtocolEvent, SelectionClear, SelectionNotify, SelectionRequest};
pub use response::{decode_atom_list, plan_response, PropertyData, Response};

/// Upper bound on bytes read back from a delivered property (5 MiB).
pub const MAX_PAYLOAD_BYTES: u32 = 5 * 1024 * 1024;

/// How long a retrieval waits for the selection owner.
pub const RETRIEVAL_TIMEOUT: Duration = Duration::from_secs(1);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(MAX_PAYLOAD_BYTES, 5_242_880);
        assert_eq!(RETRIEVAL_TIMEOUT, Duration::from_secs(1));
        assert_eq!(MAX_PAYLOAD_BYTES % 4, 0);
    }
}
