//! Display transports.
//!
//! The selection handlers talk to the display only through [`Transport`].
//! Two implementations ship:
//!
//! - [`X11Transport`] - a real X server connection via `x11rb`
//! - [`MemoryDisplay`] - an in-process display with X11 selection semantics
//!
//! # Threading
//!
//! A transport is shared between the session (outbound requests) and its
//! event loop thread (blocking event reads), so implementations must
//! allow one thread to block in [`Transport::wait_for_event`] while others
//! issue requests.

use std::sync::Arc;

use selclip_core::TransportError;
use selclip_protocol::{Atom, PropertyData, ProtocolEvent, SelectionNotify, Timestamp, WindowId};

pub mod memory;
pub mod x11;

pub use memory::{MemoryConnection, MemoryDisplay};
pub use x11::{X11Connector, X11Transport};

/// Result of a property read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyReply {
    /// Actual type of the property (`None` if it does not exist).
    pub type_: Atom,
    /// Element size in bits (0 if the property does not exist).
    pub format: u8,
    /// Bytes left unread past the requested range.
    pub bytes_after: u32,
    /// Raw property bytes.
    pub value: Vec<u8>,
}

/// Requests and events a selection handler needs from the display.
pub trait Transport: Send + Sync {
    /// Interns `name`, creating the atom if needed.
    fn intern_atom(&self, name: &str) -> Result<Atom, TransportError>;

    /// Looks up the name of an atom.
    fn atom_name(&self, atom: Atom) -> Result<String, TransportError>;

    /// Creates an unmapped 1x1 window used as an event endpoint.
    fn create_window(&self) -> Result<WindowId, TransportError>;

    /// Asks to become the owner of `selection`.
    ///
    /// Success only means the request was accepted; check with
    /// [`Transport::selection_owner`] whether it took effect.
    fn set_selection_owner(
        &self,
        owner: WindowId,
        selection: Atom,
        time: Timestamp,
    ) -> Result<(), TransportError>;

    /// Returns the current owner of `selection` (`WindowId::NONE` if unowned).
    fn selection_owner(&self, selection: Atom) -> Result<WindowId, TransportError>;

    /// Asks the owner of `selection` to write it to `property` on `requestor`.
    fn convert_selection(
        &self,
        requestor: WindowId,
        selection: Atom,
        target: Atom,
        property: Atom,
        time: Timestamp,
    ) -> Result<(), TransportError>;

    /// Replaces `property` on `window`.
    fn change_property(
        &self,
        window: WindowId,
        property: Atom,
        type_: Atom,
        data: PropertyData<'_>,
    ) -> Result<(), TransportError>;

    /// Reads up to `max_bytes` of `property` from `window`, deleting it
    /// afterwards if `delete` is set and nothing remains unread.
    fn get_property(
        &self,
        window: WindowId,
        property: Atom,
        type_: Atom,
        max_bytes: u32,
        delete: bool,
    ) -> Result<PropertyReply, TransportError>;

    /// Delivers a selection notify to its requestor.
    fn send_selection_notify(&self, notify: &SelectionNotify) -> Result<(), TransportError>;

    /// Interrupts a blocked [`Transport::wait_for_event`] on the connection
    /// that created `window`.
    fn wake(&self, window: WindowId) -> Result<(), TransportError>;

    /// Blocks until the next event arrives.
    fn wait_for_event(&self) -> Result<ProtocolEvent, TransportError>;
}

/// Opens transports.
///
/// Each session opens its own connection through a connector.
pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn Transport>, TransportError>;

    /// Human-readable target for logs, e.g. the display name.
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reply_means_missing_property() {
        let reply = PropertyReply::default();
        assert!(reply.type_.is_none());
        assert_eq!(reply.format, 0);
        assert_eq!(reply.bytes_after, 0);
        assert!(reply.value.is_empty());
    }
}
