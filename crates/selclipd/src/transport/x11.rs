//! X11 transport over `x11rb`.
//!
//! `RustConnection` is thread-safe: the event loop thread blocks in
//! `wait_for_event` while the session thread sends requests and waits
//! for their replies on the same connection.

use std::sync::Arc;

use tracing::debug;
use x11rb::connection::Connection;
use x11rb::errors::{ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::protocol::xproto::{
    ClientMessageEvent, ConnectionExt as _, CreateWindowAux, EventMask, PropMode,
    SelectionNotifyEvent, WindowClass, SELECTION_NOTIFY_EVENT,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use selclip_core::TransportError;
use selclip_protocol::{
    Atom, PropertyData, ProtocolEvent, SelectionClear, SelectionNotify, SelectionRequest,
    Timestamp, WindowId,
};

use super::{Connector, PropertyReply, Transport};

/// Client message type used to interrupt our own event loop.
const WAKE_ATOM_NAME: &str = "_SELCLIP_WAKE";

/// Opens [`X11Transport`]s to a named display.
#[derive(Debug, Clone)]
pub struct X11Connector {
    display: String,
}

impl X11Connector {
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
        }
    }
}

impl Connector for X11Connector {
    fn connect(&self) -> Result<Arc<dyn Transport>, TransportError> {
        let transport = X11Transport::connect(&self.display)?;
        Ok(Arc::new(transport))
    }

    fn describe(&self) -> String {
        self.display.clone()
    }
}

/// A connection to an X server.
pub struct X11Transport {
    conn: RustConnection,
    root: u32,
    root_depth: u8,
    root_visual: u32,
    wake_atom: u32,
}

impl X11Transport {
    /// Connects to `display` (e.g. `:0`) and picks its default screen.
    pub fn connect(display: &str) -> Result<Self, TransportError> {
        let (conn, screen_num) =
            x11rb::connect(Some(display)).map_err(|e| TransportError::Connect {
                display: display.to_string(),
                reason: e.to_string(),
            })?;

        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| TransportError::Connect {
                display: display.to_string(),
                reason: format!("screen {screen_num} does not exist"),
            })?;
        let (root, root_depth, root_visual) = (screen.root, screen.root_depth, screen.root_visual);

        let wake_atom = conn
            .intern_atom(false, WAKE_ATOM_NAME.as_bytes())
            .map_err(connection_error)?
            .reply()
            .map_err(|e| reply_error("InternAtom", e))?
            .atom;

        let name = display;
        debug!(display = name, screen = screen_num, "Connected to X server");

        Ok(Self {
            conn,
            root,
            root_depth,
            root_visual,
            wake_atom,
        })
    }
}

impl Transport for X11Transport {
    fn intern_atom(&self, name: &str) -> Result<Atom, TransportError> {
        let reply = self
            .conn
            .intern_atom(false, name.as_bytes())
            .map_err(connection_error)?
            .reply()
            .map_err(|e| reply_error("InternAtom", e))?;
        Ok(Atom::new(reply.atom))
    }

    fn atom_name(&self, atom: Atom) -> Result<String, TransportError> {
        let reply = self
            .conn
            .get_atom_name(atom.as_u32())
            .map_err(connection_error)?
            .reply()
            .map_err(|e| reply_error("GetAtomName", e))?;
        Ok(String::from_utf8_lossy(&reply.name).into_owned())
    }

    fn create_window(&self) -> Result<WindowId, TransportError> {
        let window = self
            .conn
            .generate_id()
            .map_err(|e| reply_or_id_error("CreateWindow", e))?;

        self.conn
            .create_window(
                self.root_depth,
                window,
                self.root,
                0,
                0,
                1,
                1,
                0,
                WindowClass::INPUT_OUTPUT,
                self.root_visual,
                &CreateWindowAux::new(),
            )
            .map_err(connection_error)?
            .check()
            .map_err(|e| reply_error("CreateWindow", e))?;

        Ok(WindowId::new(window))
    }

    fn set_selection_owner(
        &self,
        owner: WindowId,
        selection: Atom,
        time: Timestamp,
    ) -> Result<(), TransportError> {
        self.conn
            .set_selection_owner(owner.as_u32(), selection.as_u32(), time.as_u32())
            .map_err(connection_error)?
            .check()
            .map_err(|e| reply_error("SetSelectionOwner", e))
    }

    fn selection_owner(&self, selection: Atom) -> Result<WindowId, TransportError> {
        let reply = self
            .conn
            .get_selection_owner(selection.as_u32())
            .map_err(connection_error)?
            .reply()
            .map_err(|e| reply_error("GetSelectionOwner", e))?;
        Ok(WindowId::new(reply.owner))
    }

    fn convert_selection(
        &self,
        requestor: WindowId,
        selection: Atom,
        target: Atom,
        property: Atom,
        time: Timestamp,
    ) -> Result<(), TransportError> {
        self.conn
            .convert_selection(
                requestor.as_u32(),
                selection.as_u32(),
                target.as_u32(),
                property.as_u32(),
                time.as_u32(),
            )
            .map_err(connection_error)?
            .check()
            .map_err(|e| reply_error("ConvertSelection", e))
    }

    fn change_property(
        &self,
        window: WindowId,
        property: Atom,
        type_: Atom,
        data: PropertyData<'_>,
    ) -> Result<(), TransportError> {
        let cookie = match data {
            PropertyData::Utf8(bytes) => self.conn.change_property8(
                PropMode::REPLACE,
                window.as_u32(),
                property.as_u32(),
                type_.as_u32(),
                bytes,
            ),
            PropertyData::Atoms(atoms) => {
                let words: Vec<u32> = atoms.iter().map(|a| a.as_u32()).collect();
                self.conn.change_property32(
                    PropMode::REPLACE,
                    window.as_u32(),
                    property.as_u32(),
                    type_.as_u32(),
                    &words,
                )
            }
        };
        cookie
            .map_err(connection_error)?
            .check()
            .map_err(|e| reply_error("ChangeProperty", e))
    }

    fn get_property(
        &self,
        window: WindowId,
        property: Atom,
        type_: Atom,
        max_bytes: u32,
        delete: bool,
    ) -> Result<PropertyReply, TransportError> {
        let reply = self
            .conn
            .get_property(
                delete,
                window.as_u32(),
                property.as_u32(),
                type_.as_u32(),
                0,
                max_bytes / 4,
            )
            .map_err(connection_error)?
            .reply()
            .map_err(|e| reply_error("GetProperty", e))?;

        Ok(PropertyReply {
            type_: Atom::new(reply.type_),
            format: reply.format,
            bytes_after: reply.bytes_after,
            value: reply.value,
        })
    }

    fn send_selection_notify(&self, notify: &SelectionNotify) -> Result<(), TransportError> {
        let event = SelectionNotifyEvent {
            response_type: SELECTION_NOTIFY_EVENT,
            sequence: 0,
            time: notify.time.as_u32(),
            requestor: notify.requestor.as_u32(),
            selection: notify.selection.as_u32(),
            target: notify.target.as_u32(),
            property: notify.property.as_u32(),
        };
        self.conn
            .send_event(false, notify.requestor.as_u32(), EventMask::NO_EVENT, event)
            .map_err(connection_error)?
            .check()
            .map_err(|e| reply_error("SendEvent", e))
    }

    fn wake(&self, window: WindowId) -> Result<(), TransportError> {
        // With an empty mask the event goes to the client that created the window.
        let event = ClientMessageEvent::new(32, window.as_u32(), self.wake_atom, [0u32; 5]);
        self.conn
            .send_event(false, window.as_u32(), EventMask::NO_EVENT, event)
            .map_err(connection_error)?;
        self.conn.flush().map_err(connection_error)
    }

    fn wait_for_event(&self) -> Result<ProtocolEvent, TransportError> {
        let event = self.conn.wait_for_event().map_err(connection_error)?;

        let event = match event {
            Event::SelectionRequest(e) => ProtocolEvent::SelectionRequest(SelectionRequest {
                time: Timestamp::new(e.time),
                owner: WindowId::new(e.owner),
                requestor: WindowId::new(e.requestor),
                selection: Atom::new(e.selection),
                target: Atom::new(e.target),
                property: Atom::new(e.property),
            }),
            Event::SelectionNotify(e) => ProtocolEvent::SelectionNotify(SelectionNotify {
                time: Timestamp::new(e.time),
                requestor: WindowId::new(e.requestor),
                selection: Atom::new(e.selection),
                target: Atom::new(e.target),
                property: Atom::new(e.property),
            }),
            Event::SelectionClear(e) => ProtocolEvent::SelectionClear(SelectionClear {
                time: Timestamp::new(e.time),
                owner: WindowId::new(e.owner),
                selection: Atom::new(e.selection),
            }),
            Event::ClientMessage(e) if e.type_ == self.wake_atom => ProtocolEvent::Wakeup,
            Event::Error(e) => {
                return Err(TransportError::Protocol(format!(
                    "{:?} (request {})",
                    e.error_kind, e.major_opcode
                )))
            }
            other => ProtocolEvent::Other(format!("{other:?}")),
        };

        Ok(event)
    }
}

// ============================================================================
// Error mapping
// ============================================================================

/// An I/O failure leaves the connection unusable; anything else is
/// reported as a protocol error.
fn connection_error(err: ConnectionError) -> TransportError {
    match err {
        ConnectionError::IoError(e) => TransportError::Disconnected(e.to_string()),
        other => TransportError::Protocol(other.to_string()),
    }
}

fn reply_error(request: &'static str, err: ReplyError) -> TransportError {
    match err {
        ReplyError::ConnectionError(e) => connection_error(e),
        ReplyError::X11Error(e) => TransportError::request(request, format!("{:?}", e.error_kind)),
    }
}

fn reply_or_id_error(request: &'static str, err: ReplyOrIdError) -> TransportError {
    match err {
        ReplyOrIdError::IdsExhausted => TransportError::request(request, "resource ids exhausted"),
        ReplyOrIdError::ConnectionError(e) => connection_error(e),
        ReplyOrIdError::X11Error(e) => {
            TransportError::request(request, format!("{:?}", e.error_kind))
        }
    }
}
