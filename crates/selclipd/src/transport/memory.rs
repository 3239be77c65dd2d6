//! In-process display with X11 selection semantics.
//!
//! `MemoryDisplay` plays the part of the X server for any number of
//! in-process clients: it interns atoms, tracks window properties and
//! selection owners, and routes selection events between client queues.
//! It follows the server rules the selection handlers depend on:
//!
//! - a new owner causes a `SelectionClear` for the previous owner
//! - claims older than the current owner's timestamp are ignored
//! - converting an unowned selection is refused immediately with a
//!   `SelectionNotify` whose property is `None`
//! - a disconnecting client loses the selections it owned, silently
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use selclip_core::ClipboardConfig;
//! use selclipd::{Clipboard, MemoryDisplay};
//!
//! let display = MemoryDisplay::new();
//! let clipboard = Clipboard::with_connector(ClipboardConfig::foreground("memory"), Arc::new(display));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::trace;

use selclip_core::{Selection, TransportError};
use selclip_protocol::{
    Atom, PropertyData, ProtocolEvent, SelectionClear, SelectionNotify, SelectionRequest,
    Timestamp, WindowId,
};

use super::{Connector, PropertyReply, Transport};

/// First atom handed out after the predefined ones.
const FIRST_DYNAMIC_ATOM: u32 = 69;

const PREDEFINED_ATOMS: &[(&str, u32)] = &[
    ("PRIMARY", 1),
    ("SECONDARY", 2),
    ("ATOM", 4),
    ("STRING", 31),
];

type ClientId = u64;

#[derive(Debug)]
struct StoredProperty {
    type_: Atom,
    format: u8,
    data: Vec<u8>,
}

#[derive(Debug)]
struct WindowState {
    client: ClientId,
    properties: HashMap<Atom, StoredProperty>,
}

#[derive(Debug, Clone, Copy)]
struct Owner {
    window: WindowId,
    client: ClientId,
    since: Timestamp,
}

#[derive(Debug)]
struct DisplayState {
    atoms: HashMap<String, Atom>,
    names: HashMap<Atom, String>,
    next_atom: u32,
    next_window: u32,
    next_client: ClientId,
    windows: HashMap<WindowId, WindowState>,
    owners: HashMap<Atom, Owner>,
    queues: HashMap<ClientId, VecDeque<ProtocolEvent>>,
    time: u32,
    claims_refused: bool,
}

impl DisplayState {
    fn new() -> Self {
        let mut atoms = HashMap::new();
        let mut names = HashMap::new();
        for (name, value) in PREDEFINED_ATOMS {
            atoms.insert((*name).to_string(), Atom::new(*value));
            names.insert(Atom::new(*value), (*name).to_string());
        }
        Self {
            atoms,
            names,
            next_atom: FIRST_DYNAMIC_ATOM,
            next_window: 0x0020_0001,
            next_client: 1,
            windows: HashMap::new(),
            owners: HashMap::new(),
            queues: HashMap::new(),
            time: 0,
            claims_refused: false,
        }
    }

    /// Advances the server clock and resolves `CurrentTime`.
    fn resolve_time(&mut self, time: Timestamp) -> Timestamp {
        self.time = self.time.wrapping_add(1);
        if time.is_current_time() {
            Timestamp::new(self.time)
        } else {
            time
        }
    }

    fn window(&self, window: WindowId, request: &'static str) -> Result<&WindowState, TransportError> {
        self.windows
            .get(&window)
            .ok_or_else(|| TransportError::request(request, format!("BadWindow {window}")))
    }

    /// Forgets a client along with its windows and selections.
    fn remove_client(&mut self, client: ClientId) {
        self.owners.retain(|_, owner| owner.client != client);
        self.windows.retain(|_, window| window.client != client);
        self.queues.remove(&client);
    }

    fn push(&mut self, client: ClientId, event: ProtocolEvent) {
        if let Some(queue) = self.queues.get_mut(&client) {
            trace!(client, kind = event.kind(), "Queued event");
            queue.push_back(event);
        }
    }
}

struct DisplayInner {
    state: Mutex<DisplayState>,
    events: Condvar,
}

impl DisplayInner {
    fn lock(&self) -> Result<MutexGuard<'_, DisplayState>, TransportError> {
        self.state.lock().map_err(|_| poisoned())
    }
}

fn poisoned() -> TransportError {
    TransportError::Disconnected("memory display state poisoned".to_string())
}

/// An in-process display server shared by its connections.
#[derive(Clone)]
pub struct MemoryDisplay {
    inner: Arc<DisplayInner>,
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DisplayInner {
                state: Mutex::new(DisplayState::new()),
                events: Condvar::new(),
            }),
        }
    }

    /// Opens a new client connection.
    pub fn connect_client(&self) -> MemoryConnection {
        let client = match self.inner.lock() {
            Ok(mut state) => {
                let client = state.next_client;
                state.next_client += 1;
                state.queues.insert(client, VecDeque::new());
                client
            }
            // A poisoned display yields a connection whose every call fails.
            Err(_) => 0,
        };
        MemoryConnection {
            display: Arc::clone(&self.inner),
            client,
        }
    }

    /// Returns the current owner of a selection, if any.
    pub fn owner(&self, selection: Selection) -> Option<WindowId> {
        let state = self.inner.lock().ok()?;
        let atom = state.atoms.get(selection.atom_name())?;
        state.owners.get(atom).map(|owner| owner.window)
    }

    /// Number of open client connections.
    pub fn connections(&self) -> usize {
        self.inner.lock().map(|state| state.queues.len()).unwrap_or(0)
    }

    /// Closes the connection that created `window`, like `XKillClient`.
    ///
    /// Its selections are released without notice and its next event read
    /// fails. Returns false if no client owns `window`.
    pub fn kill_client(&self, window: WindowId) -> bool {
        let Ok(mut state) = self.inner.lock() else {
            return false;
        };
        let Some(client) = state.windows.get(&window).map(|w| w.client) else {
            return false;
        };
        state.remove_client(client);
        drop(state);
        self.inner.events.notify_all();
        true
    }

    /// Makes the display ignore every ownership claim from now on.
    pub fn refuse_claims(&self, refuse: bool) {
        if let Ok(mut state) = self.inner.lock() {
            state.claims_refused = refuse;
        }
    }
}

impl Default for MemoryDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MemoryDisplay {
    fn connect(&self) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(Arc::new(self.connect_client()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// One client's connection to a [`MemoryDisplay`].
pub struct MemoryConnection {
    display: Arc<DisplayInner>,
    client: ClientId,
}

impl MemoryConnection {
    fn notify_all(&self) {
        self.display.events.notify_all();
    }
}

impl Transport for MemoryConnection {
    fn intern_atom(&self, name: &str) -> Result<Atom, TransportError> {
        let mut state = self.display.lock()?;
        if let Some(atom) = state.atoms.get(name) {
            return Ok(*atom);
        }
        let atom = Atom::new(state.next_atom);
        state.next_atom += 1;
        state.atoms.insert(name.to_string(), atom);
        state.names.insert(atom, name.to_string());
        Ok(atom)
    }

    fn atom_name(&self, atom: Atom) -> Result<String, TransportError> {
        let state = self.display.lock()?;
        state
            .names
            .get(&atom)
            .cloned()
            .ok_or_else(|| TransportError::request("GetAtomName", format!("BadAtom {atom}")))
    }

    fn create_window(&self) -> Result<WindowId, TransportError> {
        let mut state = self.display.lock()?;
        let window = WindowId::new(state.next_window);
        state.next_window += 1;
        state.windows.insert(
            window,
            WindowState {
                client: self.client,
                properties: HashMap::new(),
            },
        );
        Ok(window)
    }

    fn set_selection_owner(
        &self,
        owner: WindowId,
        selection: Atom,
        time: Timestamp,
    ) -> Result<(), TransportError> {
        let mut state = self.display.lock()?;
        let client = if owner.is_none() {
            self.client
        } else {
            state.window(owner, "SetSelectionOwner")?.client
        };
        let time = state.resolve_time(time);

        if state.claims_refused {
            return Ok(());
        }

        let previous = state.owners.get(&selection).copied();
        if let Some(previous) = previous {
            if time < previous.since {
                return Ok(());
            }
            if previous.window != owner {
                state.push(
                    previous.client,
                    ProtocolEvent::SelectionClear(SelectionClear {
                        time,
                        owner: previous.window,
                        selection,
                    }),
                );
            }
        }

        if owner.is_none() {
            state.owners.remove(&selection);
        } else {
            state.owners.insert(
                selection,
                Owner {
                    window: owner,
                    client,
                    since: time,
                },
            );
        }
        drop(state);
        self.notify_all();
        Ok(())
    }

    fn selection_owner(&self, selection: Atom) -> Result<WindowId, TransportError> {
        let state = self.display.lock()?;
        Ok(state
            .owners
            .get(&selection)
            .map(|owner| owner.window)
            .unwrap_or(WindowId::NONE))
    }

    fn convert_selection(
        &self,
        requestor: WindowId,
        selection: Atom,
        target: Atom,
        property: Atom,
        time: Timestamp,
    ) -> Result<(), TransportError> {
        let mut state = self.display.lock()?;
        let requestor_client = state.window(requestor, "ConvertSelection")?.client;
        let time = state.resolve_time(time);

        match state.owners.get(&selection).copied() {
            Some(owner) => state.push(
                owner.client,
                ProtocolEvent::SelectionRequest(SelectionRequest {
                    time,
                    owner: owner.window,
                    requestor,
                    selection,
                    target,
                    property,
                }),
            ),
            None => state.push(
                requestor_client,
                ProtocolEvent::SelectionNotify(SelectionNotify {
                    time,
                    requestor,
                    selection,
                    target,
                    property: Atom::NONE,
                }),
            ),
        }
        drop(state);
        self.notify_all();
        Ok(())
    }

    fn change_property(
        &self,
        window: WindowId,
        property: Atom,
        type_: Atom,
        data: PropertyData<'_>,
    ) -> Result<(), TransportError> {
        let mut state = self.display.lock()?;
        let window = state
            .windows
            .get_mut(&window)
            .ok_or_else(|| TransportError::request("ChangeProperty", format!("BadWindow {window}")))?;
        window.properties.insert(
            property,
            StoredProperty {
                type_,
                format: data.format(),
                data: data.to_bytes(),
            },
        );
        Ok(())
    }

    fn get_property(
        &self,
        window: WindowId,
        property: Atom,
        type_: Atom,
        max_bytes: u32,
        delete: bool,
    ) -> Result<PropertyReply, TransportError> {
        let mut state = self.display.lock()?;
        let window = state
            .windows
            .get_mut(&window)
            .ok_or_else(|| TransportError::request("GetProperty", format!("BadWindow {window}")))?;

        let Some(stored) = window.properties.get(&property) else {
            return Ok(PropertyReply::default());
        };
        let total = u32::try_from(stored.data.len()).unwrap_or(u32::MAX);

        if !type_.is_none() && type_ != stored.type_ {
            return Ok(PropertyReply {
                type_: stored.type_,
                format: stored.format,
                bytes_after: total,
                value: Vec::new(),
            });
        }

        // Lengths are counted in 32-bit units on the wire.
        let limit = max_bytes - max_bytes % 4;
        let returned = total.min(limit);
        let reply = PropertyReply {
            type_: stored.type_,
            format: stored.format,
            bytes_after: total - returned,
            value: stored
                .data
                .get(..returned as usize)
                .map(<[u8]>::to_vec)
                .unwrap_or_default(),
        };

        if delete && reply.bytes_after == 0 {
            window.properties.remove(&property);
        }
        Ok(reply)
    }

    fn send_selection_notify(&self, notify: &SelectionNotify) -> Result<(), TransportError> {
        let mut state = self.display.lock()?;
        let client = state.window(notify.requestor, "SendEvent")?.client;
        state.push(client, ProtocolEvent::SelectionNotify(*notify));
        drop(state);
        self.notify_all();
        Ok(())
    }

    fn wake(&self, window: WindowId) -> Result<(), TransportError> {
        let mut state = self.display.lock()?;
        let client = state.window(window, "SendEvent")?.client;
        state.push(client, ProtocolEvent::Wakeup);
        drop(state);
        self.notify_all();
        Ok(())
    }

    fn wait_for_event(&self) -> Result<ProtocolEvent, TransportError> {
        let mut state = self.display.lock()?;
        loop {
            match state.queues.get_mut(&self.client) {
                Some(queue) => {
                    if let Some(event) = queue.pop_front() {
                        return Ok(event);
                    }
                }
                None => {
                    return Err(TransportError::Disconnected(
                        "client is not connected to the memory display".to_string(),
                    ))
                }
            }
            state = self.display.events.wait(state).map_err(|_| poisoned())?;
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if let Ok(mut state) = self.display.lock() {
            state.remove_client(self.client);
        }
        self.display.events.notify_all();
    }
}
