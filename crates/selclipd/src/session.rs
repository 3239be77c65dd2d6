//! Transport session - one display connection, one endpoint window.
//!
//! A [`Session`] bundles everything a single `set` or `get` needs: the
//! shared transport, the window that sends and receives selection events,
//! the resolved protocol atoms and the channels to the running event loop.
//! Ownership and retrieval operations are implemented in `ownership` and
//! `retrieval`.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use selclip_core::ClipboardError;
use selclip_protocol::{ProtocolAtoms, SelectionNotify, WindowId};

use crate::atoms::AtomDirectory;
use crate::handler::{spawn_event_loop, OwnershipEnd};
use crate::transport::{Connector, Transport};

/// An open display connection with its event loop running.
///
/// Dropping the session stops the event loop and closes the connection.
pub struct Session {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) window: WindowId,
    pub(crate) atoms: ProtocolAtoms,
    pub(crate) directory: AtomDirectory,
    pub(crate) pending: watch::Sender<Arc<str>>,
    pub(crate) notifications: mpsc::Receiver<SelectionNotify>,
    pub(crate) completion: Option<oneshot::Receiver<OwnershipEnd>>,
    pub(crate) claimed: bool,
    cancel: CancellationToken,
}

impl Session {
    /// Connects, creates the endpoint window and starts the event loop.
    pub fn open(connector: &dyn Connector) -> Result<Self, ClipboardError> {
        debug!(display = %connector.describe(), "Opening session");

        let transport = connector.connect()?;
        let window = transport.create_window()?;

        let mut directory = AtomDirectory::new(Arc::clone(&transport));
        let atoms = directory.protocol_atoms()?;

        let handle = spawn_event_loop(
            Arc::clone(&transport),
            window,
            atoms,
            directory.clone(),
        )?;

        debug!(window = %window, "Session opened");

        Ok(Self {
            transport,
            window,
            atoms,
            directory,
            pending: handle.pending,
            notifications: handle.notifications,
            completion: handle.completion,
            claimed: false,
            cancel: handle.cancel,
        })
    }

    /// The endpoint window.
    pub fn window(&self) -> WindowId {
        self.window
    }

    /// The protocol atoms resolved at open.
    pub fn atoms(&self) -> &ProtocolAtoms {
        &self.atoms
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
        // The loop may already be gone with the connection.
        if let Err(e) = self.transport.wake(self.window) {
            trace!(error = %e, "Event loop not woken");
        }
        debug!(window = %self.window, "Session closed");
    }
}
