//! Selection event loop using the Actor pattern.
//!
//! Every session runs one [`EventLoop`] on a dedicated thread. The loop
//! owns all mutable protocol state and talks to the session only through
//! channels:
//!
//! ```text
//! ┌─────────────────┐  pending text (watch)   ┌─────────────────┐
//! │                 │────────────────────────▶│                 │
//! │     Session     │  notifications (mpsc,1) │    EventLoop    │◀── display events
//! │                 │◀────────────────────────│  (own thread)   │
//! │                 │  completion (oneshot)   │                 │
//! │                 │◀────────────────────────│                 │
//! └─────────────────┘                         └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - Channel send failures are logged, never fatal to the loop

use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use selclip_core::ClipboardError;
use selclip_protocol::{ProtocolAtoms, SelectionNotify, WindowId};

use crate::atoms::AtomDirectory;
use crate::transport::Transport;

mod event_loop;

pub use event_loop::EventLoop;

/// The notification slot holds a single pending answer.
const NOTIFICATION_BUFFER: usize = 1;

/// Name of the event loop thread.
const THREAD_NAME: &str = "selclip-events";

/// Why an ownership term ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipEnd {
    /// Another client claimed the selection.
    Superseded,
    /// The display connection went away.
    ConnectionLost,
}

/// Session side of the channels to a running event loop.
pub struct EventLoopHandle {
    /// Text served to requestors.
    pub pending: watch::Sender<Arc<str>>,
    /// Answers to our own conversion requests.
    pub notifications: mpsc::Receiver<SelectionNotify>,
    /// Fires once when ownership ends. Taken by the first waiter.
    pub completion: Option<oneshot::Receiver<OwnershipEnd>>,
    /// Stops the loop at its next wake-up.
    pub cancel: CancellationToken,
}

/// Spawn the event loop for `window` and return its channels.
///
/// The loop thread is detached; it ends when the handle's token is
/// cancelled and the loop is woken, or when the connection is lost.
pub fn spawn_event_loop(
    transport: Arc<dyn Transport>,
    window: WindowId,
    atoms: ProtocolAtoms,
    directory: AtomDirectory,
) -> Result<EventLoopHandle, ClipboardError> {
    let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_BUFFER);
    let (done_tx, done_rx) = oneshot::channel();
    let (pending_tx, pending_rx) = watch::channel(Arc::<str>::from(""));
    let cancel = CancellationToken::new();

    let event_loop = EventLoop::new(
        transport,
        window,
        atoms,
        directory,
        pending_rx,
        notify_tx,
        done_tx,
        cancel.clone(),
    );

    thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || event_loop.run())
        .map_err(ClipboardError::Runtime)?;

    Ok(EventLoopHandle {
        pending: pending_tx,
        notifications: notify_rx,
        completion: Some(done_rx),
        cancel,
    })
}
