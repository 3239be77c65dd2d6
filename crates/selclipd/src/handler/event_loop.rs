//! Event loop actor - serves selection requests and routes replies.
//!
//! The EventLoop is the single reader of display events for a session.
//! It answers requests for the selection it owns, forwards notifications
//! for the session's own conversion requests, and reports loss of
//! ownership.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Read errors are logged and the loop keeps going

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn, Level};

use selclip_protocol::{
    plan_response, PropertyData, ProtocolAtoms, ProtocolEvent, Response, SelectionClear,
    SelectionNotify, SelectionRequest, WindowId,
};

use super::OwnershipEnd;
use crate::atoms::AtomDirectory;
use crate::transport::Transport;

/// The event loop actor.
///
/// # Ownership
///
/// The loop owns:
/// - the read side of the display connection (it is the only caller of
///   `wait_for_event`)
/// - its own atom directory, used to name targets in logs
/// - the sending halves of the notification and completion channels
pub struct EventLoop {
    transport: Arc<dyn Transport>,
    window: WindowId,
    atoms: ProtocolAtoms,
    directory: AtomDirectory,
    pending: watch::Receiver<Arc<str>>,
    notifications: mpsc::Sender<SelectionNotify>,
    completion: Option<oneshot::Sender<OwnershipEnd>>,
    cancel: CancellationToken,
}

impl EventLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn Transport>,
        window: WindowId,
        atoms: ProtocolAtoms,
        directory: AtomDirectory,
        pending: watch::Receiver<Arc<str>>,
        notifications: mpsc::Sender<SelectionNotify>,
        completion: oneshot::Sender<OwnershipEnd>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            window,
            atoms,
            directory,
            pending,
            notifications,
            completion: Some(completion),
            cancel,
        }
    }

    /// Runs the loop until cancelled or the connection is lost.
    ///
    /// Blocks the calling thread.
    pub fn run(mut self) {
        debug!(window = %self.window, "Event loop starting");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.transport.wait_for_event() {
                Ok(event) => self.handle_event(event),
                Err(e) if e.is_fatal() => {
                    warn!(window = %self.window, error = %e, "Display connection lost");
                    self.finish(OwnershipEnd::ConnectionLost);
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read display event");
                }
            }
        }

        debug!(window = %self.window, "Event loop stopped");
    }

    /// Dispatches an event to the appropriate handler.
    pub fn handle_event(&mut self, event: ProtocolEvent) {
        match event {
            ProtocolEvent::SelectionRequest(request) => self.handle_request(&request),
            ProtocolEvent::SelectionNotify(notify) => self.handle_notify(&notify),
            ProtocolEvent::SelectionClear(clear) => self.handle_clear(&clear),
            ProtocolEvent::Wakeup => trace!("Woken"),
            ProtocolEvent::Other(kind) => trace!(kind, "Ignoring event"),
        }
    }

    // ========================================================================
    // Event Handlers
    // ========================================================================

    /// Answers a request from another client.
    ///
    /// Every request gets a notify, refusals included, unless writing the
    /// reply property failed.
    fn handle_request(&mut self, request: &SelectionRequest) {
        if tracing::enabled!(Level::DEBUG) {
            let target_name = self.atom_label(request.target);
            debug!(
                requestor = %request.requestor,
                requested = %target_name,
                selection = ?self.atoms.selection_of(request.selection),
                "Selection request"
            );
        }

        let property = request.reply_property();
        let notify = match plan_response(request, &self.atoms) {
            Response::Text => {
                let text = Arc::clone(&*self.pending.borrow());
                let written = self.transport.change_property(
                    request.requestor,
                    property,
                    self.atoms.utf8_text,
                    PropertyData::Utf8(text.as_bytes()),
                );
                if let Err(e) = written {
                    warn!(error = %e, requestor = %request.requestor, "Failed to send text");
                    return;
                }
                debug!(bytes = text.len(), "Sent text");
                SelectionNotify::accept(request)
            }
            Response::TargetList => {
                let targets = self.atoms.supported_targets();
                let written = self.transport.change_property(
                    request.requestor,
                    property,
                    self.atoms.atom,
                    PropertyData::Atoms(&targets),
                );
                if let Err(e) = written {
                    warn!(error = %e, requestor = %request.requestor, "Failed to send targets");
                    return;
                }
                debug!("Sent targets");
                SelectionNotify::accept(request)
            }
            Response::Decline => {
                debug!("Declining unsupported target");
                SelectionNotify::refuse(request)
            }
        };

        if let Err(e) = self.transport.send_selection_notify(&notify) {
            warn!(error = %e, requestor = %request.requestor, "Failed to send selection notify");
        }
    }

    /// Hands the answer to one of our own conversion requests to the
    /// session, which matches it against the request it is waiting on.
    ///
    /// Never blocks: if nobody collected the previous answer (a retrieval
    /// that timed out), this one is dropped.
    fn handle_notify(&mut self, notify: &SelectionNotify) {
        match self.notifications.try_send(*notify) {
            Ok(()) => trace!(requested = %notify.target, "Forwarded selection notify"),
            Err(TrySendError::Full(_)) => {
                debug!(requested = %notify.target, "Notification slot full, dropping stale answer");
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Session gone, dropping selection notify");
            }
        }
    }

    fn handle_clear(&mut self, clear: &SelectionClear) {
        info!(
            selection = ?self.atoms.selection_of(clear.selection),
            owner = %clear.owner,
            "Selection ownership lost"
        );
        self.finish(OwnershipEnd::Superseded);
    }

    /// Fires the completion channel; later calls are no-ops.
    fn finish(&mut self, end: OwnershipEnd) {
        if let Some(done) = self.completion.take() {
            // The receiver may already be gone (session dropped).
            let _ = done.send(end);
        }
    }

    fn atom_label(&mut self, atom: selclip_protocol::Atom) -> String {
        self.directory
            .name_of(atom)
            .unwrap_or_else(|_| format!("#{atom}"))
    }
}

#[cfg(test)]
mod tests {
    use selclip_protocol::{decode_atom_list, Atom, Timestamp};

    use super::*;
    use crate::transport::MemoryDisplay;

    struct Fixture {
        display: MemoryDisplay,
        event_loop: EventLoop,
        atoms: ProtocolAtoms,
        pending: watch::Sender<Arc<str>>,
        notifications: mpsc::Receiver<SelectionNotify>,
        completion: oneshot::Receiver<OwnershipEnd>,
    }

    fn fixture() -> Fixture {
        let display = MemoryDisplay::new();
        let transport: Arc<dyn Transport> = Arc::new(display.connect_client());
        let window = transport.create_window().unwrap();
        let mut directory = AtomDirectory::new(Arc::clone(&transport));
        let atoms = directory.protocol_atoms().unwrap();

        let (pending, pending_rx) = watch::channel(Arc::<str>::from("gopher"));
        let (notify_tx, notifications) = mpsc::channel(1);
        let (done_tx, completion) = oneshot::channel();

        let event_loop = EventLoop::new(
            transport,
            window,
            atoms,
            directory,
            pending_rx,
            notify_tx,
            done_tx,
            CancellationToken::new(),
        );

        Fixture {
            display,
            event_loop,
            atoms,
            pending,
            notifications,
            completion,
        }
    }

    /// A bare client that plays the requestor.
    fn requestor(display: &MemoryDisplay) -> (Arc<dyn Transport>, WindowId) {
        let conn: Arc<dyn Transport> = Arc::new(display.connect_client());
        let window = conn.create_window().unwrap();
        (conn, window)
    }

    fn request(f: &Fixture, requestor: WindowId, target: Atom) -> SelectionRequest {
        SelectionRequest {
            time: Timestamp::new(7),
            owner: f.event_loop.window,
            requestor,
            selection: f.atoms.clipboard,
            target,
            property: f.atoms.clipboard,
        }
    }

    fn next_notify(conn: &Arc<dyn Transport>) -> SelectionNotify {
        match conn.wait_for_event().unwrap() {
            ProtocolEvent::SelectionNotify(notify) => notify,
            other => panic!("expected SelectionNotify, got {other:?}"),
        }
    }

    #[test]
    fn test_text_request_writes_pending_text() {
        let mut f = fixture();
        f.pending.send_replace(Arc::from("ゴーファー"));
        let (conn, window) = requestor(&f.display);

        let req = request(&f, window, f.atoms.utf8_text);
        f.event_loop.handle_event(ProtocolEvent::SelectionRequest(req));

        let notify = next_notify(&conn);
        assert_eq!(notify.property, f.atoms.clipboard);
        assert_eq!(notify.time, Timestamp::new(7));

        let reply = conn
            .get_property(window, f.atoms.clipboard, f.atoms.utf8_text, 1024, true)
            .unwrap();
        assert_eq!(reply.format, 8);
        assert_eq!(String::from_utf8(reply.value).unwrap(), "ゴーファー");
    }

    #[test]
    fn test_targets_request_lists_two_targets() {
        let mut f = fixture();
        let (conn, window) = requestor(&f.display);

        let req = request(&f, window, f.atoms.targets);
        f.event_loop.handle_event(ProtocolEvent::SelectionRequest(req));

        let notify = next_notify(&conn);
        assert!(!notify.is_refusal());

        let reply = conn
            .get_property(window, f.atoms.clipboard, f.atoms.atom, 1024, true)
            .unwrap();
        assert_eq!(reply.format, 32);
        assert_eq!(
            decode_atom_list(&reply.value),
            vec![f.atoms.targets, f.atoms.utf8_text]
        );
    }

    #[test]
    fn test_unsupported_target_is_declined_with_notify() {
        let mut f = fixture();
        let (conn, window) = requestor(&f.display);
        let png = conn.intern_atom("image/png").unwrap();

        let req = request(&f, window, png);
        f.event_loop.handle_event(ProtocolEvent::SelectionRequest(req));

        let notify = next_notify(&conn);
        assert!(notify.is_refusal());
        assert_eq!(notify.target, png);
        assert_eq!(notify.requestor, window);
    }

    #[test]
    fn test_failed_write_skips_notify() {
        let mut f = fixture();
        let (conn, window) = requestor(&f.display);

        // Requestor window does not exist.
        let req = request(&f, WindowId::new(0xdead), f.atoms.utf8_text);
        f.event_loop.handle_event(ProtocolEvent::SelectionRequest(req));

        // Nothing was queued for the real requestor; the next event it sees
        // is the wake-up we send ourselves.
        conn.wake(window).unwrap();
        assert_eq!(conn.wait_for_event().unwrap(), ProtocolEvent::Wakeup);
    }

    #[test]
    fn test_notify_is_forwarded_without_blocking() {
        let mut f = fixture();
        let req = request(&f, f.event_loop.window, f.atoms.utf8_text);

        f.event_loop
            .handle_event(ProtocolEvent::SelectionNotify(SelectionNotify::accept(&req)));
        // Slot is full: the second answer is dropped instead of blocking.
        f.event_loop
            .handle_event(ProtocolEvent::SelectionNotify(SelectionNotify::refuse(&req)));

        assert_eq!(
            f.notifications.try_recv().unwrap(),
            SelectionNotify::accept(&req)
        );
        assert!(f.notifications.try_recv().is_err());
    }

    #[test]
    fn test_refused_notify_is_forwarded_as_is() {
        let mut f = fixture();
        let req = request(&f, f.event_loop.window, f.atoms.utf8_text);

        f.event_loop
            .handle_event(ProtocolEvent::SelectionNotify(SelectionNotify::refuse(&req)));

        let notify = f.notifications.try_recv().unwrap();
        assert!(notify.is_refusal());
        assert!(!f.atoms.notify_delivered(&notify));
        assert_eq!(notify.target, f.atoms.utf8_text);
    }

    #[test]
    fn test_run_stops_when_connection_is_lost() {
        let f = fixture();
        let Fixture {
            display,
            event_loop,
            mut completion,
            ..
        } = f;
        let window = event_loop.window;

        let handle = std::thread::spawn(move || event_loop.run());
        assert!(display.kill_client(window));

        handle.join().unwrap();
        assert_eq!(completion.try_recv().unwrap(), OwnershipEnd::ConnectionLost);
    }

    #[test]
    fn test_clear_fires_completion_once() {
        let mut f = fixture();
        let clear = SelectionClear {
            time: Timestamp::new(9),
            owner: f.event_loop.window,
            selection: f.atoms.clipboard,
        };

        f.event_loop.handle_event(ProtocolEvent::SelectionClear(clear));
        f.event_loop.handle_event(ProtocolEvent::SelectionClear(clear));

        assert_eq!(f.completion.try_recv().unwrap(), OwnershipEnd::Superseded);
    }

    #[test]
    fn test_run_stops_when_cancelled() {
        let f = fixture();
        let cancel = f.event_loop.cancel.clone();
        let window = f.event_loop.window;
        let transport = Arc::clone(&f.event_loop.transport);

        let handle = std::thread::spawn(move || f.event_loop.run());
        cancel.cancel();
        transport.wake(window).unwrap();

        handle.join().unwrap();
    }
}
