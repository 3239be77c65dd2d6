//! Detached `set` tests.
//!
//! These run the real double fork. The serving process is a copy of the
//! test process, so it reports back through files rather than shared
//! memory. Forking tests are serialized.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::fs;
use std::path::PathBuf;
use std::process::{self, Command};
use std::sync::{Arc, Mutex};

use selclip_core::{ClipboardConfig, ClipboardError, TransportError};
use selclip_protocol::{Atom, PropertyData, ProtocolEvent, SelectionNotify, Timestamp, WindowId};
use selclipd::transport::{MemoryConnection, PropertyReply};
use selclipd::{Clipboard, Connector, MemoryDisplay, Transport};

static FORK_LOCK: Mutex<()> = Mutex::new(());

// ============================================================================
// Test Helpers
// ============================================================================

fn detached_config(dir: &tempfile::TempDir) -> ClipboardConfig {
    ClipboardConfig {
        display: Some("memory".to_string()),
        detach: true,
        log_file: Some(dir.path().join("selclip.log")),
    }
}

/// A display nobody can connect to.
struct Unreachable;

impl Connector for Unreachable {
    fn connect(&self) -> Result<Arc<dyn Transport>, TransportError> {
        Err(TransportError::Connect {
            display: "memory".to_string(),
            reason: "no such display".to_string(),
        })
    }

    fn describe(&self) -> String {
        "unreachable".to_string()
    }
}

/// A memory display whose connections record the pid of every process
/// that claims a selection.
struct Recording {
    display: MemoryDisplay,
    claims: PathBuf,
}

impl Connector for Recording {
    fn connect(&self) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(Arc::new(RecordingConnection {
            inner: self.display.connect_client(),
            claims: self.claims.clone(),
        }))
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

struct RecordingConnection {
    inner: MemoryConnection,
    claims: PathBuf,
}

impl Transport for RecordingConnection {
    fn intern_atom(&self, name: &str) -> Result<Atom, TransportError> {
        self.inner.intern_atom(name)
    }

    fn atom_name(&self, atom: Atom) -> Result<String, TransportError> {
        self.inner.atom_name(atom)
    }

    fn create_window(&self) -> Result<WindowId, TransportError> {
        self.inner.create_window()
    }

    fn set_selection_owner(
        &self,
        owner: WindowId,
        selection: Atom,
        time: Timestamp,
    ) -> Result<(), TransportError> {
        fs::write(&self.claims, process::id().to_string()).unwrap();
        self.inner.set_selection_owner(owner, selection, time)
    }

    fn selection_owner(&self, selection: Atom) -> Result<WindowId, TransportError> {
        self.inner.selection_owner(selection)
    }

    fn convert_selection(
        &self,
        requestor: WindowId,
        selection: Atom,
        target: Atom,
        property: Atom,
        time: Timestamp,
    ) -> Result<(), TransportError> {
        self.inner
            .convert_selection(requestor, selection, target, property, time)
    }

    fn change_property(
        &self,
        window: WindowId,
        property: Atom,
        type_: Atom,
        data: PropertyData<'_>,
    ) -> Result<(), TransportError> {
        self.inner.change_property(window, property, type_, data)
    }

    fn get_property(
        &self,
        window: WindowId,
        property: Atom,
        type_: Atom,
        max_bytes: u32,
        delete: bool,
    ) -> Result<PropertyReply, TransportError> {
        self.inner
            .get_property(window, property, type_, max_bytes, delete)
    }

    fn send_selection_notify(&self, notify: &SelectionNotify) -> Result<(), TransportError> {
        self.inner.send_selection_notify(notify)
    }

    fn wake(&self, window: WindowId) -> Result<(), TransportError> {
        self.inner.wake(window)
    }

    fn wait_for_event(&self) -> Result<ProtocolEvent, TransportError> {
        self.inner.wait_for_event()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_detached_set_returns_connect_error() {
    let _guard = FORK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let clipboard = Clipboard::with_connector(detached_config(&dir), Arc::new(Unreachable));

    let err = clipboard.set("gopher").unwrap_err();

    match err {
        ClipboardError::Transport(TransportError::Connect { display, reason }) => {
            assert_eq!(display, "memory");
            assert_eq!(reason, "no such display");
        }
        other => panic!("expected Connect error, got {other:?}"),
    }
}

#[test]
fn test_detached_set_returns_after_background_claim() {
    let _guard = FORK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let claims = dir.path().join("claimed-by");
    let connector = Recording {
        display: MemoryDisplay::new(),
        claims: claims.clone(),
    };
    let clipboard = Clipboard::with_connector(detached_config(&dir), Arc::new(connector));

    clipboard.set("gopher").unwrap();

    // The claim is recorded before `set` returns, by another process.
    let owner: u32 = fs::read_to_string(&claims)
        .expect("no claim recorded before set returned")
        .parse()
        .unwrap();
    assert_ne!(owner, process::id());

    // The background owner serves until taken over; stop it.
    let status = Command::new("kill").arg(owner.to_string()).status().unwrap();
    assert!(status.success());
}
