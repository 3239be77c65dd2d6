//! Blocking `Clipboard` facade tests.
//!
//! `set` runs in the foreground here: it blocks its thread until another
//! client claims the clipboard.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use selclip_core::{ClipboardConfig, ClipboardError, Selection, TransportError};
use selclipd::{Clipboard, MemoryDisplay};

// ============================================================================
// Constants
// ============================================================================

const OWNER_WAIT_TIMEOUT: Duration = Duration::from_secs(2);
const OWNER_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Test Helpers
// ============================================================================

fn clipboard(display: &MemoryDisplay) -> Clipboard {
    Clipboard::with_connector(
        ClipboardConfig::foreground("memory"),
        Arc::new(display.clone()),
    )
}

fn wait_for_owner(display: &MemoryDisplay) {
    let start = std::time::Instant::now();
    while start.elapsed() < OWNER_WAIT_TIMEOUT {
        if display.owner(Selection::Clipboard).is_some() {
            return;
        }
        thread::sleep(OWNER_POLL_INTERVAL);
    }
    panic!("clipboard was never claimed");
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_set_then_get() {
    let display = MemoryDisplay::new();
    let owner = clipboard(&display);
    let setter = thread::spawn(move || owner.set("ゴーファー"));

    wait_for_owner(&display);
    assert_eq!(clipboard(&display).get().unwrap(), "ゴーファー");

    // Taking over ends the first set.
    let next = clipboard(&display);
    let _second = thread::spawn(move || next.set("gopher"));

    setter.join().unwrap().unwrap();
    assert_eq!(clipboard(&display).get().unwrap(), "gopher");
}

#[test]
fn test_targets_through_facade() {
    let display = MemoryDisplay::new();
    let owner = clipboard(&display);
    let _setter = thread::spawn(move || owner.set("gopher"));
    wait_for_owner(&display);

    let targets = clipboard(&display).targets(Selection::Clipboard).unwrap();
    assert_eq!(targets, ["TARGETS", "UTF8_STRING"]);
}

#[test]
fn test_refused_claim_fails_set() {
    let display = MemoryDisplay::new();
    display.refuse_claims(true);

    let err = clipboard(&display).set("gopher").unwrap_err();
    match err {
        ClipboardError::Ownership { selection, source } => {
            assert_eq!(selection, Selection::Clipboard);
            assert!(matches!(source, TransportError::Refused(_)));
        }
        other => panic!("expected Ownership, got {other:?}"),
    }
}

#[test]
fn test_missing_display_is_configuration_error() {
    let config = ClipboardConfig::default().with_env(|_| None);
    let err = Clipboard::from_config(config).err().unwrap();
    assert!(matches!(err, ClipboardError::Configuration(_)));

    let blank = ClipboardConfig::default().with_env(|key| {
        (key == "DISPLAY").then(|| "  ".to_string())
    });
    let err = Clipboard::from_config(blank).err().unwrap();
    assert!(matches!(err, ClipboardError::Configuration(_)));
}

#[test]
fn test_primary_unowned_reads_empty() {
    let display = MemoryDisplay::new();
    let owner = clipboard(&display);
    let _setter = thread::spawn(move || owner.set("gopher"));
    wait_for_owner(&display);

    assert_eq!(
        clipboard(&display).get_selection(Selection::Primary).unwrap(),
        ""
    );
}
