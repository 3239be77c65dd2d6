//! selclipd - X11 selection owner and retriever
//!
//! This crate implements clipboard get/set on top of the X11
//! selection-ownership protocol:
//! - `transport` - display connections (`x11rb`, and an in-process display)
//! - `atoms` - memoized atom resolution per connection
//! - `session` - one connection, one endpoint window, one event loop
//! - `handler` - the event loop serving requests and routing replies
//! - `ownership` / `retrieval` - the `set` and `get` halves of a session
//! - `supervisor` - detaching the owner from the calling process
//! - `clipboard` - blocking facade used by the CLI
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     selclip process                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   Clipboard     │────▶│   Supervisor (set only)     │   │
//! │  │ (blocking API)  │     │  (detached owner process)   │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ get                         │ serve             │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │    Session      │◀───▶│   EventLoop (own thread)    │   │
//! │  │ (requests out)  │     │   (events in, replies out)  │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           └──────────────┬──────────────┘                   │
//! │                          ▼                                  │
//! │               Arc<dyn Transport> (display)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod atoms;
pub mod clipboard;
pub mod handler;
mod ownership;
mod retrieval;
pub mod session;
pub mod supervisor;
pub mod transport;

pub use clipboard::{get, set, Clipboard};
pub use handler::OwnershipEnd;
pub use session::Session;
pub use supervisor::{
    Daemonizer, Detach, Foreground, Handshake, Placement, Readiness, Supervisor, SupervisorError,
};
pub use transport::{Connector, MemoryDisplay, Transport, X11Connector};
