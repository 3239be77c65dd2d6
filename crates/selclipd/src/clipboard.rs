//! Blocking clipboard facade.
//!
//! [`Clipboard`] wraps the async [`Session`] operations for callers that
//! just want `get` and `set`. Each call opens its own session on a fresh
//! current-thread runtime.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Builder;
use tracing::debug;

use selclip_core::{ClipboardConfig, ClipboardError, ClipboardResult, Selection};

use crate::session::Session;
use crate::supervisor::{Readiness, Supervisor};
use crate::transport::{Connector, X11Connector};

/// Clipboard access through one display.
pub struct Clipboard {
    config: ClipboardConfig,
    connector: Arc<dyn Connector>,
}

impl Clipboard {
    /// Loads the configuration from the file and environment.
    pub fn new() -> ClipboardResult<Self> {
        Self::from_config(ClipboardConfig::load()?)
    }

    /// Creates a clipboard on the X display named in `config`.
    ///
    /// Fails with [`ClipboardError::Configuration`] if no display is
    /// configured; nothing is connected until an operation runs.
    pub fn from_config(config: ClipboardConfig) -> ClipboardResult<Self> {
        let connector = X11Connector::new(config.display()?);
        Ok(Self::with_connector(config, Arc::new(connector)))
    }

    /// Creates a clipboard on an arbitrary connector.
    pub fn with_connector(config: ClipboardConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &ClipboardConfig {
        &self.config
    }

    /// Reads the clipboard selection.
    pub fn get(&self) -> ClipboardResult<String> {
        self.get_selection(Selection::Clipboard)
    }

    /// Reads any selection.
    pub fn get_selection(&self, selection: Selection) -> ClipboardResult<String> {
        let connector = Arc::clone(&self.connector);
        block_on(async move {
            let mut session = Session::open(&*connector)?;
            session.retrieve(selection).await
        })
    }

    /// Lists the targets offered by the owner of `selection`.
    pub fn targets(&self, selection: Selection) -> ClipboardResult<Vec<String>> {
        let connector = Arc::clone(&self.connector);
        block_on(async move {
            let mut session = Session::open(&*connector)?;
            session.targets(selection).await
        })
    }

    /// Makes `text` the clipboard contents.
    ///
    /// With detaching enabled this returns once a background process owns
    /// the clipboard, or with the error that kept it from claiming.
    /// Otherwise it blocks until another client takes the clipboard over.
    pub fn set(&self, text: &str) -> ClipboardResult<()> {
        let supervisor = if self.config.detach {
            Supervisor::daemon(self.config.log_file_path())
        } else {
            Supervisor::foreground()
        };
        supervisor.launch(|readiness| self.serve_reporting(text, readiness))
    }

    /// Serves `text` in the calling process until ownership ends.
    pub fn serve(&self, text: &str) -> ClipboardResult<()> {
        self.serve_reporting(text, &mut Readiness::none())
    }

    /// Serves `text`, reporting the claim outcome through `readiness` as
    /// soon as it is known.
    pub fn serve_reporting(&self, text: &str, readiness: &mut Readiness) -> ClipboardResult<()> {
        debug!(display = %self.connector.describe(), bytes = text.len(), "Serving clipboard");
        let connector = Arc::clone(&self.connector);
        let reporter = &mut *readiness;
        let result = block_on(async move {
            let claimed = Session::open(&*connector).and_then(|mut session| {
                session.claim(text)?;
                Ok(session)
            });
            reporter.report(&claimed);
            let mut session = claimed?;
            session.wait_for_release().await.map(|_| ())
        });
        readiness.report(&result);
        result
    }
}

/// Reads the clipboard using the default configuration.
pub fn get() -> ClipboardResult<String> {
    Clipboard::new()?.get()
}

/// Sets the clipboard using the default configuration.
pub fn set(text: &str) -> ClipboardResult<()> {
    Clipboard::new()?.set(text)
}

fn block_on<F, T>(future: F) -> ClipboardResult<T>
where
    F: Future<Output = ClipboardResult<T>>,
{
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ClipboardError::Runtime)?;
    runtime.block_on(future)
}
