//! Ownership handler - claims the clipboard and serves it until replaced.

use std::sync::Arc;

use tracing::{debug, info};

use selclip_core::{ClipboardError, Selection, TransportError};
use selclip_protocol::Timestamp;

use crate::handler::OwnershipEnd;
use crate::session::Session;

impl Session {
    /// Makes this session the owner of the clipboard selection, serving
    /// `text` to requestors.
    ///
    /// The claim is verified by asking the display for the current owner;
    /// the display may accept the request and still not apply it.
    pub fn claim(&mut self, text: &str) -> Result<(), ClipboardError> {
        if self.completion.is_none() {
            return Err(ClipboardError::NotOwner);
        }

        self.pending.send_replace(Arc::from(text));

        let selection = self.atoms.clipboard;
        let ownership = |source| ClipboardError::Ownership {
            selection: Selection::Clipboard,
            source,
        };

        self.transport
            .set_selection_owner(self.window, selection, Timestamp::CURRENT_TIME)
            .map_err(ownership)?;

        let owner = self
            .transport
            .selection_owner(selection)
            .map_err(ownership)?;
        if owner != self.window {
            return Err(ownership(TransportError::Refused(format!(
                "owned by window {owner}"
            ))));
        }

        self.claimed = true;
        info!(window = %self.window, bytes = text.len(), "Clipboard ownership acquired");
        Ok(())
    }

    /// Waits until ownership ends.
    ///
    /// Returns `Ok` when another client took the selection. Only the first
    /// wait after a claim observes the end; later waits fail with
    /// [`ClipboardError::NotOwner`].
    pub async fn wait_for_release(&mut self) -> Result<OwnershipEnd, ClipboardError> {
        if !self.claimed {
            return Err(ClipboardError::NotOwner);
        }
        let Some(completion) = self.completion.take() else {
            return Err(ClipboardError::NotOwner);
        };
        self.claimed = false;

        match completion.await {
            Ok(OwnershipEnd::Superseded) => {
                info!(window = %self.window, "Clipboard taken by another client");
                Ok(OwnershipEnd::Superseded)
            }
            Ok(OwnershipEnd::ConnectionLost) => Err(TransportError::Disconnected(
                "connection closed while owning the clipboard".to_string(),
            )
            .into()),
            Err(_) => {
                debug!("Event loop dropped the completion channel");
                Err(TransportError::Disconnected("event loop stopped".to_string()).into())
            }
        }
    }

    /// Claims the clipboard with `text` and serves it until another client
    /// takes it over.
    pub async fn serve(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.claim(text)?;
        self.wait_for_release().await.map(|_| ())
    }
}
