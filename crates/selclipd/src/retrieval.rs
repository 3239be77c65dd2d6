//! Retrieval handler - asks the current owner for the selection contents.
//!
//! A retrieval names the selection atom itself as the destination property
//! on the session window, waits for the owner's notify (bounded by
//! [`RETRIEVAL_TIMEOUT`]) and reads the property back, deleting it.

use std::borrow::Cow;

use tokio::time;
use tracing::{debug, warn};

use selclip_core::{ClipboardError, Selection, TransportError};
use selclip_protocol::{
    decode_atom_list, Atom, Timestamp, MAX_PAYLOAD_BYTES, RETRIEVAL_TIMEOUT,
};

use crate::session::Session;

impl Session {
    /// Reads `selection` as UTF-8 text.
    ///
    /// Returns an empty string when the owner refuses the conversion or
    /// nobody owns the selection.
    pub async fn retrieve(&mut self, selection: Selection) -> Result<String, ClipboardError> {
        let target = self.atoms.utf8_text;
        let Some(bytes) = self.convert(selection, target).await? else {
            return Ok(String::new());
        };

        let text = match String::from_utf8_lossy(&bytes) {
            Cow::Borrowed(text) => text.to_string(),
            Cow::Owned(text) => {
                warn!(%selection, bytes = bytes.len(), "Selection is not valid UTF-8, replacing invalid sequences");
                text
            }
        };
        debug!(%selection, bytes = text.len(), "Retrieved selection");
        Ok(text)
    }

    /// Lists the targets the owner of `selection` advertises.
    ///
    /// Returns an empty list when the owner refuses or nobody owns the
    /// selection.
    pub async fn targets(&mut self, selection: Selection) -> Result<Vec<String>, ClipboardError> {
        let target = self.atoms.targets;
        let Some(bytes) = self.convert(selection, target).await? else {
            return Ok(Vec::new());
        };

        decode_atom_list(&bytes)
            .into_iter()
            .map(|atom| self.directory.name_of(atom).map_err(ClipboardError::from))
            .collect()
    }

    /// Runs one conversion round trip and returns the delivered bytes, or
    /// `None` if the conversion was refused.
    async fn convert(
        &mut self,
        selection: Selection,
        target: Atom,
    ) -> Result<Option<Vec<u8>>, ClipboardError> {
        while let Ok(stale) = self.notifications.try_recv() {
            debug!(requested = %stale.target, "Discarded stale selection notify");
        }

        let property = self.atoms.selection(selection);
        let conversion = |source| ClipboardError::Conversion { selection, source };

        self.transport
            .convert_selection(
                self.window,
                property,
                target,
                property,
                Timestamp::CURRENT_TIME,
            )
            .map_err(conversion)?;

        // Answers to earlier timed-out requests may still be on their way;
        // only a notify for this selection and target ends the wait.
        let notifications = &mut self.notifications;
        let answer = async {
            while let Some(notify) = notifications.recv().await {
                if notify.selection == property && notify.target == target {
                    return Some(notify);
                }
                debug!(%selection, requested = %notify.target, "Discarded unrelated selection notify");
            }
            None
        };
        let notify = match time::timeout(RETRIEVAL_TIMEOUT, answer).await {
            Ok(Some(notify)) => notify,
            Ok(None) => {
                return Err(TransportError::Disconnected("event loop stopped".to_string()).into())
            }
            Err(_) => {
                return Err(ClipboardError::Timeout {
                    selection,
                    waited: RETRIEVAL_TIMEOUT,
                })
            }
        };
        if !self.atoms.notify_delivered(&notify) {
            debug!(%selection, "Conversion refused");
            return Ok(None);
        }

        let expected = if target == self.atoms.targets {
            self.atoms.atom
        } else {
            target
        };
        let reply = self
            .transport
            .get_property(self.window, property, expected, MAX_PAYLOAD_BYTES, true)
            .map_err(conversion)?;

        if !reply.type_.is_none() && reply.type_ != expected {
            return Err(conversion(TransportError::Protocol(format!(
                "owner replied with property type {} instead of {}",
                reply.type_, expected
            ))));
        }
        if reply.bytes_after > 0 {
            return Err(ClipboardError::PayloadTooLarge {
                limit: MAX_PAYLOAD_BYTES,
                remaining: reply.bytes_after,
            });
        }

        Ok(Some(reply.value))
    }
}
