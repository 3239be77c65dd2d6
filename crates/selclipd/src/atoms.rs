//! Atom directory - memoized name/atom resolution for one connection.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use selclip_core::{Selection, TransportError};
use selclip_protocol::{names, Atom, ProtocolAtoms};

use crate::transport::Transport;

/// Resolves names to atoms and back, caching both directions.
///
/// The caches only grow: an atom keeps its name for the lifetime of the
/// connection, so entries never need to be invalidated.
#[derive(Clone)]
pub struct AtomDirectory {
    transport: Arc<dyn Transport>,
    by_name: HashMap<String, Atom>,
    by_atom: HashMap<Atom, String>,
}

impl AtomDirectory {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            by_name: HashMap::new(),
            by_atom: HashMap::new(),
        }
    }

    /// Resolves `name`, interning it on first use.
    pub fn resolve(&mut self, name: &str) -> Result<Atom, TransportError> {
        if let Some(atom) = self.by_name.get(name) {
            return Ok(*atom);
        }
        let atom = self.transport.intern_atom(name)?;
        trace!(name, atom = atom.as_u32(), "Interned atom");
        self.remember(atom, name.to_string());
        Ok(atom)
    }

    /// Returns the name of `atom`, asking the display on a cache miss.
    pub fn name_of(&mut self, atom: Atom) -> Result<String, TransportError> {
        if let Some(name) = self.by_atom.get(&atom) {
            return Ok(name.clone());
        }
        let name = self.transport.atom_name(atom)?;
        self.remember(atom, name.clone());
        Ok(name)
    }

    /// Resolves every atom the selection handlers use.
    pub fn protocol_atoms(&mut self) -> Result<ProtocolAtoms, TransportError> {
        Ok(ProtocolAtoms {
            clipboard: self.resolve(Selection::Clipboard.atom_name())?,
            primary: self.resolve(Selection::Primary.atom_name())?,
            utf8_text: self.resolve(names::UTF8_STRING)?,
            targets: self.resolve(names::TARGETS)?,
            atom: self.resolve(names::ATOM)?,
        })
    }

    fn remember(&mut self, atom: Atom, name: String) {
        self.by_name.entry(name.clone()).or_insert(atom);
        self.by_atom.entry(atom).or_insert(name);
    }
}
