//! Reply rules for an owner and property encoding.

use crate::atom::{Atom, ProtocolAtoms};
use crate::event::{SelectionNotify, SelectionRequest};

/// How an owner answers a selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Write the pending text as `UTF8_STRING`.
    Text,
    /// Write the supported target list as `ATOM`.
    TargetList,
    /// Refuse: the target is not supported.
    Decline,
}

/// Decides the response to a request. Only text and the target list are
/// supported.
pub fn plan_response(request: &SelectionRequest, atoms: &ProtocolAtoms) -> Response {
    if request.target == atoms.utf8_text {
        Response::Text
    } else if request.target == atoms.targets {
        Response::TargetList
    } else {
        Response::Decline
    }
}

impl ProtocolAtoms {
    /// Returns true if a notify reports delivered data.
    ///
    /// Retrievals always name the selection atom as the property, so a
    /// delivered notify carries the clipboard or primary atom; a refusal
    /// carries `None`.
    pub fn notify_delivered(&self, notify: &SelectionNotify) -> bool {
        notify.property == self.clipboard || notify.property == self.primary
    }
}

/// Property contents in one of the two formats the protocol writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyData<'a> {
    /// 8-bit data.
    Utf8(&'a [u8]),
    /// 32-bit atom list.
    Atoms(&'a [Atom]),
}

impl PropertyData<'_> {
    /// Element size in bits.
    pub fn format(&self) -> u8 {
        match self {
            Self::Utf8(_) => 8,
            Self::Atoms(_) => 32,
        }
    }

    /// Encodes the data as raw property bytes (32-bit values in native
    /// byte order, as a local connection carries them).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Utf8(bytes) => bytes.to_vec(),
            Self::Atoms(atoms) => atoms
                .iter()
                .flat_map(|atom| atom.as_u32().to_ne_bytes())
                .collect(),
        }
    }
}

/// Decodes a 32-bit atom list; a trailing partial value is ignored.
pub fn decode_atom_list(bytes: &[u8]) -> Vec<Atom> {
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let mut word = [0u8; 4];
            word.copy_from_slice(chunk);
            Atom::new(u32::from_ne_bytes(word))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{Timestamp, WindowId};

    fn atoms() -> ProtocolAtoms {
        ProtocolAtoms {
            clipboard: Atom::new(70),
            primary: Atom::new(1),
            utf8_text: Atom::new(71),
            targets: Atom::new(72),
            atom: Atom::new(4),
        }
    }

    fn request_for(target: u32) -> SelectionRequest {
        SelectionRequest {
            time: Timestamp::CURRENT_TIME,
            owner: WindowId::new(1),
            requestor: WindowId::new(2),
            selection: Atom::new(70),
            target: Atom::new(target),
            property: Atom::new(70),
        }
    }

    #[test]
    fn test_plan_text() {
        assert_eq!(plan_response(&request_for(71), &atoms()), Response::Text);
    }

    #[test]
    fn test_plan_targets() {
        assert_eq!(plan_response(&request_for(72), &atoms()), Response::TargetList);
    }

    #[test]
    fn test_plan_unsupported_target_declines() {
        assert_eq!(plan_response(&request_for(300), &atoms()), Response::Decline);
        assert_eq!(plan_response(&request_for(4), &atoms()), Response::Decline);
    }

    #[test]
    fn test_notify_delivered() {
        let atoms = atoms();
        let req = request_for(71);
        assert!(atoms.notify_delivered(&SelectionNotify::accept(&req)));
        assert!(!atoms.notify_delivered(&SelectionNotify::refuse(&req)));

        let primary = SelectionNotify {
            property: Atom::new(1),
            ..SelectionNotify::accept(&req)
        };
        assert!(atoms.notify_delivered(&primary));

        let elsewhere = SelectionNotify {
            property: Atom::new(500),
            ..SelectionNotify::accept(&req)
        };
        assert!(!atoms.notify_delivered(&elsewhere));
    }

    #[test]
    fn test_property_formats() {
        let text = PropertyData::Utf8("héllo".as_bytes());
        assert_eq!(text.format(), 8);
        assert_eq!(text.to_bytes().len(), 6);

        let list = [Atom::new(72), Atom::new(71)];
        let targets = PropertyData::Atoms(&list);
        assert_eq!(targets.format(), 32);
        assert_eq!(targets.to_bytes().len(), 8);
    }

    #[test]
    fn test_atom_list_decoding() {
        let list = [Atom::new(72), Atom::new(71)];
        let bytes = PropertyData::Atoms(&list).to_bytes();
        assert_eq!(decode_atom_list(&bytes), list.to_vec());
    }

    #[test]
    fn test_atom_list_ignores_partial_word() {
        let mut bytes = PropertyData::Atoms(&[Atom::new(9)]).to_bytes();
        bytes.push(0xff);
        assert_eq!(decode_atom_list(&bytes), vec![Atom::new(9)]);
    }
}
