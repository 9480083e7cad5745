//! Badge identity: peer addresses, display names, and the contacts store the host device provides.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Longest display name carried on the wire, in bytes.
pub const NAME_MAX_BYTES: usize = 20;

/// Radio address of a badge. Serialized as a bare u16.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize)]
pub struct PeerId(pub u16);

impl PeerId {
    /// Reserved all-peers destination.
    pub const BROADCAST: PeerId = PeerId(0xFFFF);

    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

impl From<u16> for PeerId {
    fn from(v: u16) -> Self {
        PeerId(v)
    }
}

/// Truncate a display name to `NAME_MAX_BYTES` without splitting a UTF-8 character.
pub fn truncate_name(name: &str) -> String {
    if name.len() <= NAME_MAX_BYTES {
        return name.to_string();
    }
    let mut end = NAME_MAX_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// Fallback name for badges without a contact card, e.g. "Badge4A23".
pub fn default_name(id: PeerId) -> String {
    format!("Badge{}", id)
}

/// A badge's id and display name.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: PeerId,
    pub name: String,
}

impl Identity {
    pub fn new(id: PeerId, name: &str) -> Self {
        let name = if name.is_empty() {
            default_name(id)
        } else {
            truncate_name(name)
        };
        Self { id, name }
    }
}

/// Contact storage provided by the device: who am I, and who have I met.
pub trait Contacts {
    fn my_identity(&self) -> Identity;
    fn lookup(&self, id: PeerId) -> Option<Identity>;
    fn store(&mut self, identity: Identity);
}

/// In-memory contacts; the firmware's flash-backed store is out of scope.
#[derive(Debug, Clone)]
pub struct MemoryContacts {
    me: Identity,
    known: HashMap<PeerId, Identity>,
}

impl MemoryContacts {
    pub fn new(me: Identity) -> Self {
        Self {
            me,
            known: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

impl Contacts for MemoryContacts {
    fn my_identity(&self) -> Identity {
        self.me.clone()
    }

    fn lookup(&self, id: PeerId) -> Option<Identity> {
        self.known.get(&id).cloned()
    }

    fn store(&mut self, identity: Identity) {
        if identity.id == self.me.id || identity.id.is_broadcast() {
            return;
        }
        self.known.insert(identity.id, identity);
    }
}
