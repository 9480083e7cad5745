//! Badge party-game protocol and game logic.
//! Host-driven: no I/O; the firmware or simulator passes packets and time in and receives actions.

pub mod client;
pub mod config;
pub mod controller;
pub mod identity;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod round;
pub mod rules;
pub mod session;
pub mod wire;

pub use client::{ClientPhase, ClientView};
pub use config::GameConfig;
pub use controller::{Controller, Role};
pub use identity::{Contacts, Identity, MemoryContacts, PeerId};
pub use protocol::{Action, Packet, Tone, PROTOCOL_VERSION};
pub use registry::RegistryError;
pub use round::RoundError;
pub use rules::{EliminationRule, NoChoicePolicy, RuleKind};
pub use session::{Phase, Session};
pub use wire::{decode_packet, encode_packet, DecodeError, EncodeError};
