//! BadgeParty wire protocol: packet kinds, payload records, and the actions the core asks the device to perform.

use serde::{Deserialize, Serialize};

use crate::identity::PeerId;

/// Current protocol version. Carried in host announcements.
pub const PROTOCOL_VERSION: u8 = 1;

/// First byte of every packet.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    JoinRequest = 1,
    ButtonPress = 2,
    JoinResponse = 3,
    HostAnnounce = 4,
    RoundStart = 5,
    RoundEnd = 6,
    GameOver = 7,
    Heartbeat = 8,
    Disconnect = 9,
    PlayerList = 10,
}

impl PacketKind {
    pub const ALL: [PacketKind; 10] = [
        PacketKind::JoinRequest,
        PacketKind::ButtonPress,
        PacketKind::JoinResponse,
        PacketKind::HostAnnounce,
        PacketKind::RoundStart,
        PacketKind::RoundEnd,
        PacketKind::GameOver,
        PacketKind::Heartbeat,
        PacketKind::Disconnect,
        PacketKind::PlayerList,
    ];

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_byte() == b)
    }
}

/// Client asks a host for a seat. Profile entries are free-form key/value pairs from the contact card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: PeerId,
    pub name: String,
    pub profile: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub accepted: bool,
    pub message: String,
}

/// Periodic host presence broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAnnounce {
    pub protocol_version: u8,
    pub host_id: PeerId,
    pub host_name: String,
    pub player_count: u8,
    pub capacity: u8,
    pub game_active: bool,
}

/// Opens a round. Re-sent while the round is open with the remaining duration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStart {
    pub round: u32,
    pub rule_parameter: Option<u8>,
    pub duration_ms: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonPress {
    pub button: u8,
    pub client_time_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEnd {
    pub round: u32,
    pub eliminated: Vec<PeerId>,
    pub rule_parameter: Option<u8>,
    pub survivors: u8,
}

/// `winner` is `None` when nobody survived the final round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOver {
    pub winner: Option<PeerId>,
    pub winner_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: PeerId,
    pub name: String,
    pub alive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerList {
    pub players: Vec<RosterEntry>,
}

/// All packets, one tagged record per kind. Encoding is kind byte + bincode record (see wire module).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    JoinRequest(JoinRequest),
    JoinResponse(JoinResponse),
    HostAnnounce(HostAnnounce),
    RoundStart(RoundStart),
    ButtonPress(ButtonPress),
    RoundEnd(RoundEnd),
    GameOver(GameOver),
    Heartbeat,
    Disconnect,
    PlayerList(PlayerList),
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::JoinRequest(_) => PacketKind::JoinRequest,
            Packet::JoinResponse(_) => PacketKind::JoinResponse,
            Packet::HostAnnounce(_) => PacketKind::HostAnnounce,
            Packet::RoundStart(_) => PacketKind::RoundStart,
            Packet::ButtonPress(_) => PacketKind::ButtonPress,
            Packet::RoundEnd(_) => PacketKind::RoundEnd,
            Packet::GameOver(_) => PacketKind::GameOver,
            Packet::Heartbeat => PacketKind::Heartbeat,
            Packet::Disconnect => PacketKind::Disconnect,
            Packet::PlayerList(_) => PacketKind::PlayerList,
        }
    }
}

/// Buzzer cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    pub freq_hz: u16,
    pub duration_ms: u16,
}

impl Tone {
    pub const BUTTON: Tone = Tone::new(800, 100);
    pub const ROUND_START: Tone = Tone::new(1000, 200);
    pub const SURVIVED_LOW: Tone = Tone::new(1200, 100);
    pub const SURVIVED_HIGH: Tone = Tone::new(1400, 100);
    pub const ELIMINATED: Tone = Tone::new(400, 300);

    pub const fn new(freq_hz: u16, duration_ms: u16) -> Self {
        Self {
            freq_hz,
            duration_ms,
        }
    }
}

/// Action for the device loop to perform. Sends are fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send { dest: PeerId, bytes: Vec<u8> },
    PlayTone(Tone),
}

impl Action {
    /// Destination of a send, `None` for tones.
    pub fn dest(&self) -> Option<PeerId> {
        match self {
            Action::Send { dest, .. } => Some(*dest),
            Action::PlayTone(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_bytes_are_unique_and_reversible() {
        for kind in PacketKind::ALL {
            assert_eq!(PacketKind::from_byte(kind.as_byte()), Some(kind));
        }
        assert_eq!(PacketKind::from_byte(0), None);
        assert_eq!(PacketKind::from_byte(11), None);
    }

    #[test]
    fn elimination_game_values_preserved() {
        assert_eq!(PacketKind::JoinRequest.as_byte(), 1);
        assert_eq!(PacketKind::ButtonPress.as_byte(), 2);
        assert_eq!(PacketKind::RoundStart.as_byte(), 5);
    }
}
