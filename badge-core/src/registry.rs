//! Peer registry: who is seated at the host, whether they are still in the game, and when we last heard from them.

use crate::identity::{truncate_name, PeerId};
use crate::protocol::RosterEntry;

/// Hard ceiling on roster size.
pub const MAX_PLAYERS: usize = 15;

/// One seated participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: PeerId,
    pub name: String,
    pub alive: bool,
    pub last_seen: u64,
}

/// Result of a successful upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Refreshed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("roster full ({capacity} players)")]
    RosterFull { capacity: usize },
}

/// Ordered roster (join order) with a connection timeout.
#[derive(Debug, Clone)]
pub struct PeerRegistry {
    peers: Vec<Peer>,
    capacity: usize,
    timeout_ms: u64,
}

impl PeerRegistry {
    /// `capacity` is clamped to `1..=MAX_PLAYERS`.
    pub fn new(capacity: usize, timeout_ms: u64) -> Self {
        Self {
            peers: Vec::new(),
            capacity: capacity.clamp(1, MAX_PLAYERS),
            timeout_ms,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.peers.len() >= self.capacity
    }

    pub fn get(&self, peer_id: PeerId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.id == peer_id)
    }

    pub fn contains(&self, peer_id: PeerId) -> bool {
        self.get(peer_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter()
    }

    /// Insert a new peer (alive) or refresh an existing one's name and last-seen.
    pub fn upsert(
        &mut self,
        peer_id: PeerId,
        name: &str,
        now: u64,
    ) -> Result<Upsert, RegistryError> {
        let name = truncate_name(name);
        if let Some(p) = self.peers.iter_mut().find(|p| p.id == peer_id) {
            p.name = name;
            p.last_seen = now;
            return Ok(Upsert::Refreshed);
        }
        if self.is_full() {
            return Err(RegistryError::RosterFull {
                capacity: self.capacity,
            });
        }
        self.peers.push(Peer {
            id: peer_id,
            name,
            alive: true,
            last_seen: now,
        });
        Ok(Upsert::Inserted)
    }

    /// Refresh last-seen. Returns false for unknown peers.
    pub fn touch(&mut self, peer_id: PeerId, now: u64) -> bool {
        match self.peers.iter_mut().find(|p| p.id == peer_id) {
            Some(p) => {
                p.last_seen = now;
                true
            }
            None => {
                tracing::debug!(peer = %peer_id, "touch from unknown peer");
                false
            }
        }
    }

    /// Returns true only when the peer went from alive to eliminated.
    pub fn mark_eliminated(&mut self, peer_id: PeerId) -> bool {
        match self.peers.iter_mut().find(|p| p.id == peer_id) {
            Some(p) if p.alive => {
                p.alive = false;
                true
            }
            _ => false,
        }
    }

    pub fn revive_all(&mut self) {
        for p in &mut self.peers {
            p.alive = true;
        }
    }

    pub fn remove(&mut self, peer_id: PeerId) -> Option<Peer> {
        let idx = self.peers.iter().position(|p| p.id == peer_id)?;
        Some(self.peers.remove(idx))
    }

    /// Remove every peer silent for longer than the timeout. Caller should broadcast the new roster.
    pub fn expire(&mut self, now: u64) -> Vec<PeerId> {
        let timeout = self.timeout_ms;
        let mut removed = Vec::new();
        self.peers.retain(|p| {
            let keep = now.saturating_sub(p.last_seen) <= timeout;
            if !keep {
                removed.push(p.id);
            }
            keep
        });
        removed
    }

    pub fn alive_count(&self) -> usize {
        self.peers.iter().filter(|p| p.alive).count()
    }

    pub fn alive_ids(&self) -> Vec<PeerId> {
        self.peers.iter().filter(|p| p.alive).map(|p| p.id).collect()
    }

    pub fn name_of(&self, peer_id: PeerId) -> Option<&str> {
        self.get(peer_id).map(|p| p.name.as_str())
    }

    /// Roster as sent in a player list, in join order.
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.peers
            .iter()
            .map(|p| RosterEntry {
                id: p.id,
                name: p.name.clone(),
                alive: p.alive,
            })
            .collect()
    }
}
