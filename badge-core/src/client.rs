//! Client state machine: find a host, join, play rounds, show the outcome.
//! Mirrors the host's session from the badge's point of view. No I/O.

use std::collections::HashMap;

use crate::config::GameConfig;
use crate::identity::{Identity, PeerId};
use crate::protocol::{
    Action, ButtonPress, GameOver, HostAnnounce, JoinRequest, JoinResponse, Packet, PlayerList,
    RosterEntry, RoundEnd, RoundStart, Tone, PROTOCOL_VERSION,
};
use crate::rules::Choice;
use crate::wire::{self, DecodeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    Discovering,
    Connected,
    Playing,
    /// Terminal until `reset`.
    Eliminated,
    /// Terminal until `reset`.
    Won,
}

/// A host heard from while discovering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredHost {
    pub id: PeerId,
    pub name: String,
    pub player_count: u8,
    pub capacity: u8,
    pub game_active: bool,
    pub seen_at: u64,
}

impl DiscoveredHost {
    pub fn is_full(&self) -> bool {
        self.player_count >= self.capacity
    }
}

/// What the client knows about the current round. `deadline` is local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSnapshot {
    pub round: u32,
    pub rule_parameter: Option<u8>,
    pub deadline: u64,
}

pub struct ClientView {
    me: Identity,
    profile: Vec<(String, String)>,
    config: GameConfig,
    phase: ClientPhase,
    host_id: Option<PeerId>,
    host_last_seen: u64,
    discovered: HashMap<PeerId, DiscoveredHost>,
    known_peers: Vec<RosterEntry>,
    last_round: Option<RoundSnapshot>,
    submitted: bool,
    last_message: String,
    rejection: Option<String>,
    join_attempts: u32,
    last_join_at: Option<u64>,
    last_broadcast_join_at: Option<u64>,
    next_heartbeat_at: u64,
}

impl ClientView {
    pub fn new(me: Identity, config: GameConfig) -> Self {
        Self {
            me,
            profile: Vec::new(),
            config,
            phase: ClientPhase::Discovering,
            host_id: None,
            host_last_seen: 0,
            discovered: HashMap::new(),
            known_peers: Vec::new(),
            last_round: None,
            submitted: false,
            last_message: String::new(),
            rejection: None,
            join_attempts: 0,
            last_join_at: None,
            last_broadcast_join_at: None,
            next_heartbeat_at: 0,
        }
    }

    /// Extra contact-card fields sent with join requests.
    pub fn with_profile(mut self, profile: Vec<(String, String)>) -> Self {
        self.profile = profile;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.me
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    pub fn host_id(&self) -> Option<PeerId> {
        self.host_id
    }

    pub fn known_peers(&self) -> &[RosterEntry] {
        &self.known_peers
    }

    pub fn last_round(&self) -> Option<RoundSnapshot> {
        self.last_round
    }

    pub fn has_submitted(&self) -> bool {
        self.submitted
    }

    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    /// Message from the last rejected join, if any.
    pub fn rejection(&self) -> Option<&str> {
        self.rejection.as_deref()
    }

    pub fn join_attempts(&self) -> u32 {
        self.join_attempts
    }

    pub fn discovered_hosts(&self) -> impl Iterator<Item = &DiscoveredHost> {
        self.discovered.values()
    }

    /// Milliseconds left in the current round, 0 when not playing.
    pub fn time_left(&self, now: u64) -> u64 {
        match (self.phase, self.last_round) {
            (ClientPhase::Playing, Some(r)) => r.deadline.saturating_sub(now),
            _ => 0,
        }
    }

    /// Non-full host with the most players; lowest id breaks ties.
    pub fn select_host(&self) -> Option<&DiscoveredHost> {
        self.discovered
            .values()
            .filter(|h| !h.is_full())
            .max_by(|a, b| {
                a.player_count
                    .cmp(&b.player_count)
                    .then_with(|| b.id.cmp(&a.id))
            })
    }

    fn join_request(&self) -> Packet {
        Packet::JoinRequest(JoinRequest {
            id: self.me.id,
            name: self.me.name.clone(),
            profile: self.profile.clone(),
        })
    }

    fn lose_host(&mut self) {
        self.host_id = None;
        self.phase = ClientPhase::Discovering;
        self.known_peers.clear();
        self.last_round = None;
        self.submitted = false;
        self.last_join_at = None;
    }

    /// Periodic tick: prune stale hosts, retry joins, heartbeat the host.
    pub fn tick(&mut self, now: u64) -> Vec<Action> {
        let mut actions = Vec::new();

        let stale = self.config.host_stale_ms;
        self.discovered
            .retain(|_, h| now.saturating_sub(h.seen_at) <= stale);

        if matches!(self.phase, ClientPhase::Connected | ClientPhase::Playing)
            && now.saturating_sub(self.host_last_seen) > self.config.connection_timeout_ms
        {
            tracing::info!(host = ?self.host_id, "host went silent");
            self.lose_host();
        }

        if self.phase == ClientPhase::Discovering {
            self.try_join(now, &mut actions);
        }

        if let Some(host) = self.host_id {
            if now >= self.next_heartbeat_at {
                wire::queue_send(&mut actions, host, &Packet::Heartbeat);
                self.next_heartbeat_at = now.saturating_add(self.config.heartbeat_interval_ms);
            }
        }
        actions
    }

    fn try_join(&mut self, now: u64, actions: &mut Vec<Action>) {
        let due = |last: Option<u64>, every: u64| {
            last.map_or(true, |t| now.saturating_sub(t) >= every)
        };
        match self.select_host().map(|h| h.id) {
            Some(target) => {
                if due(self.last_join_at, self.config.join_retry_ms) {
                    self.join_attempts += 1;
                    self.last_join_at = Some(now);
                    tracing::debug!(host = %target, attempt = self.join_attempts, "join request");
                    wire::queue_send(actions, target, &self.join_request());
                }
            }
            None => {
                if due(self.last_broadcast_join_at, self.config.broadcast_join_interval_ms) {
                    self.join_attempts += 1;
                    self.last_broadcast_join_at = Some(now);
                    tracing::debug!(attempt = self.join_attempts, "broadcast join request");
                    wire::queue_send(actions, PeerId::BROADCAST, &self.join_request());
                }
            }
        }
    }

    /// Press a game button. Only the first press of a round is sent.
    pub fn submit_choice(&mut self, button: Choice, now: u64) -> Vec<Action> {
        let mut actions = Vec::new();
        let Some(host) = self.host_id else {
            return actions;
        };
        if self.phase != ClientPhase::Playing || self.submitted || self.listed_out() {
            return actions;
        }
        let press = Packet::ButtonPress(ButtonPress {
            button,
            client_time_ms: now,
        });
        wire::queue_send(&mut actions, host, &press);
        self.submitted = true;
        actions.push(Action::PlayTone(Tone::BUTTON));
        tracing::debug!(%host, button, "button sent");
        actions
    }

    /// Leave Eliminated/Won for another game.
    pub fn reset(&mut self) {
        if !matches!(self.phase, ClientPhase::Eliminated | ClientPhase::Won) {
            return;
        }
        self.phase = if self.host_id.is_some() {
            ClientPhase::Connected
        } else {
            ClientPhase::Discovering
        };
        self.last_round = None;
        self.submitted = false;
        self.last_message.clear();
    }

    /// Leave the host.
    pub fn disconnect(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(host) = self.host_id {
            wire::queue_send(&mut actions, host, &Packet::Disconnect);
            tracing::info!(%host, "left host");
        }
        self.lose_host();
        actions
    }

    /// Decode and handle one received packet.
    pub fn handle_inbound(
        &mut self,
        source: PeerId,
        bytes: &[u8],
        now: u64,
    ) -> Result<Vec<Action>, DecodeError> {
        let packet = wire::decode_packet(bytes)?;
        Ok(self.handle_packet(source, packet, now))
    }

    pub fn handle_packet(&mut self, source: PeerId, packet: Packet, now: u64) -> Vec<Action> {
        let mut actions = Vec::new();
        if source == self.me.id {
            return actions;
        }
        let from_host = self.host_id == Some(source);
        if from_host {
            self.host_last_seen = now;
        }
        match packet {
            Packet::HostAnnounce(a) => self.on_announce(a, now),
            Packet::JoinResponse(r) => self.on_join_response(source, r, now, &mut actions),
            Packet::RoundStart(rs) if from_host => self.on_round_start(rs, now, &mut actions),
            Packet::RoundEnd(re) if from_host => self.on_round_end(re, &mut actions),
            Packet::GameOver(g) if from_host => self.on_game_over(g, &mut actions),
            Packet::PlayerList(l) if from_host => self.on_player_list(l, &mut actions),
            other => {
                tracing::debug!(peer = %source, kind = ?other.kind(), "ignoring packet");
            }
        }
        actions
    }

    fn on_announce(&mut self, a: HostAnnounce, now: u64) {
        if a.protocol_version != PROTOCOL_VERSION {
            tracing::debug!(host = %a.host_id, version = a.protocol_version, "protocol mismatch");
            return;
        }
        if self.host_id == Some(a.host_id) {
            self.host_last_seen = now;
        }
        self.discovered.insert(
            a.host_id,
            DiscoveredHost {
                id: a.host_id,
                name: a.host_name,
                player_count: a.player_count,
                capacity: a.capacity,
                game_active: a.game_active,
                seen_at: now,
            },
        );
    }

    fn on_join_response(
        &mut self,
        source: PeerId,
        r: JoinResponse,
        now: u64,
        actions: &mut Vec<Action>,
    ) {
        if self.phase != ClientPhase::Discovering {
            if r.accepted && self.host_id != Some(source) {
                tracing::debug!(peer = %source, "second host accepted us, leaving it");
                wire::queue_send(actions, source, &Packet::Disconnect);
            }
            return;
        }
        if r.accepted {
            tracing::info!(host = %source, attempts = self.join_attempts, "joined host");
            self.phase = ClientPhase::Connected;
            self.host_id = Some(source);
            self.host_last_seen = now;
            self.next_heartbeat_at = now.saturating_add(self.config.heartbeat_interval_ms);
            self.rejection = None;
            self.last_message = r.message;
        } else {
            tracing::info!(host = %source, message = %r.message, "join rejected");
            self.discovered.remove(&source);
            self.rejection = Some(r.message);
        }
    }

    fn on_round_start(&mut self, rs: RoundStart, now: u64, actions: &mut Vec<Action>) {
        let deadline = now.saturating_add(u64::from(rs.duration_ms));
        match self.phase {
            ClientPhase::Playing if self.last_round.map(|r| r.round) == Some(rs.round) => {
                if let Some(r) = &mut self.last_round {
                    r.deadline = deadline;
                }
            }
            ClientPhase::Connected if self.listed_out() => {
                tracing::debug!(round = rs.round, "spectating round");
            }
            ClientPhase::Connected | ClientPhase::Playing => {
                self.phase = ClientPhase::Playing;
                self.submitted = false;
                self.last_round = Some(RoundSnapshot {
                    round: rs.round,
                    rule_parameter: rs.rule_parameter,
                    deadline,
                });
                tracing::info!(round = rs.round, "round started");
                actions.push(Action::PlayTone(Tone::ROUND_START));
            }
            _ => {}
        }
    }

    fn on_round_end(&mut self, re: RoundEnd, actions: &mut Vec<Action>) {
        if !matches!(self.phase, ClientPhase::Connected | ClientPhase::Playing) {
            return;
        }
        if re.eliminated.contains(&self.me.id) {
            self.phase = ClientPhase::Eliminated;
            self.last_message = format!("Eliminated in round {}", re.round);
            actions.push(Action::PlayTone(Tone::ELIMINATED));
        } else if self.phase == ClientPhase::Playing {
            self.phase = ClientPhase::Connected;
            self.last_message = format!("Survived round {} ({} left)", re.round, re.survivors);
            actions.push(Action::PlayTone(Tone::SURVIVED_LOW));
            actions.push(Action::PlayTone(Tone::SURVIVED_HIGH));
        }
    }

    /// The mirrored roster lists this badge as out of the game.
    fn listed_out(&self) -> bool {
        self.known_peers
            .iter()
            .any(|e| e.id == self.me.id && !e.alive)
    }

    fn spectating(&self) -> bool {
        self.phase == ClientPhase::Connected && self.listed_out()
    }

    fn on_game_over(&mut self, g: GameOver, actions: &mut Vec<Action>) {
        let winner_text = match (&g.winner_name, g.winner) {
            (Some(name), _) => format!("{} wins!", name),
            (None, Some(id)) => format!("{} wins!", id),
            (None, None) => "No winner".to_string(),
        };
        let played = self.last_round.is_some();
        match self.phase {
            _ if self.spectating() => self.last_message = winner_text,
            ClientPhase::Connected if !played => self.last_message = winner_text,
            ClientPhase::Connected | ClientPhase::Playing if g.winner == Some(self.me.id) => {
                self.phase = ClientPhase::Won;
                self.last_message = "You survived!".to_string();
                actions.push(Action::PlayTone(Tone::SURVIVED_LOW));
                actions.push(Action::PlayTone(Tone::SURVIVED_HIGH));
            }
            ClientPhase::Connected | ClientPhase::Playing => {
                self.phase = ClientPhase::Eliminated;
                self.last_message = winner_text;
                actions.push(Action::PlayTone(Tone::ELIMINATED));
            }
            ClientPhase::Eliminated => self.last_message = winner_text,
            _ => {}
        }
    }

    fn on_player_list(&mut self, l: PlayerList, actions: &mut Vec<Action>) {
        self.known_peers = l.players;
        let listed = self.known_peers.iter().any(|e| e.id == self.me.id);
        if !listed && matches!(self.phase, ClientPhase::Connected | ClientPhase::Playing) {
            tracing::info!(host = ?self.host_id, "dropped from host roster");
            self.lose_host();
            return;
        }
        // Catches an elimination whose RoundEnd was lost.
        let was_live = match self.phase {
            ClientPhase::Playing => true,
            ClientPhase::Connected => self.last_round.is_some(),
            _ => false,
        };
        if was_live && self.listed_out() {
            tracing::info!(round = ?self.last_round.map(|r| r.round), "roster lists us as out");
            self.phase = ClientPhase::Eliminated;
            self.submitted = false;
            self.last_message = "Eliminated".to_string();
            actions.push(Action::PlayTone(Tone::ELIMINATED));
        }
    }
}
