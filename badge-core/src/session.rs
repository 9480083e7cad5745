//! Host session coordinator: drives the peer registry and round engine from ticks and inbound packets.
//! No I/O; every effect is returned as an `Action`.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::GameConfig;
use crate::identity::{default_name, Identity, PeerId};
use crate::protocol::{
    Action, GameOver, HostAnnounce, JoinRequest, JoinResponse, Packet, PlayerList, RoundEnd,
    RoundStart, PROTOCOL_VERSION,
};
use crate::registry::{PeerRegistry, RegistryError, Upsert};
use crate::round::{Round, RoundEngine, RoundError, RoundResult, Submission};
use crate::wire::{self, DecodeError};

/// Host phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting joins, no game running.
    Lobby,
    RoundOpen,
    /// Between rounds: result sent, next round pending.
    RoundResolving,
    /// Final result sent and repeated with each announce. Joins sit out until `reset_game`.
    GameOver,
}

/// Host-side game session.
pub struct Session {
    me: Identity,
    config: GameConfig,
    peers: PeerRegistry,
    engine: RoundEngine,
    rng: StdRng,
    phase: Phase,
    round_number: u32,
    next_announce_at: u64,
    next_round_resend_at: u64,
    next_round_at: u64,
    last_result: Option<RoundResult>,
    winner: Option<PeerId>,
}

impl Session {
    pub fn new(me: Identity, config: GameConfig) -> Self {
        Self::with_rng(me, config, StdRng::from_entropy())
    }

    /// Deterministic rule parameters, for tests and replays.
    pub fn with_seed(me: Identity, config: GameConfig, seed: u64) -> Self {
        Self::with_rng(me, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(me: Identity, config: GameConfig, rng: StdRng) -> Self {
        Self {
            peers: PeerRegistry::new(config.capacity(), config.connection_timeout_ms),
            engine: RoundEngine::new(config.build_rule()),
            me,
            config,
            rng,
            phase: Phase::Lobby,
            round_number: 0,
            next_announce_at: 0,
            next_round_resend_at: 0,
            next_round_at: 0,
            last_result: None,
            winner: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.me
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The open round, if any.
    pub fn current_round(&self) -> Option<&Round> {
        if self.phase == Phase::RoundOpen {
            self.engine.round()
        } else {
            None
        }
    }

    pub fn last_result(&self) -> Option<&RoundResult> {
        self.last_result.as_ref()
    }

    /// Winner of the last finished game.
    pub fn winner(&self) -> Option<PeerId> {
        self.winner
    }

    fn game_active(&self) -> bool {
        matches!(self.phase, Phase::RoundOpen | Phase::RoundResolving)
    }

    /// Operator action: start a game with the alive roster.
    pub fn start_game(&mut self, now: u64) -> Result<Vec<Action>, RoundError> {
        if self.game_active() {
            tracing::debug!("start_game ignored, game already running");
            return Ok(Vec::new());
        }
        let alive = self.peers.alive_count();
        if alive < 2 {
            return Err(RoundError::InsufficientPlayers { alive });
        }
        self.engine.reset();
        self.round_number = 0;
        self.last_result = None;
        self.winner = None;
        let mut actions = Vec::new();
        self.broadcast_roster(&mut actions);
        self.open_next_round(now, &mut actions)?;
        tracing::info!(players = alive, rule = self.engine.rule().name(), "game started");
        Ok(actions)
    }

    /// Operator action: revive everyone and return to the lobby.
    pub fn reset_game(&mut self) -> Vec<Action> {
        self.peers.revive_all();
        self.engine.reset();
        self.round_number = 0;
        self.last_result = None;
        self.phase = Phase::Lobby;
        let mut actions = Vec::new();
        self.broadcast_roster(&mut actions);
        actions
    }

    fn open_next_round(&mut self, now: u64, actions: &mut Vec<Action>) -> Result<(), RoundError> {
        let alive = self.peers.alive_ids();
        let parameter = self.engine.rule().pick_parameter(&mut self.rng);
        let number = self.round_number + 1;
        self.engine
            .open_round(&alive, number, parameter, now, self.config.round_duration_ms)?;
        self.round_number = number;
        self.phase = Phase::RoundOpen;
        self.next_round_resend_at = now.saturating_add(self.config.round_resend_interval_ms);
        tracing::info!(round = number, ?parameter, players = alive.len(), "round open");
        self.broadcast_round_start(now, actions);
        Ok(())
    }

    fn broadcast_round_start(&self, now: u64, actions: &mut Vec<Action>) {
        let Some(round) = self.engine.round() else {
            return;
        };
        let packet = Packet::RoundStart(RoundStart {
            round: round.round_number,
            rule_parameter: round.rule_parameter,
            duration_ms: u32::try_from(round.remaining(now)).unwrap_or(u32::MAX),
        });
        wire::queue_send(actions, PeerId::BROADCAST, &packet);
    }

    fn broadcast_roster(&self, actions: &mut Vec<Action>) {
        let packet = Packet::PlayerList(PlayerList {
            players: self.peers.roster(),
        });
        wire::queue_send(actions, PeerId::BROADCAST, &packet);
    }

    fn announce(&self) -> Packet {
        Packet::HostAnnounce(HostAnnounce {
            protocol_version: PROTOCOL_VERSION,
            host_id: self.me.id,
            host_name: self.me.name.clone(),
            player_count: self.peers.len() as u8,
            capacity: self.peers.capacity() as u8,
            game_active: self.game_active(),
        })
    }

    /// Periodic tick: expire silent peers, advance round timers, announce presence.
    pub fn tick(&mut self, now: u64) -> Vec<Action> {
        let mut actions = Vec::new();

        let expired = self.peers.expire(now);
        for id in &expired {
            tracing::info!(peer = %id, "peer timed out");
            self.engine.withdraw(*id);
        }
        if !expired.is_empty() {
            self.broadcast_roster(&mut actions);
        }

        match self.phase {
            Phase::RoundOpen => {
                let short_handed = self.peers.alive_count() < 2;
                let everyone_in =
                    self.config.resolve_when_all_chosen && self.engine.all_submitted();
                if short_handed || everyone_in || self.engine.deadline_passed(now) {
                    self.resolve_round(now, &mut actions);
                } else if now >= self.next_round_resend_at {
                    self.broadcast_round_start(now, &mut actions);
                    self.next_round_resend_at =
                        now.saturating_add(self.config.round_resend_interval_ms);
                }
            }
            Phase::RoundResolving if now >= self.next_round_at => {
                if self.peers.alive_count() >= 2 {
                    if let Err(e) = self.open_next_round(now, &mut actions) {
                        tracing::warn!(error = %e, "could not open next round");
                    }
                } else {
                    let winner = self.peers.alive_ids().first().copied();
                    self.finish_game(winner, &mut actions);
                }
            }
            _ => {}
        }

        if self.phase != Phase::RoundOpen && now >= self.next_announce_at {
            let packet = self.announce();
            wire::queue_send(&mut actions, PeerId::BROADCAST, &packet);
            if self.phase == Phase::GameOver {
                wire::queue_send(&mut actions, PeerId::BROADCAST, &self.game_over_packet());
            }
            self.next_announce_at = now.saturating_add(self.config.discovery_interval_ms);
        }
        actions
    }

    fn resolve_round(&mut self, now: u64, actions: &mut Vec<Action>) {
        let result = match self.engine.resolve(now, true) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "resolve failed");
                return;
            }
        };
        for id in &result.eliminated {
            self.peers.mark_eliminated(*id);
        }
        tracing::info!(
            round = result.round_number,
            eliminated = ?result.eliminated,
            survivors = result.survivors.len(),
            "round resolved"
        );
        let end = Packet::RoundEnd(RoundEnd {
            round: result.round_number,
            eliminated: result.eliminated.clone(),
            rule_parameter: result.rule_parameter,
            survivors: result.survivors.len() as u8,
        });
        wire::queue_send(actions, PeerId::BROADCAST, &end);
        self.broadcast_roster(actions);

        if result.is_game_over {
            let winner = match result.survivors.as_slice() {
                [only] => Some(*only),
                _ => None,
            };
            self.last_result = Some(result);
            self.finish_game(winner, actions);
        } else {
            self.last_result = Some(result);
            self.phase = Phase::RoundResolving;
            self.next_round_at = now.saturating_add(self.config.intermission_ms);
        }
    }

    fn finish_game(&mut self, winner: Option<PeerId>, actions: &mut Vec<Action>) {
        let winner_name = winner.and_then(|w| self.peers.name_of(w).map(str::to_string));
        tracing::info!(winner = ?winner, name = ?winner_name, "game over");
        self.phase = Phase::GameOver;
        self.winner = winner;
        wire::queue_send(actions, PeerId::BROADCAST, &self.game_over_packet());
    }

    fn game_over_packet(&self) -> Packet {
        Packet::GameOver(GameOver {
            winner: self.winner,
            winner_name: self
                .winner
                .and_then(|w| self.peers.name_of(w).map(str::to_string)),
        })
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
        if self.peers.contains(source) {
            self.peers.touch(source, now);
        }
        match packet {
            Packet::JoinRequest(req) => self.on_join(source, req, now, &mut actions),
            Packet::ButtonPress(press) => {
                if !self.peers.contains(source) {
                    tracing::debug!(peer = %source, "button press from unknown peer");
                    return actions;
                }
                match self
                    .engine
                    .submit_choice(source, press.button, press.client_time_ms)
                {
                    Submission::Accepted => {
                        tracing::debug!(peer = %source, button = press.button, "choice recorded")
                    }
                    other => tracing::debug!(peer = %source, ?other, "choice ignored"),
                }
            }
            Packet::Heartbeat => {
                self.peers.touch(source, now);
            }
            Packet::Disconnect => {
                if self.peers.remove(source).is_some() {
                    tracing::info!(peer = %source, "peer left");
                    self.engine.withdraw(source);
                    self.broadcast_roster(&mut actions);
                }
            }
            other => {
                tracing::debug!(
                    peer = %source,
                    kind = ?other.kind(),
                    "ignoring client-bound packet"
                );
            }
        }
        actions
    }

    fn on_join(&mut self, source: PeerId, req: JoinRequest, now: u64, actions: &mut Vec<Action>) {
        if req.id != source && req.id != PeerId::default() {
            tracing::debug!(peer = %source, claimed = %req.id, "join id differs from radio source");
        }
        let name = if req.name.is_empty() {
            default_name(source)
        } else {
            req.name
        };
        let response = match self.peers.upsert(source, &name, now) {
            Ok(outcome) => {
                // Late joiners sit out until the lobby reopens.
                let spectator = outcome == Upsert::Inserted && self.phase != Phase::Lobby;
                if spectator {
                    self.peers.mark_eliminated(source);
                }
                if outcome == Upsert::Inserted {
                    tracing::info!(peer = %source, %name, spectator, "peer joined");
                }
                JoinResponse {
                    accepted: true,
                    message: match (spectator, self.game_active()) {
                        (true, true) => "Game in progress, watching".to_string(),
                        (true, false) => "Game over, wait for the next one".to_string(),
                        (false, _) => format!("Welcome, {}", name),
                    },
                }
            }
            Err(RegistryError::RosterFull { capacity }) => {
                tracing::info!(peer = %source, capacity, "join rejected, roster full");
                JoinResponse {
                    accepted: false,
                    message: "Game full".to_string(),
                }
            }
        };
        let accepted = response.accepted;
        wire::queue_send(actions, source, &Packet::JoinResponse(response));
        if accepted {
            self.broadcast_roster(actions);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ButtonPress;
    use crate::registry::MAX_PLAYERS;
    use crate::rules::{NoChoicePolicy, RuleKind};

    const HOST: PeerId = PeerId(0x4a23);
    const A: PeerId = PeerId(0xA);
    const B: PeerId = PeerId(0xB);
    const C: PeerId = PeerId(0xC);

    fn session(config: GameConfig) -> Session {
        Session::with_seed(Identity::new(HOST, "Adrian"), config, 42)
    }

    fn packets(actions: &[Action]) -> Vec<(PeerId, Packet)> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send { dest, bytes } => Some((*dest, wire::decode_packet(bytes).unwrap())),
                Action::PlayTone(_) => None,
            })
            .collect()
    }

    fn join(s: &mut Session, id: PeerId, now: u64) -> Vec<(PeerId, Packet)> {
        let req = Packet::JoinRequest(JoinRequest {
            id,
            name: format!("p{}", id.0),
            profile: Vec::new(),
        });
        packets(&s.handle_packet(id, req, now))
    }

    fn press(s: &mut Session, id: PeerId, button: u8, now: u64) {
        let p = Packet::ButtonPress(ButtonPress {
            button,
            client_time_ms: now,
        });
        s.handle_packet(id, p, now);
    }

    fn with_three() -> Session {
        let mut s = session(GameConfig::default());
        for id in [A, B, C] {
            join(&mut s, id, 0);
        }
        s
    }

    #[test]
    fn join_accepts_and_broadcasts_roster() {
        let mut s = session(GameConfig::default());
        let out = join(&mut s, A, 0);
        assert!(matches!(
            &out[0],
            (dest, Packet::JoinResponse(JoinResponse { accepted: true, .. })) if *dest == A
        ));
        match &out[1] {
            (dest, Packet::PlayerList(list)) => {
                assert!(dest.is_broadcast());
                assert_eq!(list.players.len(), 1);
                assert_eq!(list.players[0].id, A);
            }
            other => panic!("expected roster, got {:?}", other),
        }
    }

    #[test]
    fn join_beyond_capacity_rejected() {
        let mut s = session(GameConfig {
            max_players: MAX_PLAYERS,
            ..GameConfig::default()
        });
        for i in 0..MAX_PLAYERS as u16 {
            join(&mut s, PeerId(100 + i), 0);
        }
        let before = s.peers().roster();
        let out = join(&mut s, PeerId(999), 0);
        assert_eq!(out.len(), 1);
        assert!(matches!(
            &out[0].1,
            Packet::JoinResponse(JoinResponse { accepted: false, .. })
        ));
        assert_eq!(s.peers().roster(), before);
        assert_eq!(s.peers().len(), MAX_PLAYERS);
    }

    #[test]
    fn start_needs_two_players() {
        let mut s = session(GameConfig::default());
        join(&mut s, A, 0);
        assert_eq!(
            s.start_game(0).unwrap_err(),
            RoundError::InsufficientPlayers { alive: 1 }
        );
        assert_eq!(s.phase(), Phase::Lobby);
    }

    #[test]
    fn start_broadcasts_round_start() {
        let mut s = with_three();
        let out = packets(&s.start_game(1000).unwrap());
        // Fresh roster first, so badges know who is in before the round opens.
        assert!(matches!(&out[0].1, Packet::PlayerList(l) if l.players.iter().all(|e| e.alive)));
        let (dest, packet) = &out[1];
        assert!(dest.is_broadcast());
        match packet {
            Packet::RoundStart(rs) => {
                assert_eq!(rs.round, 1);
                assert_eq!(rs.duration_ms, 5000);
                assert!(rs.rule_parameter.unwrap() < 16);
            }
            other => panic!("expected RoundStart, got {:?}", other),
        }
        assert_eq!(s.phase(), Phase::RoundOpen);
        assert_eq!(s.current_round().map(|r| r.deadline), Some(6000));
    }

    #[test]
    fn unsafe_round_to_game_over() {
        let mut s = with_three();
        s.start_game(0).unwrap();
        let unsafe_button = s.current_round().unwrap().rule_parameter.unwrap();
        let safe = (unsafe_button + 1) % 16;
        press(&mut s, A, unsafe_button, 10);
        press(&mut s, B, safe, 20);
        press(&mut s, C, unsafe_button, 30);

        // All three pressed: resolves on the next tick, before the deadline.
        let out = packets(&s.tick(100));
        let end = out
            .iter()
            .find_map(|(_, p)| match p {
                Packet::RoundEnd(e) => Some(e.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(end.eliminated, vec![A, C]);
        assert_eq!(end.survivors, 1);
        let over = out
            .iter()
            .find_map(|(_, p)| match p {
                Packet::GameOver(g) => Some(g.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(over.winner, Some(B));
        assert_eq!(over.winner_name.as_deref(), Some("p11"));
        assert_eq!(s.phase(), Phase::GameOver);
        assert!(s.last_result().unwrap().is_game_over);

        assert_eq!(
            s.start_game(200).unwrap_err(),
            RoundError::InsufficientPlayers { alive: 1 }
        );
        s.reset_game();
        assert_eq!(s.phase(), Phase::Lobby);
        assert!(s.start_game(300).is_ok());
    }

    #[test]
    fn second_press_does_not_change_choice() {
        let mut s = with_three();
        s.start_game(0).unwrap();
        press(&mut s, A, 3, 10);
        press(&mut s, A, 4, 20);
        assert_eq!(s.current_round().unwrap().choice_of(A), Some(3));
    }

    #[test]
    fn press_from_stranger_ignored() {
        let mut s = with_three();
        s.start_game(0).unwrap();
        press(&mut s, PeerId(0x77), 3, 10);
        assert!(s.current_round().unwrap().choices().is_empty());
        assert!(!s.peers().contains(PeerId(0x77)));
    }

    #[test]
    fn deadline_resolves_then_next_round() {
        let mut s = with_three();
        s.start_game(0).unwrap();
        // Keep everyone alive past the deadline.
        for id in [A, B, C] {
            s.handle_packet(id, Packet::Heartbeat, 4000);
        }
        let out = packets(&s.tick(5000));
        assert!(out
            .iter()
            .any(|(_, p)| matches!(p, Packet::RoundEnd(e) if e.eliminated.is_empty())));
        assert_eq!(s.phase(), Phase::RoundResolving);

        // Intermission not over yet: announce only.
        let out = packets(&s.tick(6000));
        assert!(out.iter().all(|(_, p)| matches!(p, Packet::HostAnnounce(_))));

        let out = packets(&s.tick(8000));
        assert!(out.iter().any(|(_, p)| matches!(p, Packet::RoundStart(r) if r.round == 2)));
        assert_eq!(s.phase(), Phase::RoundOpen);
    }

    #[test]
    fn round_start_resent_while_open() {
        let mut s = with_three();
        s.start_game(0).unwrap();
        assert!(packets(&s.tick(500)).is_empty());
        let out = packets(&s.tick(1000));
        match &out[..] {
            [(dest, Packet::RoundStart(rs))] => {
                assert!(dest.is_broadcast());
                assert_eq!(rs.round, 1);
                assert_eq!(rs.duration_ms, 4000);
            }
            other => panic!("expected one RoundStart, got {:?}", other),
        }
    }

    #[test]
    fn announce_on_interval_in_lobby() {
        let mut s = session(GameConfig::default());
        join(&mut s, A, 0);
        let out = packets(&s.tick(0));
        match &out[..] {
            [(dest, Packet::HostAnnounce(a))] => {
                assert!(dest.is_broadcast());
                assert_eq!(a.host_id, HOST);
                assert_eq!(a.player_count, 1);
                assert_eq!(a.capacity, 8);
                assert!(!a.game_active);
            }
            other => panic!("expected announce, got {:?}", other),
        }
        assert!(packets(&s.tick(1999)).is_empty());
        assert_eq!(packets(&s.tick(2000)).len(), 1);
    }

    #[test]
    fn expired_peer_dropped_from_roster() {
        let mut s = with_three();
        s.handle_packet(A, Packet::Heartbeat, 5_000);
        s.handle_packet(B, Packet::Heartbeat, 5_000);
        let out = packets(&s.tick(10_001));
        let list = out
            .iter()
            .find_map(|(_, p)| match p {
                Packet::PlayerList(l) => Some(l.clone()),
                _ => None,
            })
            .unwrap();
        assert!(list.players.iter().all(|e| e.id != C));
        assert_eq!(list.players.len(), 2);
        // Later rosters never bring it back.
        let out = packets(&s.reset_game());
        assert!(out.iter().all(|(_, p)| match p {
            Packet::PlayerList(l) => l.players.iter().all(|e| e.id != C),
            _ => true,
        }));
    }

    #[test]
    fn disconnect_mid_round_ends_game() {
        let mut s = session(GameConfig::default());
        join(&mut s, A, 0);
        join(&mut s, B, 0);
        s.start_game(0).unwrap();
        let out = packets(&s.handle_packet(A, Packet::Disconnect, 100));
        assert!(matches!(&out[0].1, Packet::PlayerList(l) if l.players.len() == 1));
        let out = packets(&s.tick(200));
        assert!(out
            .iter()
            .any(|(_, p)| matches!(p, Packet::GameOver(g) if g.winner == Some(B))));
        assert_eq!(s.winner(), Some(B));
    }

    #[test]
    fn peer_expiring_mid_round_is_withdrawn() {
        let mut s = session(GameConfig {
            round_duration_ms: 20_000,
            ..GameConfig::default()
        });
        for id in [A, B, C] {
            join(&mut s, id, 0);
        }
        s.start_game(0).unwrap();
        s.handle_packet(A, Packet::Heartbeat, 9_000);
        s.handle_packet(B, Packet::Heartbeat, 9_000);

        let out = packets(&s.tick(10_001));
        let list = out
            .iter()
            .find_map(|(_, p)| match p {
                Packet::PlayerList(l) => Some(l.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            list.players.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![A, B]
        );
        assert!(!out.iter().any(|(_, p)| matches!(p, Packet::RoundEnd(_))));
        assert_eq!(s.phase(), Phase::RoundOpen);
        assert_eq!(s.current_round().unwrap().participants(), &[A, B]);

        // The two left in the round finish it without waiting for the silent one.
        let unsafe_button = s.current_round().unwrap().rule_parameter.unwrap();
        press(&mut s, A, unsafe_button, 10_100);
        press(&mut s, B, (unsafe_button + 1) % 16, 10_200);
        s.tick(10_300);
        let result = s.last_result().unwrap();
        assert_eq!(result.eliminated, vec![A]);
        assert_eq!(result.survivors, vec![B]);
        assert_eq!(s.winner(), Some(B));
    }

    #[test]
    fn expiry_leaving_one_player_ends_round() {
        let mut s = session(GameConfig {
            round_duration_ms: 20_000,
            ..GameConfig::default()
        });
        join(&mut s, A, 0);
        join(&mut s, B, 0);
        s.start_game(0).unwrap();
        s.handle_packet(A, Packet::Heartbeat, 9_000);

        let out = packets(&s.tick(10_001));
        assert!(out
            .iter()
            .any(|(_, p)| matches!(p, Packet::PlayerList(l) if l.players.len() == 1)));
        assert!(out
            .iter()
            .any(|(_, p)| matches!(p, Packet::GameOver(g) if g.winner == Some(A))));
        assert_eq!(s.phase(), Phase::GameOver);
    }

    #[test]
    fn game_over_repeated_with_announce() {
        let mut s = session(GameConfig::default());
        join(&mut s, A, 0);
        join(&mut s, B, 0);
        s.start_game(0).unwrap();
        s.handle_packet(A, Packet::Disconnect, 100);
        s.tick(200);
        assert_eq!(s.phase(), Phase::GameOver);

        let out = packets(&s.tick(2_200));
        assert!(out.iter().any(|(_, p)| matches!(p, Packet::HostAnnounce(_))));
        assert!(out.iter().any(|(_, p)| matches!(
            p,
            Packet::GameOver(g) if g.winner == Some(B) && g.winner_name.as_deref() == Some("p11")
        )));

        s.reset_game();
        let out = packets(&s.tick(4_200));
        assert!(!out.iter().any(|(_, p)| matches!(p, Packet::GameOver(_))));
    }

    #[test]
    fn join_after_game_over_waits_for_reset() {
        let mut s = session(GameConfig::default());
        join(&mut s, A, 0);
        join(&mut s, B, 0);
        s.start_game(0).unwrap();
        s.handle_packet(A, Packet::Disconnect, 100);
        s.tick(200);
        assert_eq!(s.phase(), Phase::GameOver);

        let out = join(&mut s, C, 300);
        match &out[0].1 {
            Packet::JoinResponse(r) => {
                assert!(r.accepted);
                assert_eq!(r.message, "Game over, wait for the next one");
            }
            other => panic!("expected join response, got {:?}", other),
        }
        assert!(!s.peers().get(C).unwrap().alive);
        s.reset_game();
        assert!(s.peers().get(C).unwrap().alive);
    }

    #[test]
    fn join_during_game_is_spectator() {
        let mut s = with_three();
        s.start_game(0).unwrap();
        let out = join(&mut s, PeerId(0xD), 10);
        assert!(matches!(
            &out[0].1,
            Packet::JoinResponse(JoinResponse { accepted: true, message })
                if message == "Game in progress, watching"
        ));
        assert!(!s.peers().get(PeerId(0xD)).unwrap().alive);
        assert!(!s.current_round().unwrap().participants().contains(&PeerId(0xD)));
    }

    #[test]
    fn duplicate_choice_game() {
        let mut s = session(GameConfig {
            rule: RuleKind::DuplicateChoice,
            no_choice: NoChoicePolicy::Survive,
            ..GameConfig::default()
        });
        for id in [A, B, C] {
            join(&mut s, id, 0);
        }
        let out = packets(&s.start_game(0).unwrap());
        assert!(out
            .iter()
            .any(|(_, p)| matches!(p, Packet::RoundStart(rs) if rs.rule_parameter.is_none())));
        press(&mut s, A, 1, 1);
        press(&mut s, B, 2, 2);
        press(&mut s, C, 1, 3);
        s.tick(10);
        let result = s.last_result().unwrap();
        assert_eq!(result.eliminated, vec![A, C]);
        assert_eq!(result.survivors, vec![B]);
    }

    #[test]
    fn malformed_inbound_is_error() {
        let mut s = with_three();
        assert!(matches!(
            s.handle_inbound(A, &[], 0),
            Err(DecodeError::Empty)
        ));
        assert_eq!(s.peers().len(), 3);
    }

    #[test]
    fn own_echo_ignored() {
        let mut s = session(GameConfig::default());
        let out = join(&mut s, HOST, 0);
        assert!(out.is_empty());
        assert!(s.peers().is_empty());
    }
}
