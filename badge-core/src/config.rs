//! Game timings and limits. Defaults match the shipped badge firmware.

use serde::Deserialize;

use crate::registry::MAX_PLAYERS;
use crate::rules::{EliminationRule, NoChoicePolicy, RuleKind};

/// Tunables shared by host and client. Every field has a default, so a config
/// file only needs the keys it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameConfig {
    /// Seats at the host (default 8, at most 15).
    pub max_players: usize,
    /// Silence after which a peer (or, on the client, the host) is dropped.
    pub connection_timeout_ms: u64,
    /// Host presence broadcast interval.
    pub discovery_interval_ms: u64,
    /// Client heartbeat interval.
    pub heartbeat_interval_ms: u64,
    pub round_duration_ms: u64,
    /// RoundStart re-broadcast interval while a round is open.
    pub round_resend_interval_ms: u64,
    /// Pause between a round result and the next round.
    pub intermission_ms: u64,
    /// Client forgets announced hosts not heard from for this long.
    pub host_stale_ms: u64,
    /// Minimum spacing of join requests to a chosen host.
    pub join_retry_ms: u64,
    /// Spacing of broadcast join requests when no host has announced.
    pub broadcast_join_interval_ms: u64,
    pub queue_capacity: usize,
    pub max_packets_per_tick: usize,
    /// Resolve as soon as every participant has pressed.
    pub resolve_when_all_chosen: bool,
    pub rule: RuleKind,
    /// Number of game buttons for the unsafe-button rule.
    pub buttons: u8,
    pub no_choice: NoChoicePolicy,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            connection_timeout_ms: 10_000,
            discovery_interval_ms: 2_000,
            heartbeat_interval_ms: 2_000,
            round_duration_ms: 5_000,
            round_resend_interval_ms: 1_000,
            intermission_ms: 3_000,
            host_stale_ms: 6_000,
            join_retry_ms: 1_000,
            broadcast_join_interval_ms: 5_000,
            queue_capacity: 32,
            max_packets_per_tick: 8,
            resolve_when_all_chosen: true,
            rule: RuleKind::UnsafeButton,
            buttons: 16,
            no_choice: NoChoicePolicy::Eliminate,
        }
    }
}

impl GameConfig {
    /// Roster capacity after clamping to the protocol limit.
    pub fn capacity(&self) -> usize {
        self.max_players.clamp(1, MAX_PLAYERS)
    }

    pub fn build_rule(&self) -> Box<dyn EliminationRule> {
        self.rule.build(self.buttons, self.no_choice)
    }
}
