//! Load simulator config from file and environment.

use badge_core::rules::RuleKind;
use badge_core::GameConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Simulator configuration. File: ./badge-sim.toml or ~/.config/badge-sim/config.toml.
/// Env overrides: BADGE_CLIENTS, BADGE_TICK_MS, BADGE_DROP_RATE, BADGE_RULE, BADGE_SEED.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Client badges next to the host (default 4).
    #[serde(default = "default_clients")]
    pub clients: usize,
    /// Main loop period (default 50 ms).
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Chance that a single delivery is lost, 0.0 to 1.0.
    #[serde(default)]
    pub drop_rate: f64,
    /// Fixes radio loss, bot presses and rule parameters.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Games to play before exiting; 0 runs until Ctrl+C.
    #[serde(default = "default_games")]
    pub games: u32,
    #[serde(default)]
    pub game: GameConfig,
}

fn default_clients() -> usize {
    4
}
fn default_tick_ms() -> u64 {
    50
}
fn default_games() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clients: default_clients(),
            tick_ms: default_tick_ms(),
            drop_rate: 0.0,
            seed: None,
            games: default_games(),
            game: GameConfig::default(),
        }
    }
}

/// Load config: default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    apply_env(&mut c, |key| std::env::var(key).ok());
    c
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(n) = var("BADGE_CLIENTS").and_then(|s| s.parse::<usize>().ok()) {
        c.clients = n;
    }
    if let Some(ms) = var("BADGE_TICK_MS").and_then(|s| s.parse::<u64>().ok()) {
        c.tick_ms = ms;
    }
    if let Some(rate) = var("BADGE_DROP_RATE").and_then(|s| s.parse::<f64>().ok()) {
        c.drop_rate = rate;
    }
    if let Some(rule) = var("BADGE_RULE").and_then(|s| RuleKind::parse(&s)) {
        c.game.rule = rule;
    }
    if let Some(seed) = var("BADGE_SEED").and_then(|s| s.parse::<u64>().ok()) {
        c.seed = Some(seed);
    }
    c.clients = c.clients.clamp(1, c.game.capacity());
    c.tick_ms = c.tick_ms.max(1);
    if !(0.0..=1.0).contains(&c.drop_rate) {
        c.drop_rate = 0.0;
    }
}

fn config_paths() -> Vec<PathBuf> {
    let mut out = vec![PathBuf::from("badge-sim.toml")];
    if let Some(h) = std::env::var_os("HOME").map(PathBuf::from) {
        out.push(h.join(".config/badge-sim/config.toml"));
    }
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            match std::fs::read_to_string(&p) {
                Ok(s) => match toml::from_str::<Config>(&s) {
                    Ok(c) => return Some(c),
                    Err(e) => {
                        tracing::warn!(path = %p.display(), error = %e, "ignoring bad config")
                    }
                },
                Err(e) => tracing::warn!(path = %p.display(), error = %e, "cannot read config"),
            }
            break;
        }
    }
    None
}
