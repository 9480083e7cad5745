// BadgeParty simulator: one host badge and several bot clients over an in-memory radio.

mod config;
mod radio;

use std::time::{Duration, Instant};

use badge_core::rules::{RuleKind, PAPER, ROCK, SCISSORS};
use badge_core::{
    Action, ClientPhase, ClientView, Controller, GameConfig, Identity, MemoryContacts, PeerId,
    Phase,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::radio::Air;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const HOST_ID: PeerId = PeerId(0x0100);
const NAMES: [&str; 15] = [
    "Adrian", "Vic", "Jorge", "Daniel", "Mina", "Ola", "Tomas", "Rei", "Sana", "Ilya", "Noor",
    "Kit", "Pia", "Abel", "Wen",
];
/// Chance per tick that an undecided bot presses.
const PRESS_CHANCE: f64 = 0.3;

type Badge = Controller<MemoryContacts>;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    for arg in std::env::args().skip(1) {
        if arg == "--version" || arg == "-V" {
            println!("badge-sim {}", VERSION);
            return Ok(());
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cfg = config::load();
    tracing::info!(
        clients = cfg.clients,
        rule = ?cfg.game.rule,
        drop_rate = cfg.drop_rate,
        seed = ?cfg.seed,
        "starting simulator"
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let winners = rt.block_on(run(cfg))?;
    for (game, winner) in winners.iter().enumerate() {
        println!("game {}: {}", game + 1, winner);
    }
    Ok(())
}

fn badge(id: PeerId, name: &str, game: &GameConfig) -> Badge {
    Controller::new(MemoryContacts::new(Identity::new(id, name)), game.clone())
}

async fn run(cfg: config::Config) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut bots = match cfg.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let mut air = Air::new(cfg.drop_rate, cfg.seed.map(|s| s.wrapping_add(1)));

    let mut nodes = vec![badge(HOST_ID, NAMES[0], &cfg.game)];
    nodes[0].become_host(cfg.seed);
    for i in 0..cfg.clients {
        let id = PeerId(HOST_ID.0 + 1 + i as u16);
        let mut node = badge(id, NAMES[(i + 1) % NAMES.len()], &cfg.game);
        node.become_client();
        nodes.push(node);
    }

    let start = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_millis(cfg.tick_ms));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut winners = Vec::new();
    let mut game_over_at: Option<u64> = None;

    loop {
        tokio::select! {
            res = &mut shutdown => {
                res?;
                tracing::info!("interrupted");
                break;
            }
            _ = ticker.tick() => {}
        }
        let now = start.elapsed().as_millis() as u64;

        let mut outgoing: Vec<(PeerId, Vec<Action>)> = Vec::new();
        for node in nodes.iter_mut() {
            let id = node.id();
            let mut actions = node.tick(now);
            if let Some(client) = node.client_mut() {
                let (rule, buttons) = (cfg.game.rule, cfg.game.buttons);
                if let Some(choice) = bot_choice(client, rule, buttons, &mut bots) {
                    actions.extend(client.submit_choice(choice, now));
                }
            }
            outgoing.push((id, actions));
        }

        let mut reset_clients = false;
        if let Some(session) = nodes[0].session_mut() {
            match session.phase() {
                Phase::Lobby if session.peers().alive_count() >= cfg.clients => {
                    match session.start_game(now) {
                        Ok(actions) => outgoing.push((HOST_ID, actions)),
                        Err(e) => tracing::warn!(error = %e, "could not start game"),
                    }
                }
                Phase::GameOver => match game_over_at {
                    None => {
                        let winner = session
                            .winner()
                            .and_then(|w| session.peers().name_of(w).map(str::to_string))
                            .unwrap_or_else(|| "no winner".to_string());
                        tracing::info!(game = winners.len() + 1, %winner, "game finished");
                        winners.push(winner);
                        game_over_at = Some(now);
                    }
                    Some(at) if now.saturating_sub(at) >= cfg.game.intermission_ms => {
                        game_over_at = None;
                        if cfg.games != 0 && winners.len() >= cfg.games as usize {
                            break;
                        }
                        outgoing.push((HOST_ID, session.reset_game()));
                        reset_clients = true;
                    }
                    Some(_) => {}
                },
                _ => {}
            }
        }
        if reset_clients {
            for client in nodes.iter_mut().filter_map(|n| n.client_mut()) {
                client.reset();
            }
        }

        for (from, actions) in outgoing {
            for action in actions {
                match action {
                    Action::Send { dest, bytes } => {
                        air.transmit(from, dest, &bytes, &mut nodes, now)
                    }
                    Action::PlayTone(tone) => {
                        tracing::trace!(
                            badge = %from,
                            freq = tone.freq_hz,
                            ms = tone.duration_ms,
                            "tone"
                        );
                    }
                }
            }
        }
    }

    tracing::info!(delivered = air.delivered(), lost = air.lost(), "radio stats");
    Ok(winners)
}

/// A bot presses once per round, after a random delay.
fn bot_choice(client: &ClientView, rule: RuleKind, buttons: u8, rng: &mut StdRng) -> Option<u8> {
    if client.phase() != ClientPhase::Playing || client.has_submitted() {
        return None;
    }
    if !rng.gen_bool(PRESS_CHANCE) {
        return None;
    }
    let choice = match rule {
        RuleKind::UnsafeButton => rng.gen_range(0..buttons.max(1)),
        RuleKind::DuplicateChoice => {
            let alive = client.known_peers().iter().filter(|p| p.alive).count();
            rng.gen_range(0..alive.clamp(2, usize::from(u8::MAX)) as u8)
        }
        RuleKind::RockPaperScissors => [ROCK, PAPER, SCISSORS][rng.gen_range(0..3)],
    };
    Some(choice)
}
