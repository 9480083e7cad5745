//! Elimination rules: map one round's choices to the peers knocked out.

use std::collections::HashMap;
use std::fmt;

use rand::{Rng, RngCore};
use serde::Deserialize;

use crate::identity::PeerId;

/// A submitted button index.
pub type Choice = u8;

/// What happens to a participant who pressed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoChoicePolicy {
    Survive,
    #[default]
    Eliminate,
}

/// Pluggable resolver used by the round engine.
pub trait EliminationRule: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Per-round discriminator announced in RoundStart (e.g. the unsafe button).
    fn pick_parameter(&self, rng: &mut dyn RngCore) -> Option<u8>;

    /// Eliminated peers in detection order. `participants` is roster order,
    /// `choices` is submission order and only holds participants.
    fn eliminate(
        &self,
        participants: &[PeerId],
        choices: &[(PeerId, Choice)],
        parameter: Option<u8>,
    ) -> Vec<PeerId>;
}

/// Button elimination: one button is unsafe each round; pressing it knocks you out.
#[derive(Debug, Clone, Copy)]
pub struct UnsafeButton {
    pub buttons: u8,
}

impl EliminationRule for UnsafeButton {
    fn name(&self) -> &'static str {
        "unsafe-button"
    }

    fn pick_parameter(&self, rng: &mut dyn RngCore) -> Option<u8> {
        Some(rng.gen_range(0..self.buttons.max(1)))
    }

    fn eliminate(
        &self,
        _participants: &[PeerId],
        choices: &[(PeerId, Choice)],
        parameter: Option<u8>,
    ) -> Vec<PeerId> {
        let Some(unsafe_button) = parameter else {
            return Vec::new();
        };
        choices
            .iter()
            .filter(|(_, c)| *c == unsafe_button)
            .map(|(p, _)| *p)
            .collect()
    }
}

/// Pick a button nobody else picks: shared choices are knocked out.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateChoice {
    pub no_choice: NoChoicePolicy,
}

impl EliminationRule for DuplicateChoice {
    fn name(&self) -> &'static str {
        "duplicate-choice"
    }

    fn pick_parameter(&self, _rng: &mut dyn RngCore) -> Option<u8> {
        None
    }

    fn eliminate(
        &self,
        participants: &[PeerId],
        choices: &[(PeerId, Choice)],
        _parameter: Option<u8>,
    ) -> Vec<PeerId> {
        let mut counts: HashMap<Choice, usize> = HashMap::new();
        for (_, c) in choices {
            *counts.entry(*c).or_default() += 1;
        }
        let mut out: Vec<PeerId> = choices
            .iter()
            .filter(|(_, c)| counts.get(c).copied().unwrap_or(0) >= 2)
            .map(|(p, _)| *p)
            .collect();
        let chose = |p: PeerId| choices.iter().any(|(q, _)| *q == p);
        apply_no_choice(self.no_choice, participants, chose, &mut out);
        out
    }
}

pub const ROCK: Choice = 1;
pub const PAPER: Choice = 2;
pub const SCISSORS: Choice = 3;

fn beats(a: Choice, b: Choice) -> bool {
    matches!((a, b), (ROCK, SCISSORS) | (PAPER, ROCK) | (SCISSORS, PAPER))
}

/// Rock-paper-scissors for any number of players. With exactly two distinct
/// throws on the table, the beaten throw is knocked out; otherwise it is a tie.
#[derive(Debug, Clone, Copy)]
pub struct RockPaperScissors {
    pub no_choice: NoChoicePolicy,
}

impl EliminationRule for RockPaperScissors {
    fn name(&self) -> &'static str {
        "rock-paper-scissors"
    }

    fn pick_parameter(&self, _rng: &mut dyn RngCore) -> Option<u8> {
        None
    }

    fn eliminate(
        &self,
        participants: &[PeerId],
        choices: &[(PeerId, Choice)],
        _parameter: Option<u8>,
    ) -> Vec<PeerId> {
        let valid = |c: Choice| (ROCK..=SCISSORS).contains(&c);
        let mut distinct: Vec<Choice> = Vec::new();
        for (_, c) in choices.iter().filter(|(_, c)| valid(*c)) {
            if !distinct.contains(c) {
                distinct.push(*c);
            }
        }
        let loser = match distinct.as_slice() {
            [a, b] if beats(*a, *b) => Some(*b),
            [a, b] if beats(*b, *a) => Some(*a),
            _ => None,
        };
        let mut out: Vec<PeerId> = match loser {
            Some(l) => choices
                .iter()
                .filter(|(_, c)| *c == l)
                .map(|(p, _)| *p)
                .collect(),
            None => Vec::new(),
        };
        let chose = |p: PeerId| choices.iter().any(|(q, c)| *q == p && valid(*c));
        apply_no_choice(self.no_choice, participants, chose, &mut out);
        out
    }
}

fn apply_no_choice(
    policy: NoChoicePolicy,
    participants: &[PeerId],
    chose: impl Fn(PeerId) -> bool,
    out: &mut Vec<PeerId>,
) {
    if policy == NoChoicePolicy::Survive {
        return;
    }
    for &p in participants {
        if !chose(p) && !out.contains(&p) {
            out.push(p);
        }
    }
}

/// Game variant selector, as written in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    #[default]
    UnsafeButton,
    DuplicateChoice,
    RockPaperScissors,
}

impl RuleKind {
    pub fn build(self, buttons: u8, no_choice: NoChoicePolicy) -> Box<dyn EliminationRule> {
        match self {
            RuleKind::UnsafeButton => Box::new(UnsafeButton { buttons }),
            RuleKind::DuplicateChoice => Box::new(DuplicateChoice { no_choice }),
            RuleKind::RockPaperScissors => Box::new(RockPaperScissors { no_choice }),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "unsafe_button" => Some(RuleKind::UnsafeButton),
            "duplicate_choice" => Some(RuleKind::DuplicateChoice),
            "rock_paper_scissors" | "rps" => Some(RuleKind::RockPaperScissors),
            _ => None,
        }
    }
}
