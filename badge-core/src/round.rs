//! Round engine: open a round, collect one choice per participant, resolve against an elimination rule.

use crate::identity::PeerId;
use crate::rules::{Choice, EliminationRule};

/// Engine lifecycle. `Resolving` is transient inside `resolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Open,
    Resolving,
    Concluded,
}

/// A recorded press. `at` orders logs only, never outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submitted {
    pub peer: PeerId,
    pub choice: Choice,
    pub at: u64,
}

/// The open (or last) round.
#[derive(Debug, Clone)]
pub struct Round {
    pub round_number: u32,
    pub rule_parameter: Option<u8>,
    pub opened_at: u64,
    pub deadline: u64,
    participants: Vec<PeerId>,
    choices: Vec<Submitted>,
}

impl Round {
    pub fn participants(&self) -> &[PeerId] {
        &self.participants
    }

    pub fn choices(&self) -> &[Submitted] {
        &self.choices
    }

    pub fn choice_of(&self, peer: PeerId) -> Option<Choice> {
        self.choices.iter().find(|s| s.peer == peer).map(|s| s.choice)
    }

    /// Milliseconds left before the deadline.
    pub fn remaining(&self, now: u64) -> u64 {
        self.deadline.saturating_sub(now)
    }
}

/// Outcome of a resolved round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub round_number: u32,
    pub rule_parameter: Option<u8>,
    pub eliminated: Vec<PeerId>,
    pub survivors: Vec<PeerId>,
    pub is_game_over: bool,
}

/// What happened to a submitted choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    /// Already chose this round; the first choice stands.
    Duplicate,
    NotOpen,
    NotParticipant,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoundError {
    #[error("need at least 2 alive players, have {alive}")]
    InsufficientPlayers { alive: usize },
    #[error("no round is open")]
    NotOpen,
    #[error("round deadline not reached")]
    DeadlineNotReached,
    #[error("game concluded; reset first")]
    Concluded,
}

/// Runs rounds for one game. The rule decides who is eliminated.
#[derive(Debug)]
pub struct RoundEngine {
    rule: Box<dyn EliminationRule>,
    state: RoundState,
    round: Option<Round>,
}

impl RoundEngine {
    pub fn new(rule: Box<dyn EliminationRule>) -> Self {
        Self {
            rule,
            state: RoundState::Idle,
            round: None,
        }
    }

    pub fn rule(&self) -> &dyn EliminationRule {
        self.rule.as_ref()
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == RoundState::Open
    }

    /// Current round while open, or the last resolved one.
    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn open_round(
        &mut self,
        alive: &[PeerId],
        round_number: u32,
        rule_parameter: Option<u8>,
        now: u64,
        duration: u64,
    ) -> Result<&Round, RoundError> {
        if self.state == RoundState::Concluded {
            return Err(RoundError::Concluded);
        }
        if alive.len() < 2 {
            return Err(RoundError::InsufficientPlayers { alive: alive.len() });
        }
        self.state = RoundState::Open;
        let round = self.round.insert(Round {
            round_number,
            rule_parameter,
            opened_at: now,
            deadline: now.saturating_add(duration),
            participants: alive.to_vec(),
            choices: Vec::new(),
        });
        Ok(&*round)
    }

    /// First choice wins; later presses in the same round are ignored.
    pub fn submit_choice(&mut self, peer: PeerId, choice: Choice, now: u64) -> Submission {
        let round = match (&self.state, &mut self.round) {
            (RoundState::Open, Some(r)) => r,
            _ => return Submission::NotOpen,
        };
        if !round.participants.contains(&peer) {
            return Submission::NotParticipant;
        }
        if round.choices.iter().any(|s| s.peer == peer) {
            return Submission::Duplicate;
        }
        round.choices.push(Submitted {
            peer,
            choice,
            at: now,
        });
        Submission::Accepted
    }

    /// Drop a participant who left mid-round. Their choice is discarded.
    pub fn withdraw(&mut self, peer: PeerId) {
        if let Some(round) = &mut self.round {
            round.participants.retain(|p| *p != peer);
            round.choices.retain(|s| s.peer != peer);
        }
    }

    /// True when every participant of the open round has chosen.
    pub fn all_submitted(&self) -> bool {
        match (&self.state, &self.round) {
            (RoundState::Open, Some(r)) => r.choices.len() >= r.participants.len(),
            _ => false,
        }
    }

    pub fn deadline_passed(&self, now: u64) -> bool {
        matches!((&self.state, &self.round), (RoundState::Open, Some(r)) if now >= r.deadline)
    }

    /// Resolve the open round. Without `force`, only once the deadline has passed.
    pub fn resolve(&mut self, now: u64, force: bool) -> Result<RoundResult, RoundError> {
        if self.state != RoundState::Open {
            return Err(RoundError::NotOpen);
        }
        let round = self.round.as_ref().ok_or(RoundError::NotOpen)?;
        if !force && now < round.deadline {
            return Err(RoundError::DeadlineNotReached);
        }
        self.state = RoundState::Resolving;

        let choices: Vec<(PeerId, Choice)> =
            round.choices.iter().map(|s| (s.peer, s.choice)).collect();
        let eliminated: Vec<PeerId> = self
            .rule
            .eliminate(&round.participants, &choices, round.rule_parameter)
            .into_iter()
            .filter(|p| round.participants.contains(p))
            .collect();
        let survivors: Vec<PeerId> = round
            .participants
            .iter()
            .copied()
            .filter(|p| !eliminated.contains(p))
            .collect();
        let is_game_over = survivors.len() <= 1;
        let result = RoundResult {
            round_number: round.round_number,
            rule_parameter: round.rule_parameter,
            eliminated,
            survivors,
            is_game_over,
        };

        for s in &round.choices {
            tracing::debug!(
                round = round.round_number,
                peer = %s.peer,
                choice = s.choice,
                at = s.at,
                "choice"
            );
        }

        self.state = if is_game_over {
            RoundState::Concluded
        } else {
            RoundState::Idle
        };
        Ok(result)
    }

    /// Back to Idle for a fresh game.
    pub fn reset(&mut self) {
        self.state = RoundState::Idle;
        self.round = None;
    }
}
