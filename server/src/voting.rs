//! Ballot collection and tally for the voting sub-phase.
//!
//! Each living participant may cast exactly one ballot per session, either
//! for another living participant or to skip. The session closes on timer
//! expiry; full turnout truncates the timer to a short grace period instead
//! of concluding immediately.

use crate::error::{Rejection, RequestResult};
use crate::roster::Roster;
use crate::timer::Countdown;
use log::{debug, info};
use shared::{BallotChoice, PlayerId};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    /// The sole plurality target, if the tally produced one.
    pub ejected: Option<PlayerId>,
    pub tie: bool,
}

/// Result of an accepted ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BallotReceipt {
    pub voter: PlayerId,
    pub closing_early: bool,
}

#[derive(Debug)]
pub struct VotingSession {
    open: bool,
    timer: Countdown,
    duration: f32,
    closure_grace: f32,
    // BTreeMap keeps tally iteration deterministic
    ballots: BTreeMap<PlayerId, BallotChoice>,
}

impl VotingSession {
    pub fn new(duration: f32, closure_grace: f32) -> Self {
        Self {
            open: false,
            timer: Countdown::default(),
            duration,
            closure_grace,
            ballots: BTreeMap::new(),
        }
    }

    /// Clears all ballots and opens voting for the configured duration.
    pub fn start(&mut self) {
        self.ballots.clear();
        self.open = true;
        self.timer.reset(self.duration);
        info!("Voting opened for {:.1}s", self.duration);
    }

    pub fn cast_ballot(
        &mut self,
        voter: PlayerId,
        choice: BallotChoice,
        roster: &Roster,
    ) -> RequestResult<BallotReceipt> {
        if !self.open {
            return Err(Rejection::VotingClosed);
        }
        if !roster.is_connected(voter) {
            return Err(Rejection::UnknownPlayer(voter));
        }
        if !roster.is_alive(voter) {
            return Err(Rejection::NotAlive(voter));
        }
        if self.ballots.contains_key(&voter) {
            return Err(Rejection::DuplicateBallot(voter));
        }
        if let BallotChoice::Player(target) = choice {
            if !roster.is_alive(target) {
                return Err(Rejection::InvalidTarget(target));
            }
        }

        self.ballots.insert(voter, choice);
        debug!("Player {} cast a ballot", voter);

        let closing_early = self.check_turnout(roster);
        Ok(BallotReceipt {
            voter,
            closing_early,
        })
    }

    /// Truncates the timer to the grace period once every living participant
    /// has voted. Also called when someone leaves mid-vote.
    pub fn check_turnout(&mut self, roster: &Roster) -> bool {
        if !self.open {
            return false;
        }
        if self.ballots.len() >= roster.living_count() {
            self.timer.truncate(self.closure_grace);
            return true;
        }
        false
    }

    /// Advances the vote timer. Returns true on the tick voting should close.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.open && self.timer.tick(dt)
    }

    /// Closes voting and tallies the ballots.
    ///
    /// Ties between two or more top targets produce no ejection, as do
    /// skip votes that meet or exceed the top target's count. An empty
    /// ballot box is a tie.
    pub fn conclude(&mut self) -> VoteOutcome {
        self.open = false;
        self.timer.disarm();

        let outcome = tally(self.ballots.values().copied());
        info!(
            "Voting closed: {} ballots, ejected {:?}, tie {}",
            self.ballots.len(),
            outcome.ejected,
            outcome.tie
        );
        outcome
    }

    /// Drops the ballot of a participant who left. Their vote no longer
    /// counts toward turnout or the tally. Returns true if one was removed.
    pub fn forget_voter(&mut self, voter: PlayerId) -> bool {
        let removed = self.ballots.remove(&voter).is_some();
        if removed {
            debug!("Dropped ballot of departed player {}", voter);
        }
        removed
    }

    /// Forgets ballots and closes voting without a tally.
    pub fn reset(&mut self) {
        self.open = false;
        self.timer.disarm();
        self.ballots.clear();
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn remaining(&self) -> f32 {
        self.timer.remaining()
    }

    pub fn has_voted(&self, voter: PlayerId) -> bool {
        self.ballots.contains_key(&voter)
    }

    pub fn voters(&self) -> Vec<PlayerId> {
        self.ballots.keys().copied().collect()
    }

    pub fn ballot_count(&self) -> usize {
        self.ballots.len()
    }
}

fn tally(ballots: impl Iterator<Item = BallotChoice>) -> VoteOutcome {
    let mut counts: HashMap<PlayerId, usize> = HashMap::new();
    let mut skips = 0usize;
    for choice in ballots {
        match choice {
            BallotChoice::Player(target) => *counts.entry(target).or_insert(0) += 1,
            BallotChoice::Skip => skips += 1,
        }
    }

    let max_votes = counts.values().copied().max().unwrap_or(0);
    let mut leaders = counts
        .iter()
        .filter(|(_, votes)| **votes == max_votes)
        .map(|(target, _)| *target);
    let leader = leaders.next();
    let shared_lead = leaders.next().is_some();

    match leader {
        Some(target) if !shared_lead && skips < max_votes => VoteOutcome {
            ejected: Some(target),
            tie: false,
        },
        _ => VoteOutcome {
            ejected: None,
            tie: true,
        },
    }
}
