//! Client-side presentation state.
//!
//! The screen is recomputed from the latest snapshot every time it is asked
//! for. Nothing here reacts to one-off transitions, so a client that misses
//! events or receives snapshots out of order still shows the right screen.

use shared::{
    GameResult, ObjectKind, PlayerId, Role, RoundPhase, RoundSnapshot, VoteSummary,
};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Connecting,
    Lobby {
        countdown: f32,
        players: usize,
        is_host: bool,
    },
    Gameplay {
        role: Role,
        alive: bool,
        emergency: Option<f32>,
        lights_out: bool,
    },
    Meeting,
    Voting {
        can_vote: bool,
        remaining: f32,
    },
    VoteResult(VoteSummary),
    GameOver {
        result: GameResult,
        won: bool,
        can_restart: bool,
    },
}

#[derive(Debug, Default)]
pub struct ClientView {
    me: Option<PlayerId>,
    snapshot: Option<RoundSnapshot>,
}

impl ClientView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts over for a new connection.
    pub fn connected(&mut self, me: PlayerId) {
        self.me = Some(me);
        self.snapshot = None;
    }

    pub fn disconnected(&mut self) {
        self.me = None;
        self.snapshot = None;
    }

    pub fn me(&self) -> Option<PlayerId> {
        self.me
    }

    /// Keeps the snapshot unless an equal or newer tick was already applied.
    /// Returns true if it was kept.
    pub fn apply_snapshot(&mut self, snapshot: RoundSnapshot) -> bool {
        if let Some(current) = &self.snapshot {
            if snapshot.tick <= current.tick {
                return false;
            }
        }
        self.snapshot = Some(snapshot);
        true
    }

    pub fn snapshot(&self) -> Option<&RoundSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn my_role(&self) -> Role {
        match (&self.snapshot, self.me) {
            (Some(s), Some(me)) if s.impostor == Some(me) => Role::Impostor,
            _ => Role::Crewmate,
        }
    }

    fn am_alive(&self, snapshot: &RoundSnapshot) -> bool {
        self.me
            .and_then(|me| snapshot.player(me))
            .is_some_and(|p| p.alive)
    }

    pub fn screen(&self) -> Screen {
        let (Some(snapshot), Some(me)) = (&self.snapshot, self.me) else {
            return Screen::Connecting;
        };

        match snapshot.phase {
            RoundPhase::Lobby => Screen::Lobby {
                countdown: snapshot.timer,
                players: snapshot.players.len(),
                is_host: snapshot.host == Some(me),
            },
            RoundPhase::Gameplay => Screen::Gameplay {
                role: self.my_role(),
                alive: self.am_alive(snapshot),
                emergency: snapshot
                    .emergency
                    .active
                    .then_some(snapshot.emergency.time_remaining),
                lights_out: snapshot.lights_sabotaged,
            },
            RoundPhase::Meeting => Screen::Meeting,
            RoundPhase::Voting => match (snapshot.voting_open, snapshot.last_vote) {
                (false, Some(summary)) => Screen::VoteResult(summary),
                (open, _) => Screen::Voting {
                    can_vote: open && self.am_alive(snapshot) && !snapshot.voted.contains(&me),
                    remaining: snapshot.vote_timer,
                },
            },
            RoundPhase::Ended => {
                let won = match snapshot.result {
                    GameResult::CrewmatesWin => self.my_role() == Role::Crewmate,
                    GameResult::ImpostorWins => self.my_role() == Role::Impostor,
                    GameResult::Unresolved => false,
                };
                Screen::GameOver {
                    result: snapshot.result,
                    won,
                    can_restart: snapshot.host == Some(me),
                }
            }
        }
    }

    fn name_of(&self, id: PlayerId) -> String {
        self.snapshot
            .as_ref()
            .and_then(|s| s.player(id))
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("Player {}", id))
    }

    /// One-line headline for the current screen.
    pub fn headline(&self) -> String {
        match self.screen() {
            Screen::Connecting => "Connecting...".to_string(),
            Screen::Lobby {
                countdown,
                players,
                is_host,
            } => format!(
                "Lobby: {} players, starting in {:.0}s{}",
                players,
                countdown,
                if is_host { " (you are host)" } else { "" }
            ),
            Screen::Gameplay {
                role,
                alive,
                emergency,
                lights_out,
            } => {
                let mut line = format!("Playing as {:?}", role);
                if !alive {
                    line.push_str(" (ghost)");
                }
                if let Some(remaining) = emergency {
                    let _ = write!(line, " | EMERGENCY {:.0}s", remaining);
                }
                if lights_out {
                    line.push_str(" | lights out");
                }
                line
            }
            Screen::Meeting => "Meeting called!".to_string(),
            Screen::Voting {
                can_vote,
                remaining,
            } => format!(
                "Voting: {:.0}s left{}",
                remaining,
                if can_vote { " - cast your vote" } else { "" }
            ),
            Screen::VoteResult(summary) => match summary.ejected {
                Some(id) => format!("{} was ejected", self.name_of(id)),
                None => "No one was ejected".to_string(),
            },
            Screen::GameOver {
                result,
                won,
                can_restart,
            } => format!(
                "Game over: {:?} ({}){}",
                result,
                if won { "victory" } else { "defeat" },
                if can_restart { " - type `restart`" } else { "" }
            ),
        }
    }

    /// Multi-line status: headline, players and interactable objects.
    pub fn render(&self) -> String {
        let mut out = self.headline();
        let Some(snapshot) = &self.snapshot else {
            return out;
        };

        let _ = write!(
            out,
            "\nTasks {}/{}",
            snapshot.completed_tasks, snapshot.total_tasks
        );
        for player in &snapshot.players {
            let _ = write!(
                out,
                "\n  [{}] {}{}{}{} tasks:{} at ({:.1}, {:.1})",
                player.id,
                player.name,
                if Some(player.id) == self.me { " (you)" } else { "" },
                if player.alive { "" } else { " [dead]" },
                if player.hidden { " [hidden]" } else { "" },
                player.tasks_completed,
                player.position.x,
                player.position.z,
            );
        }
        for object in &snapshot.objects {
            let label = match object.kind {
                ObjectKind::TaskStation => "task".to_string(),
                ObjectKind::Console(slot) => {
                    match snapshot.emergency.holders[slot.index()] {
                        Some(holder) => format!("console, held by {}", holder),
                        None => "console".to_string(),
                    }
                }
                ObjectKind::Vent => "vent".to_string(),
                ObjectKind::Body { victim } => format!("body of {}", self.name_of(victim)),
                ObjectKind::MeetingButton => "button".to_string(),
                ObjectKind::HidingSpot { occupied } => {
                    (if occupied { "hiding spot, taken" } else { "hiding spot" }).to_string()
                }
                ObjectKind::CoopButton { door, pressed } => format!(
                    "button for #{}{}",
                    door,
                    if pressed { ", pressed" } else { "" }
                ),
                ObjectKind::CoopDoor { open } => {
                    (if open { "door, open" } else { "door, closed" }).to_string()
                }
                ObjectKind::SecurityConsole { in_use } => {
                    (if in_use { "security, in use" } else { "security" }).to_string()
                }
                ObjectKind::Trap { ready } => {
                    (if ready { "trap" } else { "trap, recharging" }).to_string()
                }
            };
            let _ = write!(
                out,
                "\n  #{} {} ({}) at ({:.1}, {:.1})",
                object.id, object.name, label, object.position.x, object.position.z
            );
        }
        out
    }
}
