//! # Round State Machine
//!
//! The authoritative owner of a hosted session. It drives the phase cycle
//!
//! ```text
//! Lobby -> Gameplay <-> Meeting -> Voting -> Gameplay ... -> Ended -> Lobby
//! ```
//!
//! and folds every participant request into the shared state: interactions,
//! kills, body reports, ballots and restarts. Requests are validated against
//! the current phase and actor at the moment they are processed; a rejected
//! request returns a [`Rejection`] and leaves the state untouched.
//!
//! ## Timing
//!
//! Nothing blocks. The host loop calls [`RoundStateMachine::tick`] with the
//! elapsed frame time; phase timers, the emergency timers, vent cooldowns and
//! deferred transitions all advance from there. Deferred transitions carry
//! the round generation they were scheduled in and re-check the phase when
//! they fire, so a restart or an early game end turns them into no-ops.
//!
//! ## Replication
//!
//! Clients see the round through [`RoundSnapshot`]s, which carry the whole
//! replicated state, plus advisory [`ServerEvent`]s drained once per tick.

use crate::config::{GameSettings, MapLayout};
use crate::emergency::{EmergencyEvent, EmergencyRendezvous, EmergencyTimings};
use crate::error::{Rejection, RequestResult};
use crate::events::EventBus;
use crate::roster::Roster;
use crate::tasks::{TaskLedger, TaskStation};
use crate::timer::{Countdown, Scheduler};
use crate::voting::VotingSession;
use crate::world::{Interactable, Occupancy, World};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use shared::{
    BallotChoice, GameResult, ObjectId, PlayerId, PlayerSnapshot, RoundPhase, RoundSnapshot,
    ServerEvent, Vec3, VoteSummary, MAX_NAME_LEN,
};

/// Transitions scheduled for a later tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    ResumeGameplay { generation: u64 },
    RestoreLights { generation: u64 },
}

/// Uniform pick over `candidates`. `None` when there is nobody to pick.
pub fn pick_impostor<R: Rng>(candidates: &[PlayerId], rng: &mut R) -> Option<PlayerId> {
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[rng.gen_range(0..candidates.len())])
}

pub struct RoundStateMachine {
    settings: GameSettings,
    roster: Roster,
    ledger: TaskLedger,
    voting: VotingSession,
    emergency: EmergencyRendezvous,
    world: World,
    scheduler: Scheduler<Deferred>,
    events: EventBus,
    rng: StdRng,

    phase: RoundPhase,
    round_timer: Countdown,
    result: GameResult,
    generation: u64,
    scene_loaded: bool,
    lights_sabotaged: bool,
    last_vote: Option<VoteSummary>,
    tick: u32,
}

impl RoundStateMachine {
    pub fn new(settings: GameSettings, map: &MapLayout, rng: StdRng) -> Self {
        let world = World::from_layout(map, &settings);

        let mut ledger = TaskLedger::new(settings.tasks_per_player);
        for station in world.task_stations() {
            ledger.register_station(TaskStation::new(
                station.id,
                station.name.clone(),
                station.position,
            ));
        }
        if ledger.station_count() == 0 {
            warn!("No task stations registered; crewmates can only win by ejection");
        }

        let emergency = EmergencyRendezvous::new(
            map.consoles,
            EmergencyTimings {
                duration: settings.emergency_duration,
                cooldown: settings.emergency_cooldown,
                hold_timeout: settings.console_hold_timeout,
                release_radius: settings.console_release_radius,
            },
        );
        let voting = VotingSession::new(settings.voting_duration, settings.vote_closure_grace);

        Self {
            settings,
            roster: Roster::new(),
            ledger,
            voting,
            emergency,
            world,
            scheduler: Scheduler::new(),
            events: EventBus::new(),
            rng,
            phase: RoundPhase::Lobby,
            round_timer: Countdown::default(),
            result: GameResult::Unresolved,
            generation: 0,
            scene_loaded: false,
            lights_sabotaged: false,
            last_vote: None,
            tick: 0,
        }
    }

    /// Scene-load signal. Starts the lobby countdown the first time it is
    /// received.
    pub fn scene_loaded(&mut self) {
        if self.scene_loaded {
            return;
        }
        self.scene_loaded = true;
        if self.phase == RoundPhase::Lobby {
            self.round_timer.reset(self.settings.lobby_countdown);
            info!(
                "Scene loaded, lobby countdown {:.1}s",
                self.settings.lobby_countdown
            );
        }
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Adds a participant. Outside the lobby they join as a dead spectator
    /// until the next restart.
    pub fn connect(&mut self, id: PlayerId, name: &str) -> bool {
        let alive = self.phase == RoundPhase::Lobby;
        self.roster.join(id, display_name(id, name), alive)
    }

    /// Removes a participant and lets every component drop its references.
    pub fn disconnect(&mut self, id: PlayerId) {
        let previous_host = self.roster.host();
        if self.roster.leave(id).is_none() {
            return;
        }

        let released = self.emergency.release_player(id);
        self.apply_emergency_events(released);
        self.release_occupancy(id);

        self.voting.forget_voter(id);
        if self.phase == RoundPhase::Voting && self.voting.check_turnout(&self.roster) {
            debug!("Turnout complete after player {} left", id);
        }
        if self.roster.is_impostor(id) {
            warn!("Impostor {} disconnected; the round continues", id);
        }

        let host = self.roster.host();
        if host != previous_host {
            info!("Host is now {:?}", host);
        }

        self.evaluate(None);
    }

    // ------------------------------------------------------------------
    // Host tick
    // ------------------------------------------------------------------

    pub fn tick(&mut self, dt: f32) {
        self.tick = self.tick.wrapping_add(1);

        for task in self.scheduler.advance(dt) {
            self.run_deferred(task);
        }
        self.world.tick(dt);

        match self.phase {
            RoundPhase::Lobby => {
                if self.round_timer.tick(dt) {
                    self.start_round();
                }
            }
            RoundPhase::Gameplay => {
                let events = self.emergency.tick(dt, &self.roster);
                self.apply_emergency_events(events);
            }
            RoundPhase::Meeting => {
                if self.round_timer.tick(dt) {
                    self.begin_voting();
                }
            }
            RoundPhase::Voting => {
                if self.voting.tick(dt) {
                    self.conclude_voting();
                }
            }
            RoundPhase::Ended => {}
        }
    }

    fn run_deferred(&mut self, task: Deferred) {
        match task {
            Deferred::ResumeGameplay { generation } => {
                if generation != self.generation
                    || self.phase != RoundPhase::Voting
                    || self.voting.is_open()
                {
                    debug!("Dropping stale resume (phase {:?})", self.phase);
                    return;
                }
                self.transition(RoundPhase::Gameplay);
            }
            Deferred::RestoreLights { generation } => {
                if generation != self.generation || !self.lights_sabotaged {
                    return;
                }
                self.lights_sabotaged = false;
                info!("Lights restored");
                self.events
                    .publish(ServerEvent::LightsChanged { sabotaged: false });
            }
        }
    }

    fn transition(&mut self, to: RoundPhase) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        match to {
            RoundPhase::Lobby if self.scene_loaded => {
                self.round_timer.reset(self.settings.lobby_countdown)
            }
            RoundPhase::Meeting => self.round_timer.reset(self.settings.meeting_duration),
            _ => self.round_timer.disarm(),
        }
        info!("Phase {:?} -> {:?}", from, to);
        self.events.publish(ServerEvent::PhaseChanged { from, to });
    }

    fn start_round(&mut self) {
        let candidates = self.roster.ids();
        let required = self.settings.min_players.max(1);
        if candidates.len() < required {
            info!(
                "Lobby countdown expired with {} of {} required players; waiting",
                candidates.len(),
                required
            );
            self.round_timer.reset(self.settings.lobby_countdown);
            return;
        }
        let Some(impostor) = pick_impostor(&candidates, &mut self.rng) else {
            return;
        };

        self.generation += 1;
        self.roster.assign_roles(impostor);
        self.ledger.reset_all();
        self.ledger.begin_round(self.roster.living_crewmates());
        self.world.reset();
        self.emergency.reset();
        self.voting.reset();
        self.lights_sabotaged = false;
        self.last_vote = None;
        self.result = GameResult::Unresolved;
        self.teleport_living();

        info!(
            "Round {} started with {} players",
            self.generation,
            candidates.len()
        );
        self.events.publish(ServerEvent::RolesAssigned {
            impostor,
            total_tasks: self.ledger.total_target(),
        });
        self.transition(RoundPhase::Gameplay);
    }

    /// Places living participants on spawn points in id order.
    fn teleport_living(&mut self) {
        for (index, id) in self.roster.living_ids().into_iter().enumerate() {
            let Some(position) = self.world.spawn_position(index) else {
                return;
            };
            self.roster.set_position(id, position);
            self.events.publish(ServerEvent::Teleported {
                player: id,
                position,
            });
        }
    }

    fn begin_voting(&mut self) {
        self.voting.start();
        self.transition(RoundPhase::Voting);
        self.events.publish(ServerEvent::VotingStarted {
            duration: self.settings.voting_duration,
        });
        self.voting.check_turnout(&self.roster);
    }

    fn conclude_voting(&mut self) {
        let outcome = self.voting.conclude();
        self.last_vote = Some(VoteSummary {
            ejected: outcome.ejected,
            tie: outcome.tie,
        });
        self.events.publish(ServerEvent::VotingResult {
            ejected: outcome.ejected,
            tie: outcome.tie,
        });

        let eliminated = match outcome.ejected {
            Some(target) if self.roster.mark_dead(target) => {
                info!("Player {} was ejected", target);
                Some(target)
            }
            Some(target) => {
                debug!("Ejection target {} already gone", target);
                None
            }
            None => None,
        };

        self.evaluate(eliminated);
        if self.phase != RoundPhase::Ended {
            self.scheduler.schedule(
                self.settings.result_display_delay,
                Deferred::ResumeGameplay {
                    generation: self.generation,
                },
            );
        }
    }

    // ------------------------------------------------------------------
    // Win conditions
    // ------------------------------------------------------------------

    fn round_in_progress(&self) -> bool {
        matches!(
            self.phase,
            RoundPhase::Gameplay | RoundPhase::Meeting | RoundPhase::Voting
        )
    }

    /// Checks, in order: impostor eliminated, no living crewmates, all living
    /// crewmates at their task cap.
    fn evaluate(&mut self, eliminated: Option<PlayerId>) {
        if !self.round_in_progress() || self.result != GameResult::Unresolved {
            return;
        }

        let result = if eliminated.is_some() && eliminated == self.roster.impostor() {
            GameResult::CrewmatesWin
        } else if self.roster.living_crewmates() == 0 {
            GameResult::ImpostorWins
        } else if self.ledger.all_living_crewmates_done(&self.roster) {
            GameResult::CrewmatesWin
        } else {
            return;
        };
        self.end_round(result);
    }

    fn end_round(&mut self, result: GameResult) {
        if self.result != GameResult::Unresolved {
            return;
        }
        self.result = result;
        self.voting.reset();
        info!("Round {} over: {:?}", self.generation, result);
        self.events.publish(ServerEvent::GameOver { result });
        self.transition(RoundPhase::Ended);
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    fn require_living(&self, actor: PlayerId) -> RequestResult {
        if !self.roster.is_connected(actor) {
            return Err(Rejection::UnknownPlayer(actor));
        }
        if !self.roster.is_alive(actor) {
            return Err(Rejection::NotAlive(actor));
        }
        Ok(())
    }

    fn require_phase(&self, phase: RoundPhase) -> RequestResult {
        if self.phase != phase {
            return Err(Rejection::WrongPhase(self.phase));
        }
        Ok(())
    }

    /// A hidden player or one at a security console is stuck there.
    fn require_free(&self, actor: PlayerId) -> RequestResult {
        match self.world.occupancy(actor) {
            Some(occupancy) => Err(Rejection::Busy(occupancy.object())),
            None => Ok(()),
        }
    }

    /// Stores a client-reported position. Living participants are frozen
    /// outside Gameplay; spectators may always move.
    pub fn update_position(&mut self, actor: PlayerId, position: Vec3) -> RequestResult {
        if !position.is_finite() {
            return Err(Rejection::InvalidPosition);
        }
        if !self.roster.is_connected(actor) {
            return Err(Rejection::UnknownPlayer(actor));
        }
        if self.roster.is_alive(actor) {
            self.require_phase(RoundPhase::Gameplay)?;
            self.require_free(actor)?;
        }
        self.roster.set_position(actor, position);
        Ok(())
    }

    /// Routes an interaction to the object's handler after checking the
    /// actor is alive and within reach.
    pub fn request_interact(&mut self, object: ObjectId, actor: PlayerId) -> RequestResult {
        self.require_living(actor)?;
        self.require_phase(RoundPhase::Gameplay)?;

        if let Some(occupancy) = self.world.occupancy(actor) {
            if occupancy.object() != object {
                return Err(Rejection::Busy(occupancy.object()));
            }
        }

        let from = self.roster.position(actor).unwrap_or(Vec3::ZERO);
        let limit = self.settings.interact_range + self.settings.range_tolerance;
        let kind = self.world.reachable(object, from, limit)?.kind.clone();

        match kind {
            Interactable::TaskStation => {
                self.ledger
                    .complete_station(self.phase, object, actor, &self.roster)?;
                self.events.publish(ServerEvent::TaskCompleted {
                    player: actor,
                    completed: self.ledger.completed_total(),
                    total: self.ledger.total_target(),
                });
                self.evaluate(None);
            }
            Interactable::Console(slot) => {
                let events = self.emergency.interact(slot, actor, &self.roster)?;
                self.apply_emergency_events(events);
            }
            Interactable::Vent(_) => {
                if !self.roster.is_impostor(actor) {
                    return Err(Rejection::NotImpostor(actor));
                }
                let (_, position) = self.world.travel_vent(object)?;
                self.roster.set_position(actor, position);
                self.events.publish(ServerEvent::Teleported {
                    player: actor,
                    position,
                });
            }
            Interactable::Body { .. } | Interactable::MeetingButton => {
                self.report_body(actor)?;
            }
            Interactable::HidingSpot { .. } => {
                let (position, hidden) = self.world.toggle_hiding(object, actor)?;
                self.roster.set_position(actor, position);
                self.events.publish(ServerEvent::PlayerHidden {
                    player: actor,
                    spot: object,
                    hidden,
                });
                self.events.publish(ServerEvent::Teleported {
                    player: actor,
                    position,
                });
            }
            Interactable::CoopButton { .. } => {
                if let Some((door, open)) = self.world.press_button(object)? {
                    self.events.publish(ServerEvent::DoorChanged { door, open });
                }
            }
            Interactable::CoopDoor { .. } => return Err(Rejection::NotUsable(object)),
            Interactable::SecurityConsole { .. } => {
                let user = self.world.toggle_security(object, actor)?;
                self.events.publish(ServerEvent::SecurityChanged {
                    console: object,
                    user,
                });
            }
            Interactable::Trap(_) => {
                if !self.roster.is_impostor(actor) {
                    return Err(Rejection::NotImpostor(actor));
                }
                let at = self.world.trigger_trap(object)?;
                self.spring_trap(object, at);
            }
        }
        Ok(())
    }

    /// Kills every living, visible crewmate within the trap radius.
    fn spring_trap(&mut self, trap: ObjectId, at: Vec3) {
        let victims: Vec<PlayerId> = self
            .roster
            .living_crewmate_ids()
            .into_iter()
            .filter(|id| !self.world.is_hidden(*id))
            .filter(|id| {
                self.roster
                    .position(*id)
                    .is_some_and(|p| p.distance(&at) <= self.settings.trap_radius)
            })
            .collect();

        info!("Trap {} sprung, {} caught", trap, victims.len());
        for victim in &victims {
            self.eliminate(*victim);
        }
        self.events.publish(ServerEvent::TrapTriggered { trap, victims });
        self.evaluate(None);
    }

    /// Marks `victim` dead where they stand and leaves a corpse.
    fn eliminate(&mut self, victim: PlayerId) {
        if !self.roster.mark_dead(victim) {
            return;
        }
        self.release_occupancy(victim);
        let released = self.emergency.release_player(victim);
        self.apply_emergency_events(released);

        let at = self.roster.position(victim).unwrap_or(Vec3::ZERO);
        self.world.spawn_body(victim, at);
        info!("Player {} was killed", victim);
        self.events.publish(ServerEvent::PlayerKilled { victim });
    }

    fn release_occupancy(&mut self, player: PlayerId) {
        match self.world.vacate(player) {
            Some(Occupancy::Hiding(spot)) => self.events.publish(ServerEvent::PlayerHidden {
                player,
                spot,
                hidden: false,
            }),
            Some(Occupancy::Security(console)) => {
                self.events.publish(ServerEvent::SecurityChanged {
                    console,
                    user: None,
                })
            }
            None => {}
        }
    }

    /// Calls a meeting. Corpses are cleared and living participants return
    /// to the spawn points.
    pub fn report_body(&mut self, reporter: PlayerId) -> RequestResult {
        self.require_living(reporter)?;
        self.require_phase(RoundPhase::Gameplay)?;

        let cleared = self.world.clear_bodies();
        debug!("Meeting called by {}, {} bodies cleared", reporter, cleared);
        for id in self.roster.ids() {
            self.release_occupancy(id);
        }
        self.teleport_living();
        self.events
            .publish(ServerEvent::MeetingCalled { reporter });
        self.transition(RoundPhase::Meeting);
        Ok(())
    }

    pub fn cast_ballot(&mut self, voter: PlayerId, choice: BallotChoice) -> RequestResult {
        self.require_phase(RoundPhase::Voting)?;
        self.voting.cast_ballot(voter, choice, &self.roster)?;
        self.events.publish(ServerEvent::VoteCast { voter });
        Ok(())
    }

    pub fn kill(&mut self, actor: PlayerId, target: PlayerId) -> RequestResult {
        self.require_living(actor)?;
        self.require_phase(RoundPhase::Gameplay)?;
        if !self.roster.is_impostor(actor) {
            return Err(Rejection::NotImpostor(actor));
        }
        self.require_free(actor)?;
        if target == actor || !self.roster.is_alive(target) || self.world.is_hidden(target) {
            return Err(Rejection::InvalidTarget(target));
        }

        let from = self.roster.position(actor).unwrap_or(Vec3::ZERO);
        let at = self.roster.position(target).unwrap_or(Vec3::ZERO);
        let distance = from.distance(&at);
        let limit = self.settings.kill_range + self.settings.range_tolerance;
        if distance > limit {
            return Err(Rejection::OutOfRange {
                object: target,
                distance,
                limit,
            });
        }

        self.eliminate(target);
        self.evaluate(None);
        Ok(())
    }

    pub fn sabotage_lights(&mut self, actor: PlayerId) -> RequestResult {
        self.require_living(actor)?;
        self.require_phase(RoundPhase::Gameplay)?;
        if !self.roster.is_impostor(actor) {
            return Err(Rejection::NotImpostor(actor));
        }
        if self.lights_sabotaged {
            return Err(Rejection::AlreadySabotaged);
        }

        self.lights_sabotaged = true;
        info!("Lights sabotaged");
        self.events
            .publish(ServerEvent::LightsChanged { sabotaged: true });
        self.scheduler.schedule(
            self.settings.lights_sabotage_duration,
            Deferred::RestoreLights {
                generation: self.generation,
            },
        );
        Ok(())
    }

    /// Host-only, from Ended. Clears all per-round state and returns to the
    /// lobby with everyone alive again.
    pub fn request_restart(&mut self, requester: PlayerId) -> RequestResult {
        if self.roster.host() != Some(requester) {
            return Err(Rejection::NotHost(requester));
        }
        self.require_phase(RoundPhase::Ended)?;

        self.generation += 1;
        self.scheduler.clear();
        self.roster.clear_roles();
        self.roster.revive_all();
        self.ledger.reset_all();
        self.voting.reset();
        self.emergency.reset();
        self.world.reset();
        self.lights_sabotaged = false;
        self.last_vote = None;
        self.result = GameResult::Unresolved;

        info!("Restart requested by host {}", requester);
        self.transition(RoundPhase::Lobby);
        Ok(())
    }

    fn apply_emergency_events(&mut self, events: Vec<EmergencyEvent>) {
        for event in events {
            match event {
                EmergencyEvent::Started => self.events.publish(ServerEvent::EmergencyStarted {
                    duration: self.settings.emergency_duration,
                }),
                EmergencyEvent::Claimed { slot, holder } => {
                    self.events.publish(ServerEvent::ConsoleChanged {
                        slot,
                        holder: Some(holder),
                    })
                }
                EmergencyEvent::Released { slot, .. } => self
                    .events
                    .publish(ServerEvent::ConsoleChanged { slot, holder: None }),
                EmergencyEvent::Resolved => self.events.publish(ServerEvent::EmergencyResolved),
                EmergencyEvent::Failed => self.end_round(GameResult::ImpostorWins),
            }
        }
    }

    // ------------------------------------------------------------------
    // Replication
    // ------------------------------------------------------------------

    /// The phase-dependent round timer.
    pub fn timer(&self) -> f32 {
        match self.phase {
            RoundPhase::Lobby | RoundPhase::Meeting => self.round_timer.remaining(),
            RoundPhase::Voting => self.voting.remaining(),
            RoundPhase::Gameplay => self.emergency.time_remaining(),
            RoundPhase::Ended => 0.0,
        }
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            tick: self.tick,
            phase: self.phase,
            timer: self.timer(),
            host: self.roster.host(),
            impostor: self.roster.impostor(),
            players: self
                .roster
                .iter()
                .map(|p| PlayerSnapshot {
                    id: p.id,
                    name: p.name.clone(),
                    alive: p.alive,
                    tasks_completed: self.ledger.completed_by(p.id),
                    position: p.position,
                    hidden: self.world.is_hidden(p.id),
                })
                .collect(),
            objects: self.world.snapshot(),
            total_tasks: self.ledger.total_target(),
            completed_tasks: self.ledger.completed_total(),
            result: self.result,
            emergency: self.emergency.snapshot(),
            voting_open: self.voting.is_open(),
            vote_timer: if self.voting.is_open() {
                self.voting.remaining()
            } else {
                0.0
            },
            voted: self.voting.voters(),
            last_vote: self.last_vote,
            lights_sabotaged: self.lights_sabotaged,
        }
    }

    pub fn drain_events(&mut self) -> Vec<ServerEvent> {
        self.events.drain()
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn result(&self) -> GameResult {
        self.result
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn ledger(&self) -> &TaskLedger {
        &self.ledger
    }

    pub fn voting(&self) -> &VotingSession {
        &self.voting
    }

    pub fn emergency(&self) -> &EmergencyRendezvous {
        &self.emergency
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn lights_sabotaged(&self) -> bool {
        self.lights_sabotaged
    }
}

/// Trims and bounds a client-supplied name, falling back to `Player <id>`.
fn display_name(id: PlayerId, requested: &str) -> String {
    let trimmed: String = requested
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();
    if trimmed.is_empty() {
        format!("Player {}", id)
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CoopDoorLayout, HidingSpotLayout, ObjectLayout, SpawnPoint, StationLayout, VentLayout,
    };
    use rand::SeedableRng;
    use shared::{ConsoleSlot, ObjectKind};

    fn test_map() -> MapLayout {
        MapLayout {
            spawn_points: (0..4)
                .map(|i| SpawnPoint {
                    name: format!("Spawn_{}", i),
                    position: Vec3::new(i as f32, 0.0, 0.0),
                })
                .collect(),
            task_stations: (0..3)
                .map(|i| StationLayout {
                    name: format!("Task_{}", i),
                    position: Vec3::new(i as f32 * 10.0, 0.0, 10.0),
                })
                .collect(),
            consoles: [Vec3::new(-1.0, 0.0, -5.0), Vec3::new(1.0, 0.0, -5.0)],
            vents: vec![
                VentLayout {
                    name: "Vent_West".to_string(),
                    position: Vec3::new(-20.0, 0.0, 0.0),
                    linked: "Vent_East".to_string(),
                },
                VentLayout {
                    name: "Vent_East".to_string(),
                    position: Vec3::new(20.0, 0.0, 0.0),
                    linked: "Vent_West".to_string(),
                },
            ],
            meeting_button: Some(Vec3::new(0.0, 0.0, 2.0)),
            hiding_spots: vec![HidingSpotLayout {
                name: "Locker".to_string(),
                position: Vec3::new(6.0, 0.0, -20.0),
                exit: Vec3::new(6.0, 0.0, -18.0),
            }],
            coop_doors: vec![CoopDoorLayout {
                name: "Door".to_string(),
                position: Vec3::new(30.0, 0.0, -10.0),
                buttons: [Vec3::new(28.0, 0.0, -10.0), Vec3::new(32.0, 0.0, -10.0)],
            }],
            security_consoles: vec![ObjectLayout {
                name: "Cameras".to_string(),
                position: Vec3::new(-10.0, 0.0, -20.0),
            }],
            traps: vec![ObjectLayout {
                name: "Trap".to_string(),
                position: Vec3::new(10.0, 0.0, -20.0),
            }],
        }
    }

    fn machine(players: u32, seed: u64) -> RoundStateMachine {
        let mut machine = RoundStateMachine::new(
            GameSettings::default(),
            &test_map(),
            StdRng::seed_from_u64(seed),
        );
        for id in 1..=players {
            assert!(machine.connect(id, ""));
        }
        machine.scene_loaded();
        machine
    }

    fn started(players: u32, seed: u64) -> RoundStateMachine {
        let mut machine = machine(players, seed);
        machine.tick(machine.settings().lobby_countdown);
        assert_eq!(machine.phase(), RoundPhase::Gameplay);
        machine.drain_events();
        machine
    }

    fn impostor(machine: &RoundStateMachine) -> PlayerId {
        machine.roster().impostor().unwrap()
    }

    fn crewmates(machine: &RoundStateMachine) -> Vec<PlayerId> {
        machine.roster().living_crewmate_ids()
    }

    fn object_of(machine: &RoundStateMachine, kind: ObjectKind) -> (ObjectId, Vec3) {
        machine
            .world()
            .snapshot()
            .into_iter()
            .find(|o| o.kind == kind)
            .map(|o| (o.id, o.position))
            .unwrap()
    }

    fn object_named(machine: &RoundStateMachine, name: &str) -> (ObjectId, Vec3) {
        machine
            .world()
            .snapshot()
            .into_iter()
            .find(|o| o.name == name)
            .map(|o| (o.id, o.position))
            .unwrap()
    }

    /// Walks `player` to `object` and uses it.
    fn use_object(machine: &mut RoundStateMachine, player: PlayerId, name: &str) -> RequestResult {
        let (id, position) = object_named(machine, name);
        machine.update_position(player, position)?;
        machine.request_interact(id, player)
    }

    fn into_voting(machine: &mut RoundStateMachine) {
        let reporter = crewmates(machine)[0];
        machine.report_body(reporter).unwrap();
        machine.tick(machine.settings().meeting_duration);
        assert_eq!(machine.phase(), RoundPhase::Voting);
    }

    #[test]
    fn test_lobby_waits_for_scene_load() {
        let mut machine = RoundStateMachine::new(
            GameSettings::default(),
            &test_map(),
            StdRng::seed_from_u64(1),
        );
        machine.connect(1, "Red");
        machine.tick(60.0);
        assert_eq!(machine.phase(), RoundPhase::Lobby);

        machine.scene_loaded();
        assert_eq!(machine.timer(), 5.0);
        machine.tick(5.0);
        assert_eq!(machine.phase(), RoundPhase::Gameplay);
    }

    #[test]
    fn test_empty_lobby_rearms_countdown() {
        let mut machine = machine(0, 1);
        machine.tick(5.0);
        assert_eq!(machine.phase(), RoundPhase::Lobby);
        assert_eq!(machine.timer(), 5.0);

        machine.connect(1, "");
        machine.tick(5.0);
        assert_eq!(machine.phase(), RoundPhase::Gameplay);
    }

    #[test]
    fn test_round_start_assigns_one_impostor_and_target() {
        let mut machine = machine(4, 7);
        machine.tick(5.0);

        let impostors: Vec<_> = machine
            .roster()
            .iter()
            .filter(|p| p.role == shared::Role::Impostor)
            .collect();
        assert_eq!(impostors.len(), 1);
        assert_eq!(crewmates(&machine).len(), 3);
        // min(3 per player, 3 stations) x 3 crewmates
        assert_eq!(machine.ledger().total_target(), 9);

        let events = machine.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, ServerEvent::RolesAssigned { total_tasks: 9, .. })));
        assert!(events.contains(&ServerEvent::PhaseChanged {
            from: RoundPhase::Lobby,
            to: RoundPhase::Gameplay
        }));
    }

    #[test]
    fn test_spawn_assignment_is_deterministic() {
        let machine = started(4, 3);
        for id in 1..=4u32 {
            assert_eq!(
                machine.roster().position(id),
                Some(Vec3::new((id - 1) as f32, 0.0, 0.0))
            );
        }
    }

    #[test]
    fn test_impostor_pick_is_uniform() {
        let mut rng = StdRng::seed_from_u64(42);
        let candidates = [1, 2, 3, 4];
        let mut counts = [0usize; 4];
        let trials = 8000;
        for _ in 0..trials {
            let pick = pick_impostor(&candidates, &mut rng).unwrap();
            counts[(pick - 1) as usize] += 1;
        }
        for count in counts {
            // Expected 2000 each; allow generous slack
            assert!(count > 1700 && count < 2300, "skewed counts: {:?}", counts);
        }
        assert_eq!(pick_impostor(&[], &mut rng), None);
    }

    #[test]
    fn test_exactly_one_impostor_across_seeds() {
        for seed in 0..50 {
            let machine = started(5, seed);
            let impostors = machine
                .roster()
                .iter()
                .filter(|p| machine.roster().is_impostor(p.id))
                .count();
            assert_eq!(impostors, 1);
        }
    }

    #[test]
    fn test_report_body_is_idempotent() {
        let mut machine = started(4, 1);
        let reporter = crewmates(&machine)[0];

        assert!(machine.report_body(reporter).is_ok());
        assert_eq!(
            machine.report_body(reporter),
            Err(Rejection::WrongPhase(RoundPhase::Meeting))
        );
        let meetings = machine
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, ServerEvent::MeetingCalled { .. }))
            .count();
        assert_eq!(meetings, 1);
    }

    #[test]
    fn test_dead_cannot_report() {
        let mut machine = started(4, 1);
        let victim = crewmates(&machine)[0];
        let killer = impostor(&machine);
        let at = machine.roster().position(victim).unwrap();
        machine.update_position(killer, at).unwrap();
        machine.kill(killer, victim).unwrap();

        assert_eq!(machine.report_body(victim), Err(Rejection::NotAlive(victim)));
    }

    #[test]
    fn test_kill_spawns_body_and_report_clears_it() {
        let mut machine = started(4, 2);
        let killer = impostor(&machine);
        let victim = crewmates(&machine)[0];

        let far = machine.roster().position(victim).unwrap();
        machine
            .update_position(killer, Vec3::new(far.x + 10.0, 0.0, 0.0))
            .unwrap();
        assert!(matches!(
            machine.kill(killer, victim),
            Err(Rejection::OutOfRange { .. })
        ));

        machine.update_position(killer, far).unwrap();
        machine.kill(killer, victim).unwrap();
        assert!(!machine.roster().is_alive(victim));
        assert_eq!(machine.world().body_count(), 1);
        assert_eq!(machine.kill(killer, victim), Err(Rejection::InvalidTarget(victim)));

        // Crewmates cannot kill
        let other = crewmates(&machine)[0];
        assert_eq!(machine.kill(other, killer), Err(Rejection::NotImpostor(other)));

        let (body, body_at) = object_of(&machine, ObjectKind::Body { victim });
        let reporter = crewmates(&machine)[0];
        machine.update_position(reporter, body_at).unwrap();
        machine.request_interact(body, reporter).unwrap();
        assert_eq!(machine.phase(), RoundPhase::Meeting);
        assert_eq!(machine.world().body_count(), 0);
    }

    #[test]
    fn test_last_crewmate_killed_impostor_wins() {
        let mut machine = started(2, 5);
        let killer = impostor(&machine);
        let victim = crewmates(&machine)[0];
        let at = machine.roster().position(victim).unwrap();
        machine.update_position(killer, at).unwrap();

        machine.kill(killer, victim).unwrap();
        assert_eq!(machine.phase(), RoundPhase::Ended);
        assert_eq!(machine.result(), GameResult::ImpostorWins);
    }

    #[test]
    fn test_duplicate_ballot_keeps_first() {
        let mut machine = started(4, 3);
        into_voting(&mut machine);
        let crew = crewmates(&machine);
        let (a, b, c) = (crew[0], crew[1], crew[2]);

        machine.cast_ballot(a, BallotChoice::Player(b)).unwrap();
        assert_eq!(
            machine.cast_ballot(a, BallotChoice::Player(c)),
            Err(Rejection::DuplicateBallot(a))
        );
        assert_eq!(machine.voting().voters(), vec![a]);
        let casts = machine
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, ServerEvent::VoteCast { .. }))
            .count();
        assert_eq!(casts, 1);
    }

    #[test]
    fn test_ejecting_crewmate_resumes_gameplay_after_delay() {
        let mut machine = started(4, 4);
        into_voting(&mut machine);
        let imp = impostor(&machine);
        let crew = crewmates(&machine);
        let target = crew[2];

        machine.cast_ballot(crew[0], BallotChoice::Player(target)).unwrap();
        machine.cast_ballot(crew[1], BallotChoice::Player(target)).unwrap();
        machine.cast_ballot(imp, BallotChoice::Player(target)).unwrap();
        machine.cast_ballot(target, BallotChoice::Skip).unwrap();

        // Grace period, then the result is shown while the phase stays Voting
        machine.tick(3.0);
        assert_eq!(machine.phase(), RoundPhase::Voting);
        assert!(!machine.voting().is_open());
        assert!(!machine.roster().is_alive(target));
        assert_eq!(
            machine.snapshot().last_vote,
            Some(VoteSummary {
                ejected: Some(target),
                tie: false
            })
        );

        machine.tick(4.9);
        assert_eq!(machine.phase(), RoundPhase::Voting);
        machine.tick(0.1);
        assert_eq!(machine.phase(), RoundPhase::Gameplay);
        assert_eq!(machine.result(), GameResult::Unresolved);
    }

    #[test]
    fn test_departed_voter_no_longer_counts() {
        let mut machine = started(4, 6);
        into_voting(&mut machine);
        let imp = impostor(&machine);
        let crew = crewmates(&machine);
        let (a, c, d) = (crew[0], crew[1], crew[2]);

        machine.cast_ballot(a, BallotChoice::Player(d)).unwrap();
        machine.cast_ballot(imp, BallotChoice::Player(c)).unwrap();
        machine.cast_ballot(c, BallotChoice::Player(d)).unwrap();
        machine.disconnect(a);

        // Two of three living players have voted, so the timer runs on
        assert!(!machine.voting().has_voted(a));
        assert!(machine.voting().is_open());
        assert!(machine.voting().remaining() > machine.settings().vote_closure_grace);
        assert_eq!(machine.phase(), RoundPhase::Voting);
        machine.drain_events();

        machine.tick(machine.settings().voting_duration);
        assert!(machine.drain_events().contains(&ServerEvent::VotingResult {
            ejected: None,
            tie: true
        }));
        assert!(machine.roster().is_alive(d));
        assert_eq!(machine.roster().living_count(), 3);
    }

    #[test]
    fn test_tie_ejects_nobody() {
        let mut machine = started(4, 6);
        into_voting(&mut machine);
        let ids = machine.roster().ids();
        let (x, y) = (ids[0], ids[1]);

        machine.cast_ballot(ids[0], BallotChoice::Player(y)).unwrap();
        machine.cast_ballot(ids[1], BallotChoice::Player(x)).unwrap();
        machine.cast_ballot(ids[2], BallotChoice::Player(x)).unwrap();
        machine.cast_ballot(ids[3], BallotChoice::Player(y)).unwrap();
        machine.tick(3.0);

        assert_eq!(machine.roster().living_count(), 4);
        assert!(machine.drain_events().contains(&ServerEvent::VotingResult {
            ejected: None,
            tie: true
        }));
    }

    #[test]
    fn test_impostor_voted_out_crewmates_win() {
        let mut machine = started(4, 8);
        into_voting(&mut machine);
        let imp = impostor(&machine);
        for voter in crewmates(&machine) {
            machine.cast_ballot(voter, BallotChoice::Player(imp)).unwrap();
        }
        let crew = crewmates(&machine);
        machine.cast_ballot(imp, BallotChoice::Player(crew[0])).unwrap();

        machine.tick(3.0);
        assert_eq!(machine.phase(), RoundPhase::Ended);
        assert_eq!(machine.result(), GameResult::CrewmatesWin);
        assert_eq!(machine.ledger().completed_total(), 0);
    }

    #[test]
    fn test_stale_resume_does_not_leave_ended() {
        let mut machine = started(3, 9);
        into_voting(&mut machine);
        for voter in machine.roster().ids() {
            machine.cast_ballot(voter, BallotChoice::Skip).unwrap();
        }
        machine.tick(3.0);
        assert_eq!(machine.phase(), RoundPhase::Voting);

        // Every crewmate leaves during the result display
        for crew in crewmates(&machine) {
            machine.disconnect(crew);
        }
        assert_eq!(machine.phase(), RoundPhase::Ended);
        assert_eq!(machine.result(), GameResult::ImpostorWins);

        machine.tick(10.0);
        assert_eq!(machine.phase(), RoundPhase::Ended);
    }

    #[test]
    fn test_tasks_complete_crewmates_win() {
        let mut machine = started(2, 10);
        let crew = crewmates(&machine)[0];
        let imp = impostor(&machine);
        let stations: Vec<(ObjectId, Vec3)> = machine
            .world()
            .task_stations()
            .map(|s| (s.id, s.position))
            .collect();

        // Impostor cannot do tasks
        machine.update_position(imp, stations[0].1).unwrap();
        assert_eq!(
            machine.request_interact(stations[0].0, imp),
            Err(Rejection::ImpostorTask)
        );

        // Out of reach
        assert!(matches!(
            machine.request_interact(stations[0].0, crew),
            Err(Rejection::OutOfRange { .. })
        ));

        for (id, position) in &stations {
            assert_eq!(machine.phase(), RoundPhase::Gameplay);
            machine.update_position(crew, *position).unwrap();
            machine.request_interact(*id, crew).unwrap();
        }
        assert_eq!(machine.ledger().completed_by(crew), 3);
        assert_eq!(machine.phase(), RoundPhase::Ended);
        assert_eq!(machine.result(), GameResult::CrewmatesWin);
    }

    #[test]
    fn test_emergency_failure_ends_round_and_stays_ended() {
        let mut machine = started(4, 11);
        machine.tick(20.0);
        assert!(machine.emergency().is_active());
        assert_eq!(machine.timer(), 30.0);

        machine.tick(30.0);
        assert_eq!(machine.phase(), RoundPhase::Ended);
        assert_eq!(machine.result(), GameResult::ImpostorWins);

        for _ in 0..100 {
            machine.tick(1.0);
        }
        assert_eq!(machine.phase(), RoundPhase::Ended);
        assert_eq!(machine.result(), GameResult::ImpostorWins);
    }

    #[test]
    fn test_emergency_timers_freeze_outside_gameplay() {
        let mut machine = started(4, 12);
        machine.tick(19.0);
        let reporter = crewmates(&machine)[0];
        machine.report_body(reporter).unwrap();
        machine.tick(0.2);
        assert_eq!(machine.emergency().cooldown_remaining(), 1.0);
        assert!(!machine.emergency().is_active());
    }

    #[test]
    fn test_console_rendezvous_through_interact() {
        let mut machine = started(4, 13);
        machine.tick(20.0);
        let crew = crewmates(&machine);
        let (p, q) = (crew[0], crew[1]);
        let (console_a, _) = object_of(&machine, ObjectKind::Console(ConsoleSlot::A));
        let (console_b, at_b) = object_of(&machine, ObjectKind::Console(ConsoleSlot::B));

        // Consoles are close enough that one player can reach both
        machine.update_position(p, Vec3::new(0.0, 0.0, -5.0)).unwrap();
        machine.request_interact(console_a, p).unwrap();
        assert_eq!(
            machine.request_interact(console_b, p),
            Err(Rejection::SelfRendezvous(p))
        );
        assert!(machine.emergency().is_active());

        machine.update_position(q, at_b).unwrap();
        machine.request_interact(console_b, q).unwrap();
        assert!(!machine.emergency().is_active());
        assert!(machine
            .drain_events()
            .contains(&ServerEvent::EmergencyResolved));
        assert_eq!(machine.phase(), RoundPhase::Gameplay);
    }

    #[test]
    fn test_vent_is_impostor_only() {
        let mut machine = started(3, 14);
        let imp = impostor(&machine);
        let crew = crewmates(&machine)[0];
        let (vent, at) = machine
            .world()
            .snapshot()
            .into_iter()
            .find(|o| o.name == "Vent_West")
            .map(|o| (o.id, o.position))
            .unwrap();

        machine.update_position(crew, at).unwrap();
        assert_eq!(
            machine.request_interact(vent, crew),
            Err(Rejection::NotImpostor(crew))
        );

        machine.update_position(imp, at).unwrap();
        machine.request_interact(vent, imp).unwrap();
        assert_eq!(
            machine.roster().position(imp),
            Some(Vec3::new(20.0, 0.0, 0.0))
        );
    }

    #[test]
    fn test_lights_sabotage_restores() {
        let mut machine = started(3, 15);
        let imp = impostor(&machine);
        let crew = crewmates(&machine)[0];

        assert_eq!(machine.sabotage_lights(crew), Err(Rejection::NotImpostor(crew)));
        machine.sabotage_lights(imp).unwrap();
        assert!(machine.snapshot().lights_sabotaged);
        assert_eq!(machine.sabotage_lights(imp), Err(Rejection::AlreadySabotaged));

        machine.tick(10.0);
        assert!(!machine.lights_sabotaged());
    }

    #[test]
    fn test_restart_is_host_only_from_ended() {
        let mut machine = started(2, 16);
        assert_eq!(
            machine.request_restart(1),
            Err(Rejection::WrongPhase(RoundPhase::Gameplay))
        );

        let killer = impostor(&machine);
        let victim = crewmates(&machine)[0];
        let at = machine.roster().position(victim).unwrap();
        machine.update_position(killer, at).unwrap();
        machine.kill(killer, victim).unwrap();
        assert_eq!(machine.phase(), RoundPhase::Ended);

        assert_eq!(machine.request_restart(2), Err(Rejection::NotHost(2)));
        assert_eq!(machine.phase(), RoundPhase::Ended);

        machine.request_restart(1).unwrap();
        assert_eq!(machine.phase(), RoundPhase::Lobby);
        assert_eq!(machine.result(), GameResult::Unresolved);
        assert_eq!(machine.roster().impostor(), None);
        assert_eq!(machine.roster().living_count(), 2);
        assert_eq!(machine.world().body_count(), 0);
        assert_eq!(machine.timer(), 5.0);
    }

    #[test]
    fn test_late_joiner_spectates_until_restart() {
        let mut machine = started(2, 17);
        assert!(machine.connect(9, "Late"));
        assert!(!machine.roster().is_alive(9));
        assert_eq!(machine.report_body(9), Err(Rejection::NotAlive(9)));
        // Spectators can roam
        assert!(machine.update_position(9, Vec3::new(3.0, 0.0, 3.0)).is_ok());

        let killer = impostor(&machine);
        let victim = crewmates(&machine)[0];
        let at = machine.roster().position(victim).unwrap();
        machine.update_position(killer, at).unwrap();
        machine.kill(killer, victim).unwrap();
        machine.request_restart(1).unwrap();
        assert!(machine.roster().is_alive(9));
    }

    #[test]
    fn test_impostor_disconnect_does_not_end_round() {
        let mut machine = started(3, 18);
        let imp = impostor(&machine);
        machine.disconnect(imp);

        assert_eq!(machine.phase(), RoundPhase::Gameplay);
        assert_eq!(machine.roster().impostor(), Some(imp));
        assert_eq!(machine.roster().living_crewmates(), 2);
        machine.tick(1.0);
        assert_eq!(machine.result(), GameResult::Unresolved);
    }

    #[test]
    fn test_host_promotion_on_leave() {
        let mut machine = machine(3, 19);
        assert_eq!(machine.snapshot().host, Some(1));
        machine.disconnect(1);
        assert_eq!(machine.snapshot().host, Some(2));
        machine.disconnect(42);
        assert_eq!(machine.roster().len(), 2);
    }

    #[test]
    fn test_positions_frozen_outside_gameplay() {
        let mut machine = started(3, 20);
        let crew = crewmates(&machine)[0];
        machine.report_body(crew).unwrap();
        assert_eq!(
            machine.update_position(crew, Vec3::new(5.0, 0.0, 5.0)),
            Err(Rejection::WrongPhase(RoundPhase::Meeting))
        );
        assert_eq!(
            machine.update_position(crew, Vec3::new(f32::NAN, 0.0, 0.0)),
            Err(Rejection::InvalidPosition)
        );
    }

    #[test]
    fn test_display_names() {
        assert_eq!(display_name(4, "  "), "Player 4");
        assert_eq!(display_name(4, " Red "), "Red");
        assert_eq!(display_name(4, &"x".repeat(100)).len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_hidden_player_is_not_a_kill_target() {
        let mut machine = started(3, 12);
        let imp = impostor(&machine);
        let crew = crewmates(&machine);
        let (a, b) = (crew[0], crew[1]);
        let (locker, at) = object_named(&machine, "Locker");

        use_object(&mut machine, a, "Locker").unwrap();
        assert!(machine.world().is_hidden(a));
        assert_eq!(machine.roster().position(a), Some(at));
        assert_eq!(machine.snapshot().player(a).map(|p| p.hidden), Some(true));
        assert!(machine.drain_events().contains(&ServerEvent::PlayerHidden {
            player: a,
            spot: locker,
            hidden: true
        }));

        assert_eq!(
            use_object(&mut machine, b, "Locker"),
            Err(Rejection::ObjectOccupied(locker))
        );
        machine.update_position(imp, at).unwrap();
        assert_eq!(machine.kill(imp, a), Err(Rejection::InvalidTarget(a)));

        // Stuck inside until leaving through the same spot
        assert_eq!(machine.update_position(a, Vec3::ZERO), Err(Rejection::Busy(locker)));
        let (button, _) = object_named(&machine, "Meeting_Button");
        assert_eq!(machine.request_interact(button, a), Err(Rejection::Busy(locker)));

        machine.request_interact(locker, a).unwrap();
        assert!(!machine.world().is_hidden(a));
        assert_eq!(machine.roster().position(a), Some(Vec3::new(6.0, 0.0, -18.0)));
        machine.kill(imp, a).unwrap();
        assert!(!machine.roster().is_alive(a));

        // Leaving the session frees the spot
        machine.update_position(b, at).unwrap();
        machine.request_interact(locker, b).unwrap();
        machine.disconnect(b);
        assert!(machine
            .world()
            .snapshot()
            .iter()
            .any(|o| o.id == locker && o.kind == ObjectKind::HidingSpot { occupied: false }));
    }

    #[test]
    fn test_coop_door_opens_with_both_buttons() {
        let mut machine = started(3, 13);
        let crew = crewmates(&machine);
        let (door, _) = object_named(&machine, "Door");

        use_object(&mut machine, crew[0], "Door_Button_1").unwrap();
        assert!(!machine
            .drain_events()
            .iter()
            .any(|e| matches!(e, ServerEvent::DoorChanged { .. })));

        use_object(&mut machine, crew[1], "Door_Button_2").unwrap();
        assert!(machine
            .drain_events()
            .contains(&ServerEvent::DoorChanged { door, open: true }));
        assert_eq!(
            machine.request_interact(door, crew[1]),
            Err(Rejection::NotUsable(door))
        );

        use_object(&mut machine, crew[0], "Door_Button_1").unwrap();
        assert!(machine
            .drain_events()
            .contains(&ServerEvent::DoorChanged { door, open: false }));
    }

    #[test]
    fn test_security_console_released_by_meeting() {
        let mut machine = started(3, 14);
        let crew = crewmates(&machine);
        let (a, b) = (crew[0], crew[1]);
        let (cameras, _) = object_named(&machine, "Cameras");

        use_object(&mut machine, a, "Cameras").unwrap();
        assert!(machine.drain_events().contains(&ServerEvent::SecurityChanged {
            console: cameras,
            user: Some(a)
        }));
        assert_eq!(
            use_object(&mut machine, b, "Cameras"),
            Err(Rejection::ObjectOccupied(cameras))
        );
        assert_eq!(machine.update_position(a, Vec3::ZERO), Err(Rejection::Busy(cameras)));

        machine.report_body(b).unwrap();
        assert_eq!(machine.world().occupancy(a), None);
        assert!(machine.drain_events().contains(&ServerEvent::SecurityChanged {
            console: cameras,
            user: None
        }));
    }

    #[test]
    fn test_trap_kills_visible_crewmates_in_radius() {
        let mut machine = started(4, 15);
        let imp = impostor(&machine);
        let crew = crewmates(&machine);
        let (near, far, hidden) = (crew[0], crew[1], crew[2]);
        let (trap, at) = object_named(&machine, "Trap");

        machine
            .update_position(near, Vec3::new(at.x, 0.0, at.z + 3.0))
            .unwrap();
        machine
            .update_position(far, Vec3::new(at.x, 0.0, at.z + 10.0))
            .unwrap();
        // The locker sits right on the edge of the radius
        use_object(&mut machine, hidden, "Locker").unwrap();

        machine.update_position(near, at).unwrap();
        assert_eq!(
            machine.request_interact(trap, near),
            Err(Rejection::NotImpostor(near))
        );
        machine
            .update_position(near, Vec3::new(at.x, 0.0, at.z + 3.0))
            .unwrap();
        machine.drain_events();

        machine.update_position(imp, at).unwrap();
        machine.request_interact(trap, imp).unwrap();

        assert!(!machine.roster().is_alive(near));
        assert!(machine.roster().is_alive(far));
        assert!(machine.roster().is_alive(hidden));
        assert_eq!(machine.world().body_count(), 1);
        let events = machine.drain_events();
        assert!(events.contains(&ServerEvent::PlayerKilled { victim: near }));
        assert!(events.contains(&ServerEvent::TrapTriggered {
            trap,
            victims: vec![near]
        }));
        assert_eq!(machine.phase(), RoundPhase::Gameplay);

        assert_eq!(
            machine.request_interact(trap, imp),
            Err(Rejection::TrapCooldown)
        );
        machine.tick(machine.settings().trap_cooldown);
        assert!(machine.request_interact(trap, imp).is_ok());
    }
}
