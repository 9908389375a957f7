//! Dual-console emergency rendezvous.
//!
//! While an emergency is active, two different living participants must hold
//! the two consoles at the same time before the countdown runs out. Holds are
//! claimed and released one request at a time on the host tick, so the
//! distinct-holder check cannot interleave with another claim.

use crate::error::{Rejection, RequestResult};
use crate::roster::Roster;
use crate::timer::Countdown;
use log::{debug, info, warn};
use shared::{ConsoleSlot, EmergencySnapshot, PlayerId, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    Cancelled,
    HolderGone,
    OutOfRange,
    HoldTimeout,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyEvent {
    Started,
    Claimed {
        slot: ConsoleSlot,
        holder: PlayerId,
    },
    Released {
        slot: ConsoleSlot,
        holder: PlayerId,
        reason: ReleaseReason,
    },
    Resolved,
    Failed,
}

#[derive(Debug, Clone)]
pub struct EmergencyTimings {
    pub duration: f32,
    pub cooldown: f32,
    pub hold_timeout: f32,
    pub release_radius: f32,
}

#[derive(Debug, Clone)]
struct Console {
    position: Vec3,
    holder: Option<PlayerId>,
    hold_timer: Countdown,
}

impl Console {
    fn new(position: Vec3) -> Self {
        Self {
            position,
            holder: None,
            hold_timer: Countdown::default(),
        }
    }

    fn free(&mut self) -> Option<PlayerId> {
        self.hold_timer.disarm();
        self.holder.take()
    }
}

#[derive(Debug)]
pub struct EmergencyRendezvous {
    timings: EmergencyTimings,
    active: bool,
    countdown: Countdown,
    cooldown: Countdown,
    consoles: [Console; 2],
}

impl EmergencyRendezvous {
    pub fn new(positions: [Vec3; 2], timings: EmergencyTimings) -> Self {
        let cooldown = Countdown::new(timings.cooldown);
        Self {
            timings,
            active: false,
            countdown: Countdown::default(),
            cooldown,
            consoles: [Console::new(positions[0]), Console::new(positions[1])],
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn holder(&self, slot: ConsoleSlot) -> Option<PlayerId> {
        self.consoles[slot.index()].holder
    }

    pub fn position(&self, slot: ConsoleSlot) -> Vec3 {
        self.consoles[slot.index()].position
    }

    pub fn time_remaining(&self) -> f32 {
        if self.active {
            self.countdown.remaining()
        } else {
            0.0
        }
    }

    pub fn cooldown_remaining(&self) -> f32 {
        self.cooldown.remaining()
    }

    /// Toggles `player`'s hold on `slot`.
    ///
    /// A free console is claimed unless the player already holds the other
    /// one; the player's own console is released; a console held by someone
    /// else is left alone. A claim that completes the pair resolves the
    /// emergency in the same call.
    pub fn interact(
        &mut self,
        slot: ConsoleSlot,
        player: PlayerId,
        roster: &Roster,
    ) -> RequestResult<Vec<EmergencyEvent>> {
        if !self.active {
            return Err(Rejection::EmergencyInactive);
        }
        if !roster.is_alive(player) {
            return Err(Rejection::NotAlive(player));
        }

        match self.consoles[slot.index()].holder {
            Some(holder) if holder == player => {
                self.consoles[slot.index()].free();
                debug!("Player {} released console {:?}", player, slot);
                return Ok(vec![EmergencyEvent::Released {
                    slot,
                    holder: player,
                    reason: ReleaseReason::Cancelled,
                }]);
            }
            Some(_) => return Err(Rejection::ConsoleOccupied(slot)),
            None => {}
        }

        if self.consoles[slot.other().index()].holder == Some(player) {
            return Err(Rejection::SelfRendezvous(player));
        }

        let console = &mut self.consoles[slot.index()];
        console.holder = Some(player);
        console.hold_timer.reset(self.timings.hold_timeout);
        debug!("Player {} claimed console {:?}", player, slot);

        let mut events = vec![EmergencyEvent::Claimed {
            slot,
            holder: player,
        }];
        if self.both_held_by_distinct() {
            self.resolve();
            events.push(EmergencyEvent::Resolved);
        }
        Ok(events)
    }

    fn both_held_by_distinct(&self) -> bool {
        match (self.consoles[0].holder, self.consoles[1].holder) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        }
    }

    fn resolve(&mut self) {
        info!("Emergency resolved");
        self.active = false;
        self.countdown.disarm();
        self.cooldown.reset(self.timings.cooldown);
        for console in &mut self.consoles {
            console.free();
        }
    }

    fn start(&mut self) -> Vec<EmergencyEvent> {
        warn!(
            "Emergency started: {:.0}s to hold both consoles",
            self.timings.duration
        );
        let mut events = self.release_all(ReleaseReason::Reset);
        self.active = true;
        self.countdown.reset(self.timings.duration);
        events.push(EmergencyEvent::Started);
        events
    }

    fn release_all(&mut self, reason: ReleaseReason) -> Vec<EmergencyEvent> {
        let mut events = Vec::new();
        for slot in ConsoleSlot::ALL {
            if let Some(holder) = self.consoles[slot.index()].free() {
                events.push(EmergencyEvent::Released {
                    slot,
                    holder,
                    reason,
                });
            }
        }
        events
    }

    /// Releases any hold whose holder has died, disconnected, walked out of
    /// range or held past the timeout.
    fn release_stale_holds(&mut self, dt: f32, roster: &Roster) -> Vec<EmergencyEvent> {
        let mut events = Vec::new();
        for slot in ConsoleSlot::ALL {
            let console = &mut self.consoles[slot.index()];
            let Some(holder) = console.holder else {
                continue;
            };

            let reason = match roster.get(holder) {
                Some(p) if !p.alive => Some(ReleaseReason::HolderGone),
                None => Some(ReleaseReason::HolderGone),
                Some(p) if p.position.distance(&console.position) > self.timings.release_radius => {
                    Some(ReleaseReason::OutOfRange)
                }
                Some(_) if console.hold_timer.tick(dt) => Some(ReleaseReason::HoldTimeout),
                Some(_) => None,
            };

            if let Some(reason) = reason {
                console.free();
                debug!("Console {:?} released from {}: {:?}", slot, holder, reason);
                events.push(EmergencyEvent::Released {
                    slot,
                    holder,
                    reason,
                });
            }
        }
        events
    }

    /// Advances the emergency timers. Only called while the round is in
    /// Gameplay; timers stay frozen through meetings.
    pub fn tick(&mut self, dt: f32, roster: &Roster) -> Vec<EmergencyEvent> {
        let mut events = self.release_stale_holds(dt, roster);

        if self.active {
            if self.countdown.tick(dt) {
                warn!("Emergency failed: consoles not held in time");
                self.active = false;
                events.extend(self.release_all(ReleaseReason::Reset));
                events.push(EmergencyEvent::Failed);
            }
        } else if self.cooldown.tick(dt) {
            events.extend(self.start());
        }
        events
    }

    /// Drops every hold when a participant leaves, without waiting for the
    /// next tick.
    pub fn release_player(&mut self, player: PlayerId) -> Vec<EmergencyEvent> {
        let mut events = Vec::new();
        for slot in ConsoleSlot::ALL {
            if self.consoles[slot.index()].holder == Some(player) {
                self.consoles[slot.index()].free();
                events.push(EmergencyEvent::Released {
                    slot,
                    holder: player,
                    reason: ReleaseReason::HolderGone,
                });
            }
        }
        events
    }

    /// Back to inactive with a fresh cooldown and no holds.
    pub fn reset(&mut self) {
        self.active = false;
        self.countdown.disarm();
        self.cooldown.reset(self.timings.cooldown);
        for console in &mut self.consoles {
            console.free();
        }
    }

    pub fn snapshot(&self) -> EmergencySnapshot {
        EmergencySnapshot {
            active: self.active,
            time_remaining: self.time_remaining(),
            holders: [self.consoles[0].holder, self.consoles[1].holder],
        }
    }
}
