//! Task stations and completion accounting.
//!
//! A station can be completed once by each crewmate. Each crewmate is capped
//! at `min(tasks_per_player, station count)` completions, and the round
//! target is that cap times the number of crewmates at round start. The
//! target is fixed for the round and is not lowered when crewmates die.

use crate::error::{Rejection, RequestResult};
use crate::roster::Roster;
use log::{info, warn};
use shared::{ObjectId, PlayerId, RoundPhase, Vec3};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct TaskStation {
    pub id: ObjectId,
    pub name: String,
    pub position: Vec3,
    completed_by: BTreeSet<PlayerId>,
}

impl TaskStation {
    pub fn new(id: ObjectId, name: impl Into<String>, position: Vec3) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            completed_by: BTreeSet::new(),
        }
    }

    pub fn is_done_by(&self, player: PlayerId) -> bool {
        self.completed_by.contains(&player)
    }

    fn reset(&mut self) {
        self.completed_by.clear();
    }
}

#[derive(Debug, Default)]
pub struct TaskLedger {
    stations: BTreeMap<ObjectId, TaskStation>,
    tasks_per_player: u32,
    per_player: HashMap<PlayerId, u32>,
    total_target: u32,
    completed_total: u32,
}

impl TaskLedger {
    pub fn new(tasks_per_player: u32) -> Self {
        Self {
            tasks_per_player,
            ..Self::default()
        }
    }

    /// Idempotent: registering the same station id twice keeps the first.
    pub fn register_station(&mut self, station: TaskStation) -> bool {
        if self.stations.contains_key(&station.id) {
            return false;
        }
        self.stations.insert(station.id, station);
        true
    }

    pub fn station(&self, id: ObjectId) -> Option<&TaskStation> {
        self.stations.get(&id)
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    /// Individual completion cap: `min(tasks_per_player, station count)`.
    pub fn per_player_cap(&self) -> u32 {
        let stations = u32::try_from(self.stations.len()).unwrap_or(u32::MAX);
        self.tasks_per_player.min(stations)
    }

    /// Clears every count and returns all stations to incomplete.
    pub fn reset_all(&mut self) {
        for station in self.stations.values_mut() {
            station.reset();
        }
        self.per_player.clear();
        self.total_target = 0;
        self.completed_total = 0;
    }

    /// Fixes the round target from the crewmate count at round start.
    pub fn begin_round(&mut self, crewmates: usize) {
        let crewmates = u32::try_from(crewmates).unwrap_or(u32::MAX);
        self.total_target = self.per_player_cap().saturating_mul(crewmates);
        if self.total_target == 0 {
            warn!("Task target is zero; the task win path is unreachable this round");
        } else {
            info!(
                "Task target {} ({} per crewmate)",
                self.total_target,
                self.per_player_cap()
            );
        }
    }

    /// Counts one completion for `player`. Returns the player's new count.
    pub fn record_completion(
        &mut self,
        phase: RoundPhase,
        player: PlayerId,
        roster: &Roster,
    ) -> RequestResult<u32> {
        if phase != RoundPhase::Gameplay {
            return Err(Rejection::WrongPhase(phase));
        }
        if roster.is_impostor(player) {
            return Err(Rejection::ImpostorTask);
        }
        let cap = self.per_player_cap();
        let count = self.per_player.entry(player).or_insert(0);
        if *count >= cap {
            return Err(Rejection::TaskCapReached(player));
        }
        *count += 1;
        self.completed_total += 1;
        Ok(*count)
    }

    /// Completes `station` for `player`: the station must not already be done
    /// by them and the completion must be accepted by `record_completion`.
    pub fn complete_station(
        &mut self,
        phase: RoundPhase,
        station: ObjectId,
        player: PlayerId,
        roster: &Roster,
    ) -> RequestResult<u32> {
        match self.stations.get(&station) {
            None => return Err(Rejection::UnknownObject(station)),
            Some(s) if s.is_done_by(player) => return Err(Rejection::StationAlreadyDone(station)),
            Some(_) => {}
        }

        let count = self.record_completion(phase, player, roster)?;
        if let Some(s) = self.stations.get_mut(&station) {
            s.completed_by.insert(player);
        }
        Ok(count)
    }

    pub fn completed_by(&self, player: PlayerId) -> u32 {
        self.per_player.get(&player).copied().unwrap_or(0)
    }

    pub fn total_target(&self) -> u32 {
        self.total_target
    }

    pub fn completed_total(&self) -> u32 {
        self.completed_total
    }

    /// True when the target is non-zero and every living crewmate has reached
    /// the individual cap.
    pub fn all_living_crewmates_done(&self, roster: &Roster) -> bool {
        if self.total_target == 0 {
            return false;
        }
        let cap = self.per_player_cap();
        let crewmates = roster.living_crewmate_ids();
        !crewmates.is_empty() && crewmates.iter().all(|id| self.completed_by(*id) >= cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with_stations(tasks_per_player: u32, stations: u32) -> TaskLedger {
        let mut ledger = TaskLedger::new(tasks_per_player);
        for id in 0..stations {
            ledger.register_station(TaskStation::new(
                100 + id,
                format!("Station {}", id),
                Vec3::ZERO,
            ));
        }
        ledger
    }

    fn roster(ids: &[PlayerId], impostor: PlayerId) -> Roster {
        let mut roster = Roster::new();
        for id in ids {
            roster.join(*id, format!("Player {}", id), true);
        }
        roster.assign_roles(impostor);
        roster
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut ledger = TaskLedger::new(3);
        assert!(ledger.register_station(TaskStation::new(1, "a", Vec3::ZERO)));
        assert!(!ledger.register_station(TaskStation::new(1, "b", Vec3::ZERO)));
        assert_eq!(ledger.station_count(), 1);
        assert_eq!(ledger.station(1).unwrap().name, "a");
    }

    #[test]
    fn test_cap_uses_station_count() {
        assert_eq!(ledger_with_stations(3, 5).per_player_cap(), 3);
        assert_eq!(ledger_with_stations(3, 2).per_player_cap(), 2);
        assert_eq!(ledger_with_stations(3, 0).per_player_cap(), 0);
    }

    #[test]
    fn test_target_fixed_at_round_start() {
        let mut ledger = ledger_with_stations(2, 4);
        let mut roster = roster(&[1, 2, 3, 4], 4);
        ledger.begin_round(roster.living_crewmates());
        assert_eq!(ledger.total_target(), 6);

        roster.mark_dead(1);
        assert_eq!(ledger.total_target(), 6);
    }

    #[test]
    fn test_completion_rejections() {
        let mut ledger = ledger_with_stations(2, 4);
        let roster = roster(&[1, 2], 2);
        ledger.begin_round(1);

        assert_eq!(
            ledger.record_completion(RoundPhase::Lobby, 1, &roster),
            Err(Rejection::WrongPhase(RoundPhase::Lobby))
        );
        assert_eq!(
            ledger.record_completion(RoundPhase::Gameplay, 2, &roster),
            Err(Rejection::ImpostorTask)
        );
        assert_eq!(ledger.record_completion(RoundPhase::Gameplay, 1, &roster), Ok(1));
        assert_eq!(ledger.record_completion(RoundPhase::Gameplay, 1, &roster), Ok(2));
        assert_eq!(
            ledger.record_completion(RoundPhase::Gameplay, 1, &roster),
            Err(Rejection::TaskCapReached(1))
        );
        assert_eq!(ledger.completed_total(), 2);
    }

    #[test]
    fn test_count_never_exceeds_cap() {
        let mut ledger = ledger_with_stations(3, 2);
        let roster = roster(&[1, 2], 2);
        ledger.begin_round(1);

        for _ in 0..50 {
            let _ = ledger.record_completion(RoundPhase::Gameplay, 1, &roster);
        }
        assert_eq!(ledger.completed_by(1), 2);
        assert_eq!(ledger.completed_total(), 2);
    }

    #[test]
    fn test_station_done_once_per_player() {
        let mut ledger = ledger_with_stations(3, 3);
        let roster = roster(&[1, 2, 3], 3);
        ledger.begin_round(2);

        assert_eq!(ledger.complete_station(RoundPhase::Gameplay, 100, 1, &roster), Ok(1));
        assert_eq!(
            ledger.complete_station(RoundPhase::Gameplay, 100, 1, &roster),
            Err(Rejection::StationAlreadyDone(100))
        );
        // Another crewmate can still do the same station
        assert_eq!(ledger.complete_station(RoundPhase::Gameplay, 100, 2, &roster), Ok(1));
        assert_eq!(
            ledger.complete_station(RoundPhase::Gameplay, 999, 2, &roster),
            Err(Rejection::UnknownObject(999))
        );
        // A rejected completion does not mark the station
        assert!(ledger
            .complete_station(RoundPhase::Gameplay, 101, 3, &roster)
            .is_err());
        assert!(!ledger.station(101).unwrap().is_done_by(3));
    }

    #[test]
    fn test_zero_stations_never_wins() {
        let mut ledger = ledger_with_stations(3, 0);
        let roster = roster(&[1, 2], 2);
        ledger.begin_round(roster.living_crewmates());

        assert_eq!(ledger.total_target(), 0);
        assert!(ledger
            .record_completion(RoundPhase::Gameplay, 1, &roster)
            .is_err());
        assert!(!ledger.all_living_crewmates_done(&roster));
    }

    #[test]
    fn test_all_living_crewmates_done_ignores_dead() {
        let mut ledger = ledger_with_stations(1, 2);
        let mut roster = roster(&[1, 2, 3], 3);
        ledger.begin_round(2);

        ledger.record_completion(RoundPhase::Gameplay, 1, &roster).unwrap();
        assert!(!ledger.all_living_crewmates_done(&roster));

        roster.mark_dead(2);
        assert!(ledger.all_living_crewmates_done(&roster));
    }

    #[test]
    fn test_reset_all() {
        let mut ledger = ledger_with_stations(2, 2);
        let roster = roster(&[1, 2], 2);
        ledger.begin_round(1);
        ledger.complete_station(RoundPhase::Gameplay, 100, 1, &roster).unwrap();

        ledger.reset_all();
        assert_eq!(ledger.completed_by(1), 0);
        assert_eq!(ledger.completed_total(), 0);
        assert_eq!(ledger.total_target(), 0);
        assert!(!ledger.station(100).unwrap().is_done_by(1));
        assert_eq!(ledger.station_count(), 2);
    }
}
