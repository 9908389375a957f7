//! Connected participants, their liveness and their roles.
//!
//! The roster is the leaf of the round core: every other component asks it
//! who is connected, who is alive and who the impostor is.

use log::info;
use shared::{PlayerId, Role, Vec3};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Participant {
    pub id: PlayerId,
    pub name: String,
    pub alive: bool,
    pub role: Role,
    pub position: Vec3,
}

impl Participant {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            alive: true,
            role: Role::Crewmate,
            position: Vec3::ZERO,
        }
    }
}

/// Participants keyed by id. Ids are handed out in join order, so iteration
/// order is also join order.
#[derive(Debug, Default)]
pub struct Roster {
    participants: BTreeMap<PlayerId, Participant>,
    // Survives the impostor disconnecting: the identity slot is only cleared
    // by a round reset.
    impostor: Option<PlayerId>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a participant. Returns false if the id is already present.
    pub fn join(&mut self, id: PlayerId, name: String, alive: bool) -> bool {
        if self.participants.contains_key(&id) {
            return false;
        }
        let mut participant = Participant::new(id, name);
        participant.alive = alive;
        info!(
            "Participant {} ({}) joined{}",
            id,
            participant.name,
            if alive { "" } else { " as spectator" }
        );
        self.participants.insert(id, participant);
        true
    }

    pub fn leave(&mut self, id: PlayerId) -> Option<Participant> {
        let removed = self.participants.remove(&id);
        if let Some(participant) = &removed {
            info!("Participant {} ({}) left", id, participant.name);
        }
        removed
    }

    pub fn get(&self, id: PlayerId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn is_connected(&self, id: PlayerId) -> bool {
        self.participants.contains_key(&id)
    }

    /// Connected and alive.
    pub fn is_alive(&self, id: PlayerId) -> bool {
        self.participants.get(&id).is_some_and(|p| p.alive)
    }

    pub fn is_impostor(&self, id: PlayerId) -> bool {
        self.impostor == Some(id)
    }

    pub fn impostor(&self) -> Option<PlayerId> {
        self.impostor
    }

    /// The earliest-joined participant still connected.
    pub fn host(&self) -> Option<PlayerId> {
        self.participants.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.participants.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn living_ids(&self) -> Vec<PlayerId> {
        self.participants
            .values()
            .filter(|p| p.alive)
            .map(|p| p.id)
            .collect()
    }

    pub fn living_count(&self) -> usize {
        self.participants.values().filter(|p| p.alive).count()
    }

    /// Living, connected participants that are not the impostor.
    pub fn living_crewmate_ids(&self) -> Vec<PlayerId> {
        self.participants
            .values()
            .filter(|p| p.alive && Some(p.id) != self.impostor)
            .map(|p| p.id)
            .collect()
    }

    pub fn living_crewmates(&self) -> usize {
        self.living_crewmate_ids().len()
    }

    pub fn assign_roles(&mut self, impostor: PlayerId) {
        self.impostor = Some(impostor);
        for participant in self.participants.values_mut() {
            participant.role = if participant.id == impostor {
                Role::Impostor
            } else {
                Role::Crewmate
            };
        }
    }

    pub fn clear_roles(&mut self) {
        self.impostor = None;
        for participant in self.participants.values_mut() {
            participant.role = Role::Crewmate;
        }
    }

    /// Marks a participant dead. Returns true only if they were alive.
    pub fn mark_dead(&mut self, id: PlayerId) -> bool {
        match self.participants.get_mut(&id) {
            Some(participant) if participant.alive => {
                participant.alive = false;
                true
            }
            _ => false,
        }
    }

    pub fn revive_all(&mut self) {
        for participant in self.participants.values_mut() {
            participant.alive = true;
        }
    }

    pub fn set_position(&mut self, id: PlayerId, position: Vec3) -> bool {
        match self.participants.get_mut(&id) {
            Some(participant) => {
                participant.position = position;
                true
            }
            None => false,
        }
    }

    pub fn position(&self, id: PlayerId) -> Option<Vec3> {
        self.participants.get(&id).map(|p| p.position)
    }
}
