//! Interactable objects and spawn points.
//!
//! The world hands out object ids in layout order: task stations, consoles,
//! vents, the meeting button, hiding spots, each cooperative door followed
//! by its two buttons, security consoles, then traps. Corpses get fresh ids
//! as they appear.
//!
//! Hiding spots and security consoles hold at most one player. While a player
//! occupies one they may not move or use anything else.

use crate::config::{GameSettings, MapLayout, SpawnPoint};
use crate::error::{Rejection, RequestResult};
use crate::timer::Countdown;
use log::{debug, warn};
use shared::{ConsoleSlot, ObjectId, ObjectKind, ObjectSnapshot, PlayerId, Vec3};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Vent {
    pub linked: Option<ObjectId>,
    cooldown: Countdown,
}

#[derive(Debug, Clone)]
pub struct Trap {
    cooldown: Countdown,
}

#[derive(Debug, Clone)]
pub enum Interactable {
    TaskStation,
    Console(ConsoleSlot),
    Vent(Vent),
    Body { victim: PlayerId },
    MeetingButton,
    HidingSpot { occupant: Option<PlayerId>, exit: Vec3 },
    CoopButton { door: ObjectId, pressed: bool },
    CoopDoor { open: bool },
    SecurityConsole { user: Option<PlayerId> },
    Trap(Trap),
}

impl Interactable {
    fn kind(&self) -> ObjectKind {
        match self {
            Interactable::TaskStation => ObjectKind::TaskStation,
            Interactable::Console(slot) => ObjectKind::Console(*slot),
            Interactable::Vent(_) => ObjectKind::Vent,
            Interactable::Body { victim } => ObjectKind::Body { victim: *victim },
            Interactable::MeetingButton => ObjectKind::MeetingButton,
            Interactable::HidingSpot { occupant, .. } => ObjectKind::HidingSpot {
                occupied: occupant.is_some(),
            },
            Interactable::CoopButton { door, pressed } => ObjectKind::CoopButton {
                door: *door,
                pressed: *pressed,
            },
            Interactable::CoopDoor { open } => ObjectKind::CoopDoor { open: *open },
            Interactable::SecurityConsole { user } => ObjectKind::SecurityConsole {
                in_use: user.is_some(),
            },
            Interactable::Trap(trap) => ObjectKind::Trap {
                ready: !trap.cooldown.is_armed(),
            },
        }
    }
}

/// The single-occupant object a player is currently inside or using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    Hiding(ObjectId),
    Security(ObjectId),
}

impl Occupancy {
    pub fn object(self) -> ObjectId {
        match self {
            Occupancy::Hiding(id) | Occupancy::Security(id) => id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorldObject {
    pub id: ObjectId,
    pub name: String,
    pub position: Vec3,
    pub kind: Interactable,
}

#[derive(Debug)]
pub struct World {
    objects: BTreeMap<ObjectId, WorldObject>,
    spawn_points: Vec<SpawnPoint>,
    vent_cooldown: f32,
    trap_cooldown: f32,
    next_id: ObjectId,
}

impl World {
    pub fn from_layout(layout: &MapLayout, settings: &GameSettings) -> Self {
        let mut spawn_points = layout.spawn_points.clone();
        spawn_points.sort_by(|a, b| a.name.cmp(&b.name));
        if spawn_points.is_empty() {
            warn!("Map has no spawn points; players will not be teleported");
        }

        let mut world = Self {
            objects: BTreeMap::new(),
            spawn_points,
            vent_cooldown: settings.vent_cooldown,
            trap_cooldown: settings.trap_cooldown,
            next_id: 1,
        };

        for station in &layout.task_stations {
            world.insert(&station.name, station.position, Interactable::TaskStation);
        }
        for slot in ConsoleSlot::ALL {
            world.insert(
                &format!("Console_{:?}", slot),
                layout.consoles[slot.index()],
                Interactable::Console(slot),
            );
        }

        let mut vent_ids = BTreeMap::new();
        for vent in &layout.vents {
            let id = world.insert(
                &vent.name,
                vent.position,
                Interactable::Vent(Vent {
                    linked: None,
                    cooldown: Countdown::default(),
                }),
            );
            vent_ids.insert(vent.name.clone(), id);
        }
        for vent in &layout.vents {
            let link = vent_ids.get(&vent.linked).copied();
            if link.is_none() {
                warn!("Vent {} links to unknown vent {}", vent.name, vent.linked);
            }
            if let Some(Interactable::Vent(v)) = vent_ids
                .get(&vent.name)
                .and_then(|id| world.objects.get_mut(id))
                .map(|o| &mut o.kind)
            {
                v.linked = link;
            }
        }

        if let Some(position) = layout.meeting_button {
            world.insert("Meeting_Button", position, Interactable::MeetingButton);
        }

        for spot in &layout.hiding_spots {
            world.insert(
                &spot.name,
                spot.position,
                Interactable::HidingSpot {
                    occupant: None,
                    exit: spot.exit,
                },
            );
        }
        for door in &layout.coop_doors {
            let door_id = world.insert(
                &door.name,
                door.position,
                Interactable::CoopDoor { open: false },
            );
            for (index, position) in door.buttons.iter().enumerate() {
                world.insert(
                    &format!("{}_Button_{}", door.name, index + 1),
                    *position,
                    Interactable::CoopButton {
                        door: door_id,
                        pressed: false,
                    },
                );
            }
        }
        for console in &layout.security_consoles {
            world.insert(
                &console.name,
                console.position,
                Interactable::SecurityConsole { user: None },
            );
        }
        for trap in &layout.traps {
            world.insert(
                &trap.name,
                trap.position,
                Interactable::Trap(Trap {
                    cooldown: Countdown::default(),
                }),
            );
        }
        world
    }

    fn insert(&mut self, name: &str, position: Vec3, kind: Interactable) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(
            id,
            WorldObject {
                id,
                name: name.to_string(),
                position,
                kind,
            },
        );
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&WorldObject> {
        self.objects.get(&id)
    }

    pub fn task_stations(&self) -> impl Iterator<Item = &WorldObject> {
        self.objects
            .values()
            .filter(|o| matches!(o.kind, Interactable::TaskStation))
    }

    pub fn console_id(&self, slot: ConsoleSlot) -> Option<ObjectId> {
        self.objects
            .values()
            .find(|o| matches!(o.kind, Interactable::Console(s) if s == slot))
            .map(|o| o.id)
    }

    /// Looks up `id` and checks that `from` is within `limit` of it.
    pub fn reachable(&self, id: ObjectId, from: Vec3, limit: f32) -> RequestResult<&WorldObject> {
        let object = self.objects.get(&id).ok_or(Rejection::UnknownObject(id))?;
        let distance = from.distance(&object.position);
        if distance > limit {
            return Err(Rejection::OutOfRange {
                object: id,
                distance,
                limit,
            });
        }
        Ok(object)
    }

    /// Spawn position for the `index`-th player, wrapping around the sorted
    /// spawn list.
    pub fn spawn_position(&self, index: usize) -> Option<Vec3> {
        if self.spawn_points.is_empty() {
            return None;
        }
        Some(self.spawn_points[index % self.spawn_points.len()].position)
    }

    pub fn spawn_count(&self) -> usize {
        self.spawn_points.len()
    }

    /// Moves through vent `id` to its linked vent. Both ends start cooling
    /// down. Returns the destination.
    pub fn travel_vent(&mut self, id: ObjectId) -> RequestResult<(ObjectId, Vec3)> {
        let linked = match self.objects.get(&id).map(|o| &o.kind) {
            Some(Interactable::Vent(vent)) => {
                if vent.cooldown.is_armed() {
                    return Err(Rejection::VentCooldown);
                }
                vent.linked.ok_or(Rejection::UnknownObject(id))?
            }
            _ => return Err(Rejection::UnknownObject(id)),
        };
        let destination = self
            .objects
            .get(&linked)
            .map(|o| o.position)
            .ok_or(Rejection::UnknownObject(linked))?;

        for end in [id, linked] {
            if let Some(Interactable::Vent(vent)) = self.objects.get_mut(&end).map(|o| &mut o.kind)
            {
                vent.cooldown.reset(self.vent_cooldown);
            }
        }
        debug!("Vent {} -> {}", id, linked);
        Ok((linked, destination))
    }

    /// Enters or leaves hiding spot `id`. Returns where the player now
    /// stands and whether they are hidden.
    pub fn toggle_hiding(
        &mut self,
        id: ObjectId,
        player: PlayerId,
    ) -> RequestResult<(Vec3, bool)> {
        let object = self.objects.get_mut(&id).ok_or(Rejection::UnknownObject(id))?;
        let position = object.position;
        match &mut object.kind {
            Interactable::HidingSpot { occupant, exit } => match *occupant {
                None => {
                    *occupant = Some(player);
                    debug!("Player {} hid in {}", player, id);
                    Ok((position, true))
                }
                Some(current) if current == player => {
                    *occupant = None;
                    debug!("Player {} left {}", player, id);
                    Ok((*exit, false))
                }
                Some(_) => Err(Rejection::ObjectOccupied(id)),
            },
            _ => Err(Rejection::UnknownObject(id)),
        }
    }

    /// Flips button `id`. The door opens only while all of its buttons are
    /// pressed. Returns the door and its new state if it changed.
    pub fn press_button(&mut self, id: ObjectId) -> RequestResult<Option<(ObjectId, bool)>> {
        let door = match self.objects.get_mut(&id).map(|o| &mut o.kind) {
            Some(Interactable::CoopButton { door, pressed }) => {
                *pressed = !*pressed;
                *door
            }
            _ => return Err(Rejection::UnknownObject(id)),
        };

        let open = self
            .objects
            .values()
            .filter_map(|o| match o.kind {
                Interactable::CoopButton { door: d, pressed } if d == door => Some(pressed),
                _ => None,
            })
            .all(|pressed| pressed);

        match self.objects.get_mut(&door).map(|o| &mut o.kind) {
            Some(Interactable::CoopDoor { open: state }) if *state != open => {
                *state = open;
                debug!("Door {} {}", door, if open { "opened" } else { "closed" });
                Ok(Some((door, open)))
            }
            _ => Ok(None),
        }
    }

    /// Starts or stops using security console `id`. Returns its new user.
    pub fn toggle_security(
        &mut self,
        id: ObjectId,
        player: PlayerId,
    ) -> RequestResult<Option<PlayerId>> {
        match self.objects.get_mut(&id).map(|o| &mut o.kind) {
            Some(Interactable::SecurityConsole { user }) => match *user {
                None => {
                    *user = Some(player);
                    Ok(Some(player))
                }
                Some(current) if current == player => {
                    *user = None;
                    Ok(None)
                }
                Some(_) => Err(Rejection::ObjectOccupied(id)),
            },
            _ => Err(Rejection::UnknownObject(id)),
        }
    }

    /// Springs trap `id` and starts its cooldown. Returns its position.
    pub fn trigger_trap(&mut self, id: ObjectId) -> RequestResult<Vec3> {
        let cooldown = self.trap_cooldown;
        let object = self.objects.get_mut(&id).ok_or(Rejection::UnknownObject(id))?;
        match &mut object.kind {
            Interactable::Trap(trap) => {
                if trap.cooldown.is_armed() {
                    return Err(Rejection::TrapCooldown);
                }
                trap.cooldown.reset(cooldown);
                Ok(object.position)
            }
            _ => Err(Rejection::UnknownObject(id)),
        }
    }

    pub fn occupancy(&self, player: PlayerId) -> Option<Occupancy> {
        self.objects.values().find_map(|o| match o.kind {
            Interactable::HidingSpot {
                occupant: Some(p), ..
            } if p == player => Some(Occupancy::Hiding(o.id)),
            Interactable::SecurityConsole { user: Some(p) } if p == player => {
                Some(Occupancy::Security(o.id))
            }
            _ => None,
        })
    }

    pub fn is_hidden(&self, player: PlayerId) -> bool {
        matches!(self.occupancy(player), Some(Occupancy::Hiding(_)))
    }

    /// Frees whatever `player` occupies. The player stays where they are.
    pub fn vacate(&mut self, player: PlayerId) -> Option<Occupancy> {
        let occupancy = self.occupancy(player)?;
        match self.objects.get_mut(&occupancy.object()).map(|o| &mut o.kind) {
            Some(Interactable::HidingSpot { occupant, .. }) => *occupant = None,
            Some(Interactable::SecurityConsole { user }) => *user = None,
            _ => {}
        }
        Some(occupancy)
    }

    pub fn tick(&mut self, dt: f32) {
        for object in self.objects.values_mut() {
            match &mut object.kind {
                Interactable::Vent(vent) => {
                    vent.cooldown.tick(dt);
                }
                Interactable::Trap(trap) => {
                    trap.cooldown.tick(dt);
                }
                _ => {}
            }
        }
    }

    pub fn spawn_body(&mut self, victim: PlayerId, position: Vec3) -> ObjectId {
        self.insert(
            &format!("Body_{}", victim),
            position,
            Interactable::Body { victim },
        )
    }

    pub fn body_count(&self) -> usize {
        self.objects
            .values()
            .filter(|o| matches!(o.kind, Interactable::Body { .. }))
            .count()
    }

    /// Removes every corpse. Returns how many were cleared.
    pub fn clear_bodies(&mut self) -> usize {
        let before = self.objects.len();
        self.objects
            .retain(|_, o| !matches!(o.kind, Interactable::Body { .. }));
        before - self.objects.len()
    }

    /// Clears corpses, cooldowns, occupants and buttons for a new round.
    pub fn reset(&mut self) {
        self.clear_bodies();
        for object in self.objects.values_mut() {
            match &mut object.kind {
                Interactable::Vent(vent) => vent.cooldown.disarm(),
                Interactable::Trap(trap) => trap.cooldown.disarm(),
                Interactable::HidingSpot { occupant, .. } => *occupant = None,
                Interactable::SecurityConsole { user } => *user = None,
                Interactable::CoopButton { pressed, .. } => *pressed = false,
                Interactable::CoopDoor { open } => *open = false,
                _ => {}
            }
        }
    }

    pub fn snapshot(&self) -> Vec<ObjectSnapshot> {
        self.objects
            .values()
            .map(|o| ObjectSnapshot {
                id: o.id,
                kind: o.kind.kind(),
                name: o.name.clone(),
                position: o.position,
            })
            .collect()
    }
}
