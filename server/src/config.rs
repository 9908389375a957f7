//! Server configuration.
//!
//! Values come from an optional TOML file and are then overridden by command
//! line flags in `main`. Every field has a default so a partial file works.

use crate::world::World;
use serde::Deserialize;
use shared::{
    EmergencySnapshot, Packet, PlayerId, PlayerSnapshot, RoundSnapshot, Vec3, VoteSummary,
    MAX_NAME_LEN, MAX_PACKET_SIZE,
};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: NetworkSettings,
    pub game: GameSettings,
    pub map: MapLayout,
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.tick_rate == 0 {
            return Err(ConfigError::Invalid {
                field: "server.tick_rate",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.server.snapshot_interval_ticks == 0 {
            return Err(ConfigError::Invalid {
                field: "server.snapshot_interval_ticks",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.server.max_clients == 0 {
            return Err(ConfigError::Invalid {
                field: "server.max_clients",
                reason: "must be at least 1".to_string(),
            });
        }
        self.game.validate()?;

        // Every player costs more than a byte, so this bounds the work below
        let size = if self.server.max_clients > MAX_PACKET_SIZE {
            u64::MAX
        } else {
            self.worst_case_snapshot_size()?
        };
        if size > MAX_PACKET_SIZE as u64 {
            return Err(ConfigError::Invalid {
                field: "server.max_clients",
                reason: format!(
                    "a full snapshot for {} players exceeds the {} byte datagram limit",
                    self.server.max_clients, MAX_PACKET_SIZE
                ),
            });
        }
        Ok(())
    }

    /// Encoded size of the largest snapshot this configuration can produce.
    /// Every slot holds a maximal name, every player has left a corpse, and
    /// every optional field is set.
    pub fn worst_case_snapshot_size(&self) -> Result<u64, ConfigError> {
        let ids: Vec<PlayerId> = (0..self.server.max_clients)
            .map(|i| PlayerId::MAX - i as PlayerId)
            .collect();
        let name: String = std::iter::repeat('\u{10348}').take(MAX_NAME_LEN).collect();

        let mut world = World::from_layout(&self.map, &self.game);
        for id in &ids {
            world.spawn_body(*id, Vec3::ZERO);
        }

        let snapshot = RoundSnapshot {
            tick: u32::MAX,
            host: ids.first().copied(),
            impostor: ids.first().copied(),
            players: ids
                .iter()
                .map(|id| PlayerSnapshot {
                    id: *id,
                    name: name.clone(),
                    alive: true,
                    tasks_completed: u32::MAX,
                    position: Vec3::ZERO,
                    hidden: false,
                })
                .collect(),
            objects: world.snapshot(),
            emergency: EmergencySnapshot {
                active: true,
                time_remaining: 0.0,
                holders: [ids.first().copied(), ids.last().copied()],
            },
            voted: ids.clone(),
            last_vote: Some(VoteSummary {
                ejected: ids.first().copied(),
                tie: false,
            }),
            ..RoundSnapshot::default()
        };

        bincode::serialized_size(&Packet::Snapshot(snapshot)).map_err(|e| ConfigError::Invalid {
            field: "server.max_clients",
            reason: format!("snapshot size could not be computed: {}", e),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub host: String,
    pub port: u16,
    pub tick_rate: u32,
    pub max_clients: usize,
    pub client_timeout_secs: u64,
    pub snapshot_interval_ticks: u32,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            tick_rate: 30,
            max_clients: 15,
            client_timeout_secs: 5,
            snapshot_interval_ticks: 3,
        }
    }
}

/// Round rules and timings. Durations are in seconds, distances in world units.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub lobby_countdown: f32,
    pub meeting_duration: f32,
    pub voting_duration: f32,
    pub vote_closure_grace: f32,
    pub result_display_delay: f32,
    pub tasks_per_player: u32,
    pub emergency_duration: f32,
    pub emergency_cooldown: f32,
    pub console_hold_timeout: f32,
    pub console_release_radius: f32,
    pub interact_range: f32,
    pub kill_range: f32,
    pub range_tolerance: f32,
    pub vent_cooldown: f32,
    pub lights_sabotage_duration: f32,
    pub trap_radius: f32,
    pub trap_cooldown: f32,
    pub min_players: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            lobby_countdown: 5.0,
            meeting_duration: 0.5,
            voting_duration: 30.0,
            vote_closure_grace: 3.0,
            result_display_delay: 5.0,
            tasks_per_player: 3,
            emergency_duration: 30.0,
            emergency_cooldown: 20.0,
            console_hold_timeout: 5.0,
            console_release_radius: 4.0,
            interact_range: 2.5,
            kill_range: 2.0,
            range_tolerance: 1.0,
            vent_cooldown: 1.0,
            lights_sabotage_duration: 10.0,
            trap_radius: 4.0,
            trap_cooldown: 10.0,
            min_players: 1,
        }
    }
}

impl GameSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations: [(&'static str, f32); 16] = [
            ("game.lobby_countdown", self.lobby_countdown),
            ("game.meeting_duration", self.meeting_duration),
            ("game.voting_duration", self.voting_duration),
            ("game.vote_closure_grace", self.vote_closure_grace),
            ("game.result_display_delay", self.result_display_delay),
            ("game.emergency_duration", self.emergency_duration),
            ("game.emergency_cooldown", self.emergency_cooldown),
            ("game.console_hold_timeout", self.console_hold_timeout),
            ("game.console_release_radius", self.console_release_radius),
            ("game.interact_range", self.interact_range),
            ("game.kill_range", self.kill_range),
            ("game.range_tolerance", self.range_tolerance),
            ("game.vent_cooldown", self.vent_cooldown),
            (
                "game.lights_sabotage_duration",
                self.lights_sabotage_duration,
            ),
            ("game.trap_radius", self.trap_radius),
            ("game.trap_cooldown", self.trap_cooldown),
        ];

        for (field, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("expected a non-negative number, got {}", value),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpawnPoint {
    pub name: String,
    pub position: Vec3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationLayout {
    pub name: String,
    pub position: Vec3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VentLayout {
    pub name: String,
    pub position: Vec3,
    pub linked: String,
}

/// A single-occupant hiding place. The occupant leaves at `exit`.
#[derive(Debug, Clone, Deserialize)]
pub struct HidingSpotLayout {
    pub name: String,
    pub position: Vec3,
    pub exit: Vec3,
}

/// A door that is open only while both of its buttons are pressed.
#[derive(Debug, Clone, Deserialize)]
pub struct CoopDoorLayout {
    pub name: String,
    pub position: Vec3,
    pub buttons: [Vec3; 2],
}

/// Any other named object at a fixed position.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectLayout {
    pub name: String,
    pub position: Vec3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapLayout {
    pub spawn_points: Vec<SpawnPoint>,
    pub task_stations: Vec<StationLayout>,
    pub consoles: [Vec3; 2],
    pub vents: Vec<VentLayout>,
    pub meeting_button: Option<Vec3>,
    pub hiding_spots: Vec<HidingSpotLayout>,
    pub coop_doors: Vec<CoopDoorLayout>,
    pub security_consoles: Vec<ObjectLayout>,
    pub traps: Vec<ObjectLayout>,
}

impl Default for MapLayout {
    fn default() -> Self {
        let spawn = |name: &str, x: f32, z: f32| SpawnPoint {
            name: name.to_string(),
            position: Vec3::new(x, 0.0, z),
        };
        let station = |name: &str, x: f32, z: f32| StationLayout {
            name: name.to_string(),
            position: Vec3::new(x, 0.0, z),
        };

        Self {
            spawn_points: vec![
                spawn("Spawn_0", -2.0, 0.0),
                spawn("Spawn_1", 2.0, 0.0),
                spawn("Spawn_2", 0.0, -2.0),
                spawn("Spawn_3", 0.0, 2.0),
                spawn("Spawn_4", -2.0, -2.0),
                spawn("Spawn_5", 2.0, 2.0),
            ],
            task_stations: vec![
                station("Wiring_Electrical", -18.0, 4.0),
                station("Fuel_Engine", -24.0, -6.0),
                station("Scan_Medbay", -8.0, 10.0),
                station("Download_Comms", 12.0, -14.0),
                station("Align_Navigation", 26.0, 0.0),
            ],
            consoles: [Vec3::new(-14.0, 0.0, -12.0), Vec3::new(14.0, 0.0, 12.0)],
            vents: vec![
                VentLayout {
                    name: "Vent_Electrical".to_string(),
                    position: Vec3::new(-16.0, 0.0, 0.0),
                    linked: "Vent_Security".to_string(),
                },
                VentLayout {
                    name: "Vent_Security".to_string(),
                    position: Vec3::new(-20.0, 0.0, 8.0),
                    linked: "Vent_Electrical".to_string(),
                },
            ],
            meeting_button: Some(Vec3::new(0.0, 0.0, 4.0)),
            hiding_spots: vec![HidingSpotLayout {
                name: "Locker_Storage".to_string(),
                position: Vec3::new(6.0, 0.0, -10.0),
                exit: Vec3::new(6.0, 0.0, -8.0),
            }],
            coop_doors: vec![CoopDoorLayout {
                name: "Door_Reactor".to_string(),
                position: Vec3::new(-30.0, 0.0, 0.0),
                buttons: [Vec3::new(-28.0, 0.0, -4.0), Vec3::new(-28.0, 0.0, 4.0)],
            }],
            security_consoles: vec![ObjectLayout {
                name: "Security_Cameras".to_string(),
                position: Vec3::new(-22.0, 0.0, 12.0),
            }],
            traps: vec![ObjectLayout {
                name: "Trap_Cafeteria".to_string(),
                position: Vec3::new(8.0, 0.0, 6.0),
            }],
        }
    }
}
