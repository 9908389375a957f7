use serde::{Deserialize, Serialize};

/// Session-scoped participant identifier assigned by the host on connect.
pub type PlayerId = u32;
/// Identifier of an interactable object in the host's world registry.
pub type ObjectId = u32;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_NAME_LEN: usize = 32;
/// Largest datagram either side sends or expects to receive.
pub const MAX_PACKET_SIZE: usize = 8192;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Crewmate,
    Impostor,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundPhase {
    #[default]
    Lobby,
    Gameplay,
    Meeting,
    Voting,
    Ended,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameResult {
    #[default]
    Unresolved,
    CrewmatesWin,
    ImpostorWins,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BallotChoice {
    Player(PlayerId),
    Skip,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleSlot {
    A,
    B,
}

impl ConsoleSlot {
    pub const ALL: [ConsoleSlot; 2] = [ConsoleSlot::A, ConsoleSlot::B];

    pub fn index(self) -> usize {
        match self {
            ConsoleSlot::A => 0,
            ConsoleSlot::B => 1,
        }
    }

    pub fn other(self) -> ConsoleSlot {
        match self {
            ConsoleSlot::A => ConsoleSlot::B,
            ConsoleSlot::B => ConsoleSlot::A,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client -> server
    Connect {
        client_version: u32,
        name: String,
    },
    Heartbeat,
    Position {
        sequence: u32,
        position: Vec3,
    },
    Interact {
        object_id: ObjectId,
    },
    CastBallot {
        choice: BallotChoice,
    },
    ReportBody,
    Kill {
        target: PlayerId,
    },
    SabotageLights,
    RequestRestart,
    Disconnect,

    // Server -> client
    Connected {
        client_id: PlayerId,
    },
    Snapshot(RoundSnapshot),
    Event(ServerEvent),
    Disconnected {
        reason: String,
    },
}

/// Advisory notifications published by the host. Clients must not depend on
/// receiving every one of these; the snapshot carries the authoritative state.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ServerEvent {
    PhaseChanged {
        from: RoundPhase,
        to: RoundPhase,
    },
    RolesAssigned {
        impostor: PlayerId,
        total_tasks: u32,
    },
    MeetingCalled {
        reporter: PlayerId,
    },
    VotingStarted {
        duration: f32,
    },
    VoteCast {
        voter: PlayerId,
    },
    VotingResult {
        ejected: Option<PlayerId>,
        tie: bool,
    },
    EmergencyStarted {
        duration: f32,
    },
    ConsoleChanged {
        slot: ConsoleSlot,
        holder: Option<PlayerId>,
    },
    EmergencyResolved,
    PlayerKilled {
        victim: PlayerId,
    },
    Teleported {
        player: PlayerId,
        position: Vec3,
    },
    LightsChanged {
        sabotaged: bool,
    },
    TaskCompleted {
        player: PlayerId,
        completed: u32,
        total: u32,
    },
    PlayerHidden {
        player: PlayerId,
        spot: ObjectId,
        hidden: bool,
    },
    DoorChanged {
        door: ObjectId,
        open: bool,
    },
    SecurityChanged {
        console: ObjectId,
        user: Option<PlayerId>,
    },
    TrapTriggered {
        trap: ObjectId,
        victims: Vec<PlayerId>,
    },
    GameOver {
        result: GameResult,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub alive: bool,
    pub tasks_completed: u32,
    pub position: Vec3,
    pub hidden: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    TaskStation,
    Console(ConsoleSlot),
    Vent,
    Body { victim: PlayerId },
    MeetingButton,
    HidingSpot { occupied: bool },
    CoopButton { door: ObjectId, pressed: bool },
    CoopDoor { open: bool },
    SecurityConsole { in_use: bool },
    Trap { ready: bool },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ObjectSnapshot {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub name: String,
    pub position: Vec3,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct EmergencySnapshot {
    pub active: bool,
    pub time_remaining: f32,
    pub holders: [Option<PlayerId>; 2],
}

/// Full replicated view of the round. Every client-side reaction should be
/// computable from a single snapshot.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct RoundSnapshot {
    pub tick: u32,
    pub phase: RoundPhase,
    pub timer: f32,
    pub host: Option<PlayerId>,
    pub impostor: Option<PlayerId>,
    pub players: Vec<PlayerSnapshot>,
    pub objects: Vec<ObjectSnapshot>,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub result: GameResult,
    pub emergency: EmergencySnapshot,
    pub voting_open: bool,
    pub vote_timer: f32,
    pub voted: Vec<PlayerId>,
    pub last_vote: Option<VoteSummary>,
    pub lights_sabotaged: bool,
}

impl RoundSnapshot {
    pub fn player(&self, id: PlayerId) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn living_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    pub fn object(&self, id: ObjectId) -> Option<&ObjectSnapshot> {
        self.objects.iter().find(|o| o.id == id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct VoteSummary {
    pub ejected: Option<PlayerId>,
    pub tie: bool,
}
