//! Typed reasons for rejected requests.
//!
//! Rejections are never surfaced to other participants. The network layer
//! logs them at debug level and drops the request; the state they guard is
//! left untouched.

use shared::{ConsoleSlot, ObjectId, PlayerId, RoundPhase};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("request not valid during {0:?}")]
    WrongPhase(RoundPhase),
    #[error("player {0} is not connected")]
    UnknownPlayer(PlayerId),
    #[error("player {0} is not alive")]
    NotAlive(PlayerId),
    #[error("player {0} is not the host")]
    NotHost(PlayerId),
    #[error("player {0} is not the impostor")]
    NotImpostor(PlayerId),
    #[error("impostors cannot complete tasks")]
    ImpostorTask,
    #[error("player {0} already reached the task cap")]
    TaskCapReached(PlayerId),
    #[error("station {0} already completed by this player")]
    StationAlreadyDone(ObjectId),
    #[error("object {0} does not exist")]
    UnknownObject(ObjectId),
    #[error("object {object} is {distance:.2} away, limit {limit:.2}")]
    OutOfRange {
        object: ObjectId,
        distance: f32,
        limit: f32,
    },
    #[error("target {0} is not a valid participant")]
    InvalidTarget(PlayerId),
    #[error("voting is closed")]
    VotingClosed,
    #[error("player {0} already voted")]
    DuplicateBallot(PlayerId),
    #[error("no emergency is active")]
    EmergencyInactive,
    #[error("console {0:?} is held by another player")]
    ConsoleOccupied(ConsoleSlot),
    #[error("player {0} already holds the other console")]
    SelfRendezvous(PlayerId),
    #[error("vent is cooling down")]
    VentCooldown,
    #[error("object {0} is already occupied")]
    ObjectOccupied(ObjectId),
    #[error("object {0} cannot be used directly")]
    NotUsable(ObjectId),
    #[error("player is busy at object {0}")]
    Busy(ObjectId),
    #[error("trap is cooling down")]
    TrapCooldown,
    #[error("lights are already sabotaged")]
    AlreadySabotaged,
    #[error("position is not finite")]
    InvalidPosition,
}

pub type RequestResult<T = ()> = Result<T, Rejection>;
