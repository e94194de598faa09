//! Typed error enums for the subsystems that need them. Transport-level
//! failures are represented as plain `std::io::Error` and propagated with
//! `anyhow` at the task boundary (§6a); these enums cover the errors a
//! caller actually needs to match on.

use thiserror::Error;

/// A client-caused protocol violation (§7). Each one increments the
/// session's error counter and is reported to the offender with `ERR
/// <reason>`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown command in this state")]
    UnknownCommand,
    #[error("malformed arguments")]
    MalformedArguments,
    #[error("move syntactically ill-formed")]
    MalformedMove,
    #[error("move out of bounds")]
    MoveOutOfBounds,
    #[error("illegal move")]
    IllegalMove,
    #[error("move leaves own king in check")]
    MoveLeavesKingInCheck,
    #[error("not your turn")]
    NotYourTurn,
    #[error("no standing draw offer")]
    NoStandingDrawOffer,
    #[error("room not found or already full")]
    RoomUnavailable,
}

/// Failures that can occur while mutating match state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("match is already finished")]
    AlreadyFinished,
    #[error("black seat is already occupied")]
    BlackAlreadyPresent,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Failures the room registry can raise.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("server room limit reached")]
    RoomLimitReached,
}

/// Failures the player counter can raise.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("server is full")]
    PlayerLimitReached,
}
