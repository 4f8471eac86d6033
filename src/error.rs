//! Error types for the playback engine.
//!
//! Every engine operation returns [`PlayerResult`]; nothing in the engine is
//! fatal to the process. Validation failures leave the engine untouched,
//! resolution failures abort a single enqueue and sink failures only cost the
//! item that was playing.

use std::fmt;
use thiserror::Error;

use crate::sources::ResolutionError;

/// Operation rejected because of the current engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    AlreadyConnected,
    AlreadyAsleep,
    NotConnected,
    NotPlaying,
    NotPaused,
    NothingPlaying,
    /// The session was left (or re-joined) while the request was in flight.
    SessionClosed,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Conflict::AlreadyConnected => "the player is already connected",
            Conflict::AlreadyAsleep => "the player is not in a voice channel",
            Conflict::NotConnected => "the player must join a voice channel first",
            Conflict::NotPlaying => "there isn't anything currently playing",
            Conflict::NotPaused => "the player isn't currently paused",
            Conflict::NothingPlaying => "there isn't a current item",
            Conflict::SessionClosed => "the player left before the request finished",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("State conflict: {0}")]
    StateConflict(Conflict),

    #[error("Failed to retrieve data from the given source: {0}")]
    ResolutionFailure(#[from] ResolutionError),

    #[error("There isn't an item at position {position} (queue length {len})")]
    IndexOutOfRange { position: usize, len: usize },

    #[error("The queue is empty")]
    EmptyQueue,

    #[error("The queue is full (max {0} items)")]
    QueueFull(usize),

    #[error("Could not join the voice channel: {0}")]
    JoinError(String),

    #[error("Audio sink error: {0}")]
    SinkRuntimeError(String),

    #[error("The player for this session has shut down")]
    EngineGone,
}

impl From<Conflict> for PlayerError {
    fn from(conflict: Conflict) -> Self {
        PlayerError::StateConflict(conflict)
    }
}

pub type PlayerResult<T> = std::result::Result<T, PlayerError>;
