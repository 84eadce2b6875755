use crate::models::LaneId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop the controller, either at startup or mid-cycle.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("invalid demand for {lane}: {count} vehicles")]
    InvalidDemand { lane: LaneId, count: i64 },
    #[error("{0} is not a configured lane")]
    UnknownLane(LaneId),
    #[error("no green time available for {0}")]
    MissingLane(LaneId),
    #[error("green time for {lane} must be positive, got {seconds}s")]
    InvalidGreenTime { lane: LaneId, seconds: u64 },
    #[error("persisted file not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("malformed entry at {}:{line_number}: {line:?}", .path.display())]
    MalformedEntry {
        path: PathBuf,
        line_number: usize,
        line: String,
    },
    #[error("actuator failure: {0}")]
    ActuatorFailure(#[from] ActuatorError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Hardware output could not be driven.
#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("failed to write pin {pin} of {lane}: {source}")]
    PinWrite {
        lane: LaneId,
        pin: u32,
        #[source]
        source: io::Error,
    },
    #[error("failed to set up gpio pin {pin}: {source}")]
    PinSetup {
        pin: u32,
        #[source]
        source: io::Error,
    },
    #[error("no pins configured for {0}")]
    UnmappedLane(LaneId),
    #[error("command for {lane} rejected: {reason}")]
    Rejected { lane: LaneId, reason: String },
}

/// Alert delivery failed. Never fatal to the signal cycle.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert transport failed: {0}")]
    Transport(String),
    #[error("failed to encode alert: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<amiquip::Error> for AlertError {
    fn from(e: amiquip::Error) -> Self {
        AlertError::Transport(e.to_string())
    }
}

/// A single lane image could not be analysed.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("image not found: {}", .0.display())]
    ImageNotFound(PathBuf),
    #[error("failed to read detections for {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode detections for {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
