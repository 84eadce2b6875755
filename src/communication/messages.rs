use crate::models::LaneId;
use serde::{Deserialize, Serialize};

/// Published on the alert queue whenever a new accident is seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub timestamp: u64,
    pub destination_id: String,
    pub message: String,
}

/// Consumed from the accident report queue; sets or clears the accident flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccidentReport {
    pub lane: LaneId,
    pub detected: bool,
    #[serde(default)]
    pub timestamp: u64,
}
