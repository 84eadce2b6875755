use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifies one controlled approach of the intersection. Written as `lane_<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LaneId(pub u8);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid lane id {0:?}, expected lane_<n> with n >= 1")]
pub struct ParseLaneIdError(pub String);

impl LaneId {
    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lane_{}", self.0)
    }
}

impl FromStr for LaneId {
    type Err = ParseLaneIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number = s
            .trim()
            .strip_prefix("lane_")
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|&n| n >= 1)
            .ok_or_else(|| ParseLaneIdError(s.to_string()))?;
        Ok(LaneId(number))
    }
}

impl TryFrom<String> for LaneId {
    type Error = ParseLaneIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LaneId> for String {
    fn from(lane: LaneId) -> Self {
        lane.to_string()
    }
}

/// The three signal-head outputs of one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LaneOutputs {
    pub red: bool,
    pub yellow: bool,
    pub green: bool,
}

impl LaneOutputs {
    pub const RED: LaneOutputs = LaneOutputs {
        red: true,
        yellow: false,
        green: false,
    };
    pub const YELLOW: LaneOutputs = LaneOutputs {
        red: false,
        yellow: true,
        green: false,
    };
    pub const GREEN: LaneOutputs = LaneOutputs {
        red: false,
        yellow: false,
        green: true,
    };

    /// Exactly one of the three outputs is high.
    pub fn is_one_hot(&self) -> bool {
        [self.red, self.yellow, self.green]
            .iter()
            .filter(|&&on| on)
            .count()
            == 1
    }
}
