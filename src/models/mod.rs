pub mod lane;

pub use lane::{LaneId, LaneOutputs, ParseLaneIdError};
