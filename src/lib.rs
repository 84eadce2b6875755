pub mod communication;
pub mod config;
pub mod control_system;
pub mod demand_store;
pub mod errors;
pub mod flow_analyzer;
pub mod global_variables;
pub mod models;
pub mod monitoring;
pub mod shared_data;

pub use config::SignalConfig;
pub use errors::SignalError;
pub use models::LaneId;
