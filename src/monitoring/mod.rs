pub mod accident_monitor;
pub mod alert_dispatcher;
pub mod journal;

pub use accident_monitor::{listen_accident_reports, AccidentFlag, AccidentMonitor};
pub use alert_dispatcher::{
    AlertDispatcher, AmqpAlertDispatcher, JournaledAlerts, LogAlertDispatcher,
};
