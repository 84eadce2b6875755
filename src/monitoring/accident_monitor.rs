use crate::communication::messages::AccidentReport;
use crate::models::LaneId;
use amiquip::{
    Connection, ConsumerMessage, ConsumerOptions, QueueDeclareOptions, Result as AmiquipResult,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The lane currently blocked by an accident. `event` changes every time a new
/// accident is raised, so repeated reports of the same accident can be told apart
/// from a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccidentFlag {
    pub lane: LaneId,
    pub event: u64,
}

#[derive(Debug, Default)]
struct MonitorState {
    flag: Option<AccidentFlag>,
    events: u64,
}

/// Single-writer, single-reader accident flag shared between detection and the scheduler.
#[derive(Debug, Default)]
pub struct AccidentMonitor {
    state: Mutex<MonitorState>,
}

impl AccidentMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flags `lane`. Only one lane can be flagged; a different lane replaces the previous one.
    pub fn report(&self, lane: LaneId) -> AccidentFlag {
        let mut state = self.state();
        if let Some(flag) = state.flag.filter(|flag| flag.lane == lane) {
            return flag;
        }
        if let Some(previous) = state.flag {
            log::warn!(
                "Accident on {} replaces the active accident on {}",
                lane,
                previous.lane
            );
        }
        state.events += 1;
        let flag = AccidentFlag {
            lane,
            event: state.events,
        };
        state.flag = Some(flag);
        log::warn!("Accident flagged on {}", lane);
        flag
    }

    /// Clears whatever lane is flagged and returns it.
    pub fn clear(&self) -> Option<AccidentFlag> {
        let cleared = self.state().flag.take();
        if let Some(flag) = cleared {
            log::info!("Accident on {} cleared", flag.lane);
        }
        cleared
    }

    /// Clears the flag only if it is on `lane`.
    pub fn clear_lane(&self, lane: LaneId) -> bool {
        let mut state = self.state();
        match state.flag {
            Some(flag) if flag.lane == lane => {
                state.flag = None;
                log::info!("Accident on {} cleared", lane);
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<AccidentFlag> {
        self.state().flag
    }

    pub fn is_flagged(&self, lane: LaneId) -> bool {
        self.current().is_some_and(|flag| flag.lane == lane)
    }

    pub fn apply(&self, report: &AccidentReport) {
        if report.detected {
            self.report(report.lane);
        } else {
            self.clear_lane(report.lane);
        }
    }
}

// Consumes accident reports from the queue and applies them to the monitor. Blocks until the
// consumer is cancelled.
pub fn listen_accident_reports(
    monitor: Arc<AccidentMonitor>,
    amqp_url: &str,
    queue_name: &str,
) -> AmiquipResult<()> {
    let mut connection = Connection::insecure_open(amqp_url)?;
    let channel = connection.open_channel(None)?;
    let queue = channel.queue_declare(queue_name, QueueDeclareOptions::default())?;
    let consumer = queue.consume(ConsumerOptions::default())?;
    log::info!("[AccidentMonitor] Waiting for accident reports on '{}'...", queue_name);

    for message in consumer.receiver() {
        match message {
            ConsumerMessage::Delivery(delivery) => {
                match serde_json::from_slice::<AccidentReport>(&delivery.body) {
                    Ok(report) => {
                        log::info!("[AccidentMonitor] Got {:?}", report);
                        monitor.apply(&report);
                    }
                    Err(e) => log::warn!("[AccidentMonitor] Ignoring malformed report: {}", e),
                }
                consumer.ack(delivery)?;
            }
            other => {
                log::info!("[AccidentMonitor] Consumer ended: {:?}", other);
                break;
            }
        }
    }
    connection.close()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear() {
        let monitor = AccidentMonitor::new();
        assert_eq!(monitor.current(), None);
        assert!(!monitor.is_flagged(LaneId(1)));
    }

    #[test]
    fn re_reporting_the_same_lane_keeps_the_event() {
        let monitor = AccidentMonitor::new();
        let first = monitor.report(LaneId(2));
        let again = monitor.report(LaneId(2));
        assert_eq!(first, again);
        assert!(monitor.is_flagged(LaneId(2)));
        assert!(!monitor.is_flagged(LaneId(1)));
    }

    #[test]
    fn a_new_lane_or_a_re_raise_is_a_new_event() {
        let monitor = AccidentMonitor::new();
        let first = monitor.report(LaneId(2));
        let moved = monitor.report(LaneId(3));
        assert_ne!(first.event, moved.event);
        assert!(!monitor.is_flagged(LaneId(2)));

        assert_eq!(monitor.clear(), Some(moved));
        let raised_again = monitor.report(LaneId(3));
        assert_ne!(raised_again.event, moved.event);
    }

    #[test]
    fn clear_lane_ignores_other_lanes() {
        let monitor = AccidentMonitor::new();
        monitor.report(LaneId(1));
        assert!(!monitor.clear_lane(LaneId(4)));
        assert!(monitor.is_flagged(LaneId(1)));
        assert!(monitor.clear_lane(LaneId(1)));
        assert_eq!(monitor.current(), None);
    }

    #[test]
    fn applies_reports() {
        let monitor = AccidentMonitor::new();
        let report: AccidentReport =
            serde_json::from_str(r#"{ "lane": "lane_4", "detected": true }"#).unwrap();
        monitor.apply(&report);
        assert!(monitor.is_flagged(LaneId(4)));
        monitor.apply(&AccidentReport {
            detected: false,
            ..report
        });
        assert_eq!(monitor.current(), None);
    }
}
