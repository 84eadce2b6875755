#![allow(dead_code)]

use smart_traffic_signal::control_system::{
    Dwell, GreenTimes, IntersectionScheduler, PhaseTiming, SignalActuator, Sleeper,
};
use smart_traffic_signal::errors::{ActuatorError, AlertError};
use smart_traffic_signal::models::{LaneId, LaneOutputs};
use smart_traffic_signal::monitoring::AlertDispatcher;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Records every command and asserts the one-hot and single-active-lane invariants as it goes.
#[derive(Debug, Default)]
pub struct RecordingActuator {
    pub commands: Vec<(LaneId, LaneOutputs)>,
    pub current: BTreeMap<LaneId, LaneOutputs>,
    pub fail_on: Option<(LaneId, LaneOutputs)>,
}

impl RecordingActuator {
    pub fn failing_on(lane: LaneId, outputs: LaneOutputs) -> Self {
        Self {
            fail_on: Some((lane, outputs)),
            ..Self::default()
        }
    }

    pub fn commands_for(&self, lane: LaneId) -> Vec<LaneOutputs> {
        self.commands
            .iter()
            .filter(|(l, _)| *l == lane)
            .map(|(_, outputs)| *outputs)
            .collect()
    }

    pub fn all_red(&self, lanes: &[LaneId]) -> bool {
        lanes
            .iter()
            .all(|lane| self.current.get(lane) == Some(&LaneOutputs::RED))
    }
}

impl SignalActuator for RecordingActuator {
    fn set_lane_output(
        &mut self,
        lane: LaneId,
        outputs: LaneOutputs,
    ) -> Result<(), ActuatorError> {
        if self.fail_on == Some((lane, outputs)) {
            return Err(ActuatorError::Rejected {
                lane,
                reason: "relay fault".into(),
            });
        }
        assert!(outputs.is_one_hot(), "{lane} got {outputs:?}");
        self.current.insert(lane, outputs);
        let active = self.current.values().filter(|o| !o.red).count();
        assert!(active <= 1, "more than one lane outside red: {:?}", self.current);
        self.commands.push((lane, outputs));
        Ok(())
    }
}

type DwellHook = Box<dyn FnMut(usize)>;

/// Returns immediately, remembering each requested dwell.
#[derive(Default)]
pub struct RecordingSleeper {
    pub waits: Vec<Duration>,
    stop_after: Option<(usize, Arc<AtomicBool>)>,
    hook: Option<DwellHook>,
}

impl RecordingSleeper {
    /// Sets `stop` and reports a cancelled dwell on the `n`th dwell.
    pub fn stopping_after(n: usize, stop: Arc<AtomicBool>) -> Self {
        Self {
            stop_after: Some((n, stop)),
            ..Self::default()
        }
    }

    /// Calls `hook` with the 1-based dwell number before each dwell returns.
    pub fn with_hook(hook: impl FnMut(usize) + 'static) -> Self {
        Self {
            hook: Some(Box::new(hook)),
            ..Self::default()
        }
    }
}

impl Sleeper for RecordingSleeper {
    fn dwell(&mut self, duration: Duration) -> Dwell {
        self.waits.push(duration);
        let n = self.waits.len();
        if let Some(hook) = self.hook.as_mut() {
            hook(n);
        }
        match &self.stop_after {
            Some((limit, stop)) if n >= *limit => {
                stop.store(true, Ordering::SeqCst);
                Dwell::Cancelled
            }
            _ => Dwell::Elapsed,
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingAlerts {
    pub sent: Vec<(String, String)>,
    pub fail: bool,
}

impl RecordingAlerts {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl AlertDispatcher for RecordingAlerts {
    fn send_alert(&mut self, destination_id: &str, message: &str) -> Result<(), AlertError> {
        self.sent
            .push((destination_id.to_string(), message.to_string()));
        if self.fail {
            Err(AlertError::Transport("chat unreachable".into()))
        } else {
            Ok(())
        }
    }
}

pub type TestScheduler<A = RecordingActuator, S = RecordingSleeper> =
    IntersectionScheduler<A, S, RecordingAlerts>;

pub fn lanes(n: u8) -> Vec<LaneId> {
    (1..=n).map(LaneId).collect()
}

/// lane_1 -> 12s, lane_2 -> 14s, ...
pub fn green_times(lanes: &[LaneId]) -> GreenTimes {
    lanes
        .iter()
        .map(|&lane| (lane, 10 + 2 * u64::from(lane.number())))
        .collect()
}

pub fn timing() -> PhaseTiming {
    PhaseTiming {
        red_dwell: Duration::from_secs(4),
        yellow_dwell: Duration::from_secs(5),
    }
}

pub fn scheduler<A: SignalActuator, S: Sleeper>(
    lanes: &[LaneId],
    actuator: A,
    sleeper: S,
    alerts: RecordingAlerts,
) -> TestScheduler<A, S> {
    IntersectionScheduler::new(
        lanes,
        green_times(lanes),
        timing(),
        actuator,
        sleeper,
        alerts,
        "ops-chat",
    )
    .expect("valid scheduler")
}
