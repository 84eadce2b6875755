use crate::config::TimingConfig;
use crate::control_system::actuator::SignalActuator;
use crate::control_system::timing::{Dwell, Sleeper};
use crate::errors::ActuatorError;
use crate::models::{LaneId, LaneOutputs};
use std::time::Duration;

/// The discrete signal state of one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    Red,
    Yellow,
    Green,
}

impl PhaseState {
    pub fn outputs(self) -> LaneOutputs {
        match self {
            PhaseState::Red => LaneOutputs::RED,
            PhaseState::Yellow => LaneOutputs::YELLOW,
            PhaseState::Green => LaneOutputs::GREEN,
        }
    }
}

/// Fixed dwells of the all-stop buffer and the yellow phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTiming {
    pub red_dwell: Duration,
    pub yellow_dwell: Duration,
}

impl PhaseTiming {
    pub fn from_config(timing: &TimingConfig) -> Self {
        Self {
            red_dwell: timing.red_dwell(),
            yellow_dwell: timing.yellow_dwell(),
        }
    }
}

/// Red -> Yellow -> Green cycle of a single lane.
#[derive(Debug, Clone)]
pub struct LanePhaseMachine {
    lane: LaneId,
    state: PhaseState,
    transitions: u64,
    last_run_pass: Option<u64>,
}

impl LanePhaseMachine {
    pub fn new(lane: LaneId) -> Self {
        Self {
            lane,
            state: PhaseState::Red,
            transitions: 0,
            last_run_pass: None,
        }
    }

    pub fn lane(&self) -> LaneId {
        self.lane
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    /// Number of actuator commands accepted for this lane.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Pass number of the last completed activation.
    pub fn last_run_pass(&self) -> Option<u64> {
        self.last_run_pass
    }

    pub(crate) fn mark_run(&mut self, pass: u64) {
        self.last_run_pass = Some(pass);
    }

    /// Runs the lane through red, yellow and green, blocking for each dwell.
    /// The lane stays green when this returns; it goes back to red when another lane is selected.
    pub fn drive<A, S>(
        &mut self,
        green_for: Duration,
        timing: &PhaseTiming,
        actuator: &mut A,
        sleeper: &mut S,
    ) -> Result<Dwell, ActuatorError>
    where
        A: SignalActuator + ?Sized,
        S: Sleeper + ?Sized,
    {
        let steps = [
            (PhaseState::Red, timing.red_dwell),
            (PhaseState::Yellow, timing.yellow_dwell),
            (PhaseState::Green, green_for),
        ];
        for (state, dwell) in steps {
            self.enter(state, actuator)?;
            if sleeper.dwell(dwell) == Dwell::Cancelled {
                return Ok(Dwell::Cancelled);
            }
        }
        Ok(Dwell::Elapsed)
    }

    /// Deactivates the lane. No command is issued if it is already red.
    pub fn force_red<A>(&mut self, actuator: &mut A) -> Result<(), ActuatorError>
    where
        A: SignalActuator + ?Sized,
    {
        if self.state == PhaseState::Red {
            return Ok(());
        }
        self.enter(PhaseState::Red, actuator)
    }

    /// Writes red regardless of the believed state.
    pub fn hold_red<A>(&mut self, actuator: &mut A) -> Result<(), ActuatorError>
    where
        A: SignalActuator + ?Sized,
    {
        self.enter(PhaseState::Red, actuator)
    }

    fn enter<A>(&mut self, state: PhaseState, actuator: &mut A) -> Result<(), ActuatorError>
    where
        A: SignalActuator + ?Sized,
    {
        actuator.set_lane_output(self.lane, state.outputs())?;
        log::debug!("{}: {:?} -> {:?}", self.lane, self.state, state);
        self.state = state;
        self.transitions += 1;
        Ok(())
    }
}
