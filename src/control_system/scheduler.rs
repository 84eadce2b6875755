use crate::control_system::actuator::SignalActuator;
use crate::control_system::phase_machine::{LanePhaseMachine, PhaseState, PhaseTiming};
use crate::control_system::signal_policy::GreenTimes;
use crate::control_system::timing::{Dwell, Sleeper};
use crate::errors::SignalError;
use crate::models::LaneId;
use crate::monitoring::accident_monitor::AccidentMonitor;
use crate::monitoring::alert_dispatcher::AlertDispatcher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What happened during one pass over the lanes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PassReport {
    pub pass: u64,
    pub activated: Vec<LaneId>,
    pub skipped: Vec<LaneId>,
    /// Lane run by the starvation guard because every lane was skipped.
    pub forced: Option<LaneId>,
    pub alerts_sent: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(PassReport),
    Cancelled,
}

/// Runs the lanes of one intersection in cycle order, one at a time.
pub struct IntersectionScheduler<A, S, D> {
    lanes: Vec<LanePhaseMachine>,
    green_times: GreenTimes,
    timing: PhaseTiming,
    actuator: A,
    sleeper: S,
    alerts: D,
    alert_destination: String,
    accidents: Arc<AccidentMonitor>,
    stop: Arc<AtomicBool>,
    alerted_event: Option<u64>,
    passes: u64,
}

impl<A, S, D> IntersectionScheduler<A, S, D>
where
    A: SignalActuator,
    S: Sleeper,
    D: AlertDispatcher,
{
    /// Fails if any lane lacks a positive green time or the table names a lane not in `lanes`.
    pub fn new(
        lanes: &[LaneId],
        green_times: GreenTimes,
        timing: PhaseTiming,
        actuator: A,
        sleeper: S,
        alerts: D,
        alert_destination: impl Into<String>,
    ) -> Result<Self, SignalError> {
        for &lane in lanes {
            match green_times.get(&lane) {
                None => return Err(SignalError::MissingLane(lane)),
                Some(0) => return Err(SignalError::InvalidGreenTime { lane, seconds: 0 }),
                Some(_) => {}
            }
        }
        if let Some(&unknown) = green_times.keys().find(|lane| !lanes.contains(lane)) {
            return Err(SignalError::UnknownLane(unknown));
        }

        Ok(Self {
            lanes: lanes.iter().copied().map(LanePhaseMachine::new).collect(),
            green_times,
            timing,
            actuator,
            sleeper,
            alerts,
            alert_destination: alert_destination.into(),
            accidents: Arc::new(AccidentMonitor::new()),
            stop: Arc::new(AtomicBool::new(false)),
            alerted_event: None,
            passes: 0,
        })
    }

    /// Shares an accident monitor fed by detection or the report listener.
    pub fn with_accident_monitor(mut self, accidents: Arc<AccidentMonitor>) -> Self {
        self.accidents = accidents;
        self
    }

    /// Shares the operator stop flag.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn accident_monitor(&self) -> &Arc<AccidentMonitor> {
        &self.accidents
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn alerts(&self) -> &D {
        &self.alerts
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn lane_states(&self) -> Vec<(LaneId, PhaseState)> {
        self.lanes.iter().map(|m| (m.lane(), m.state())).collect()
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Cycles until the stop flag is set, then leaves every lane red.
    /// An actuator failure still runs the shutdown before the error is returned.
    pub fn run(&mut self) -> Result<(), SignalError> {
        log::info!(
            "Starting signal cycle over {} lanes",
            self.lanes.len()
        );
        if let Err(e) = self.run_until_stopped() {
            log::error!("Signal cycle aborted: {}", e);
            if let Err(shutdown_err) = self.shutdown() {
                log::error!("Safe shutdown incomplete: {}", shutdown_err);
            }
            return Err(e);
        }
        log::info!("Traffic light control interrupted by operator.");
        self.shutdown()
    }

    fn run_until_stopped(&mut self) -> Result<(), SignalError> {
        self.hold_all_red()?;
        while !self.stop_requested() {
            match self.run_pass()? {
                PassOutcome::Completed(report) => log::debug!("{:?}", report),
                PassOutcome::Cancelled => break,
            }
        }
        Ok(())
    }

    /// Activates every lane not flagged for an accident exactly once, in cycle order.
    pub fn run_pass(&mut self) -> Result<PassOutcome, SignalError> {
        let mut report = PassReport {
            pass: self.passes,
            ..PassReport::default()
        };

        for idx in 0..self.lanes.len() {
            if self.stop_requested() {
                return Ok(PassOutcome::Cancelled);
            }
            report.alerts_sent += self.check_accidents();

            let lane = self.lanes[idx].lane();
            if self.accidents.is_flagged(lane) {
                log::info!("Lane {} skipped due to accident.", lane);
                report.skipped.push(lane);
                continue;
            }
            if self.activate(idx)? == Dwell::Cancelled {
                return Ok(PassOutcome::Cancelled);
            }
            report.activated.push(lane);
        }

        if report.activated.is_empty() {
            if let Some(idx) = self.least_recently_run() {
                let lane = self.lanes[idx].lane();
                log::warn!(
                    "Every lane was skipped this pass; forcing {} to avoid starvation",
                    lane
                );
                if self.activate(idx)? == Dwell::Cancelled {
                    return Ok(PassOutcome::Cancelled);
                }
                report.forced = Some(lane);
            }
        }

        self.passes += 1;
        Ok(PassOutcome::Completed(report))
    }

    /// Writes red to every lane. Safe to call repeatedly.
    pub fn shutdown(&mut self) -> Result<(), SignalError> {
        let mut first_error = None;
        for machine in &mut self.lanes {
            if let Err(e) = machine.hold_red(&mut self.actuator) {
                log::error!("Failed to set {} to red: {}", machine.lane(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => {
                log::info!("All lanes held at red.");
                Ok(())
            }
        }
    }

    fn hold_all_red(&mut self) -> Result<(), SignalError> {
        for machine in &mut self.lanes {
            machine.hold_red(&mut self.actuator)?;
        }
        Ok(())
    }

    fn activate(&mut self, idx: usize) -> Result<Dwell, SignalError> {
        for (i, machine) in self.lanes.iter_mut().enumerate() {
            if i != idx {
                machine.force_red(&mut self.actuator)?;
            }
        }

        let lane = self.lanes[idx].lane();
        let green_secs = *self
            .green_times
            .get(&lane)
            .ok_or(SignalError::MissingLane(lane))?;
        log::info!("Activating {} with {}s of green", lane, green_secs);

        let outcome = self.lanes[idx].drive(
            Duration::from_secs(green_secs),
            &self.timing,
            &mut self.actuator,
            &mut self.sleeper,
        )?;
        if outcome == Dwell::Elapsed {
            self.lanes[idx].mark_run(self.passes);
        }
        Ok(outcome)
    }

    fn least_recently_run(&self) -> Option<usize> {
        self.lanes
            .iter()
            .enumerate()
            .min_by_key(|(i, machine)| (machine.last_run_pass(), *i))
            .map(|(i, _)| i)
    }

    // Sends one alert per accident event. Returns the number of alerts attempted.
    fn check_accidents(&mut self) -> usize {
        let Some(flag) = self.accidents.current() else {
            if self.alerted_event.take().is_some() {
                log::info!("Accident cleared; all lanes back in the cycle.");
            }
            return 0;
        };
        if self.alerted_event == Some(flag.event) {
            return 0;
        }
        self.alerted_event = Some(flag.event);

        let message = format!(
            "An accident has been detected in {}. The lane is being skipped; please take necessary action.",
            flag.lane
        );
        match self.alerts.send_alert(&self.alert_destination, &message) {
            Ok(()) => log::info!("Accident alert sent for {}.", flag.lane),
            Err(e) => log::error!("Failed to send accident alert: {}", e),
        }
        1
    }
}
