pub mod actuator;
pub mod phase_machine;
pub mod scheduler;
pub mod signal_policy;
pub mod timing;

pub use actuator::{LoggingActuator, SignalActuator, SysfsGpioActuator};
pub use phase_machine::{LanePhaseMachine, PhaseState, PhaseTiming};
pub use scheduler::{IntersectionScheduler, PassOutcome, PassReport};
pub use signal_policy::{GreenTimes, LinearDemandPolicy, SignalPolicy, VehicleCounts};
pub use timing::{Dwell, InterruptibleSleeper, Sleeper};
