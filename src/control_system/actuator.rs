use crate::config::{LaneConfig, LanePins};
use crate::errors::ActuatorError;
use crate::models::{LaneId, LaneOutputs};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Drives the physical signal heads. The scheduler is the only caller.
pub trait SignalActuator {
    fn set_lane_output(&mut self, lane: LaneId, outputs: LaneOutputs)
        -> Result<(), ActuatorError>;
}

impl<T: SignalActuator + ?Sized> SignalActuator for Box<T> {
    fn set_lane_output(
        &mut self,
        lane: LaneId,
        outputs: LaneOutputs,
    ) -> Result<(), ActuatorError> {
        (**self).set_lane_output(lane, outputs)
    }
}

fn ensure_one_hot(lane: LaneId, outputs: LaneOutputs) -> Result<(), ActuatorError> {
    if outputs.is_one_hot() {
        Ok(())
    } else {
        Err(ActuatorError::Rejected {
            lane,
            reason: format!("outputs {:?} are not one-hot", outputs),
        })
    }
}

fn pin_map(lanes: &[LaneConfig]) -> HashMap<LaneId, LanePins> {
    lanes.iter().map(|lane| (lane.id, lane.pins)).collect()
}

/// Dry-run actuator: logs every command instead of touching hardware.
#[derive(Debug, Default)]
pub struct LoggingActuator {
    pins: HashMap<LaneId, LanePins>,
    outputs: HashMap<LaneId, LaneOutputs>,
}

impl LoggingActuator {
    pub fn new(lanes: &[LaneConfig]) -> Self {
        Self {
            pins: pin_map(lanes),
            outputs: HashMap::new(),
        }
    }

    /// Last outputs written for a lane.
    pub fn outputs(&self, lane: LaneId) -> Option<LaneOutputs> {
        self.outputs.get(&lane).copied()
    }
}

impl SignalActuator for LoggingActuator {
    fn set_lane_output(
        &mut self,
        lane: LaneId,
        outputs: LaneOutputs,
    ) -> Result<(), ActuatorError> {
        ensure_one_hot(lane, outputs)?;
        let pins = self
            .pins
            .get(&lane)
            .ok_or(ActuatorError::UnmappedLane(lane))?;
        log::info!(
            "[Actuator] {}: red(pin {})={} yellow(pin {})={} green(pin {})={}",
            lane,
            pins.red,
            u8::from(outputs.red),
            pins.yellow,
            u8::from(outputs.yellow),
            pins.green,
            u8::from(outputs.green)
        );
        self.outputs.insert(lane, outputs);
        Ok(())
    }
}

/// Drives signal heads through the Linux sysfs GPIO interface.
#[derive(Debug)]
pub struct SysfsGpioActuator {
    root: PathBuf,
    pins: HashMap<LaneId, LanePins>,
}

impl SysfsGpioActuator {
    /// Exports every configured pin and sets it as an output.
    pub fn open(root: impl Into<PathBuf>, lanes: &[LaneConfig]) -> Result<Self, ActuatorError> {
        let actuator = Self {
            root: root.into(),
            pins: pin_map(lanes),
        };
        for pins in actuator.pins.values() {
            for pin in [pins.red, pins.yellow, pins.green] {
                actuator.export_output(pin)?;
            }
        }
        log::info!(
            "[Actuator] Configured {} lanes under {}",
            actuator.pins.len(),
            actuator.root.display()
        );
        Ok(actuator)
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    fn export_output(&self, pin: u32) -> Result<(), ActuatorError> {
        let pin_dir = self.pin_dir(pin);
        let setup_err = |source| ActuatorError::PinSetup { pin, source };
        if !pin_dir.exists() {
            fs::write(self.root.join("export"), pin.to_string()).map_err(setup_err)?;
        }
        fs::write(pin_dir.join("direction"), "out").map_err(setup_err)
    }

    fn write_pin(&self, lane: LaneId, pin: u32, high: bool) -> Result<(), ActuatorError> {
        fs::write(self.pin_dir(pin).join("value"), if high { "1" } else { "0" })
            .map_err(|source| ActuatorError::PinWrite { lane, pin, source })
    }
}

impl SignalActuator for SysfsGpioActuator {
    fn set_lane_output(
        &mut self,
        lane: LaneId,
        outputs: LaneOutputs,
    ) -> Result<(), ActuatorError> {
        ensure_one_hot(lane, outputs)?;
        let pins = *self
            .pins
            .get(&lane)
            .ok_or(ActuatorError::UnmappedLane(lane))?;
        let writes = [
            (pins.red, outputs.red),
            (pins.yellow, outputs.yellow),
            (pins.green, outputs.green),
        ];
        // Lows first so two outputs are never high at once.
        for &(pin, high) in writes.iter().filter(|(_, high)| !high) {
            self.write_pin(lane, pin, high)?;
        }
        for &(pin, high) in writes.iter().filter(|(_, high)| *high) {
            self.write_pin(lane, pin, high)?;
        }
        Ok(())
    }
}
