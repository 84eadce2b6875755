use crate::config::TimingConfig;
use crate::errors::SignalError;
use crate::models::LaneId;
use std::collections::BTreeMap;

/// Vehicle count per lane for one scheduling epoch.
pub type VehicleCounts = BTreeMap<LaneId, i64>;
/// Green duration per lane, in seconds.
pub type GreenTimes = BTreeMap<LaneId, u64>;

/// Maps lane demand to a green duration.
pub trait SignalPolicy {
    /// Green seconds for a lane holding `vehicles` vehicles.
    fn green_time(&self, vehicles: u64) -> u64;

    /// Green time for every lane in `counts`. Every lane must belong to `known_lanes`
    /// and every count must be non-negative.
    fn compute_green_times(
        &self,
        counts: &VehicleCounts,
        known_lanes: &[LaneId],
    ) -> Result<GreenTimes, SignalError> {
        let mut green_times = GreenTimes::new();
        for (&lane, &count) in counts {
            if !known_lanes.contains(&lane) {
                return Err(SignalError::UnknownLane(lane));
            }
            let vehicles =
                u64::try_from(count).map_err(|_| SignalError::InvalidDemand { lane, count })?;
            green_times.insert(lane, self.green_time(vehicles));
        }
        Ok(green_times)
    }
}

/// `GreenTime = BaseGreen + Multiplier * VehicleCount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearDemandPolicy {
    pub base_green_secs: u64,
    pub multiplier_secs: u64,
}

impl LinearDemandPolicy {
    pub fn new(base_green_secs: u64, multiplier_secs: u64) -> Self {
        Self {
            base_green_secs,
            multiplier_secs,
        }
    }

    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self::new(timing.base_green_secs, timing.multiplier_secs)
    }
}

impl SignalPolicy for LinearDemandPolicy {
    fn green_time(&self, vehicles: u64) -> u64 {
        self.base_green_secs
            .saturating_add(self.multiplier_secs.saturating_mul(vehicles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lanes() -> Vec<LaneId> {
        (1..=4).map(LaneId).collect()
    }

    #[test]
    fn green_time_grows_linearly_with_demand() {
        let policy = LinearDemandPolicy::new(10, 2);
        let counts = VehicleCounts::from([(LaneId(1), 3)]);
        let green = policy.compute_green_times(&counts, &lanes()).unwrap();
        assert_eq!(green[&LaneId(1)], 16);
        for c in 0..50u64 {
            assert_eq!(policy.green_time(c), 10 + 2 * c);
        }
    }

    #[test]
    fn empty_lane_gets_base_green() {
        let policy = LinearDemandPolicy::new(10, 2);
        let counts: VehicleCounts = lanes().into_iter().map(|l| (l, 0)).collect();
        let green = policy.compute_green_times(&counts, &lanes()).unwrap();
        assert_eq!(green.len(), 4);
        assert!(green.values().all(|&g| g == 10));
    }

    #[test]
    fn negative_demand_is_rejected() {
        let policy = LinearDemandPolicy::new(10, 2);
        let counts = VehicleCounts::from([(LaneId(1), 2), (LaneId(2), -1)]);
        match policy.compute_green_times(&counts, &lanes()) {
            Err(SignalError::InvalidDemand { lane, count }) => {
                assert_eq!(lane, LaneId(2));
                assert_eq!(count, -1);
            }
            other => panic!("expected InvalidDemand, got {:?}", other),
        }
    }

    #[test]
    fn unknown_lane_is_rejected() {
        let policy = LinearDemandPolicy::new(10, 2);
        let counts = VehicleCounts::from([(LaneId(7), 1)]);
        assert!(matches!(
            policy.compute_green_times(&counts, &lanes()),
            Err(SignalError::UnknownLane(LaneId(7)))
        ));
    }

    #[test]
    fn huge_demand_saturates() {
        let policy = LinearDemandPolicy::new(10, 2);
        assert_eq!(policy.green_time(u64::MAX), u64::MAX);
    }
}
