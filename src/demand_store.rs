// demand_store.rs
//
// Persisted per-lane tables, one `lane_<n>: <integer>` line per lane.

use crate::config::StorageConfig;
use crate::control_system::signal_policy::{GreenTimes, VehicleCounts};
use crate::errors::SignalError;
use crate::models::LaneId;
use std::collections::BTreeMap;
use std::fmt::{Display, Write as _};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Demand and green times for one run. Read once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DemandSnapshot {
    pub counts: VehicleCounts,
    pub green_times: GreenTimes,
}

struct Entry<V> {
    line_number: usize,
    line: String,
    lane: LaneId,
    value: V,
}

impl<V> Entry<V> {
    fn malformed(&self, path: &Path) -> SignalError {
        SignalError::MalformedEntry {
            path: path.to_path_buf(),
            line_number: self.line_number,
            line: self.line.clone(),
        }
    }
}

pub fn format_table<V: Display>(table: &BTreeMap<LaneId, V>) -> String {
    let mut out = String::new();
    for (lane, value) in table {
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{}: {}", lane, value);
    }
    out
}

// Values are parsed as the table's own integer type so anything `format_table` wrote reads back.
fn parse_entries<V: FromStr>(
    path: &Path,
    contents: &str,
) -> Result<Vec<Entry<V>>, SignalError> {
    let mut entries: Vec<Entry<V>> = Vec::new();
    for (idx, raw) in contents.lines().enumerate() {
        let line_number = idx + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let malformed = || SignalError::MalformedEntry {
            path: path.to_path_buf(),
            line_number,
            line: raw.to_string(),
        };
        let (lane, value) = raw.split_once(':').ok_or_else(malformed)?;
        let lane: LaneId = lane.parse().map_err(|_| malformed())?;
        let value: V = value.trim().parse().map_err(|_| malformed())?;
        if entries.iter().any(|e| e.lane == lane) {
            return Err(malformed());
        }
        entries.push(Entry {
            line_number,
            line: raw.to_string(),
            lane,
            value,
        });
    }
    Ok(entries)
}

/// Parses a vehicle count table. Negative counts are rejected as invalid demand.
pub fn parse_vehicle_counts(path: &Path, contents: &str) -> Result<VehicleCounts, SignalError> {
    let mut counts = VehicleCounts::new();
    for entry in parse_entries::<i64>(path, contents)? {
        if entry.value < 0 {
            return Err(SignalError::InvalidDemand {
                lane: entry.lane,
                count: entry.value,
            });
        }
        counts.insert(entry.lane, entry.value);
    }
    Ok(counts)
}

/// Parses a green time table. Every green time must be a positive number of seconds.
pub fn parse_green_times(path: &Path, contents: &str) -> Result<GreenTimes, SignalError> {
    let mut green_times = GreenTimes::new();
    for entry in parse_entries::<u64>(path, contents)? {
        if entry.value == 0 {
            return Err(entry.malformed(path));
        }
        green_times.insert(entry.lane, entry.value);
    }
    Ok(green_times)
}

fn read_file(path: &Path) -> Result<String, SignalError> {
    fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => SignalError::MissingFile(path.to_path_buf()),
        _ => SignalError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), SignalError> {
    let io_err = |source| SignalError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, contents).map_err(io_err)
}

/// Owns the two persisted tables.
#[derive(Debug, Clone)]
pub struct DemandStore {
    counts_path: PathBuf,
    green_times_path: PathBuf,
}

impl DemandStore {
    pub fn new(counts_path: impl Into<PathBuf>, green_times_path: impl Into<PathBuf>) -> Self {
        Self {
            counts_path: counts_path.into(),
            green_times_path: green_times_path.into(),
        }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(storage.vehicle_counts_path(), storage.green_times_path())
    }

    pub fn counts_path(&self) -> &Path {
        &self.counts_path
    }

    pub fn green_times_path(&self) -> &Path {
        &self.green_times_path
    }

    /// Overwrites both tables.
    pub fn persist(&self, snapshot: &DemandSnapshot) -> Result<(), SignalError> {
        write_file(&self.counts_path, &format_table(&snapshot.counts))?;
        log::info!("Vehicle counts saved to {}", self.counts_path.display());
        write_file(&self.green_times_path, &format_table(&snapshot.green_times))?;
        log::info!("Green times saved to {}", self.green_times_path.display());
        Ok(())
    }

    pub fn load_vehicle_counts(&self) -> Result<VehicleCounts, SignalError> {
        parse_vehicle_counts(&self.counts_path, &read_file(&self.counts_path)?)
    }

    pub fn load_green_times(&self) -> Result<GreenTimes, SignalError> {
        parse_green_times(&self.green_times_path, &read_file(&self.green_times_path)?)
    }

    /// Loads both tables. Any missing file or bad line fails the whole load.
    pub fn load(&self) -> Result<DemandSnapshot, SignalError> {
        let snapshot = DemandSnapshot {
            counts: self.load_vehicle_counts()?,
            green_times: self.load_green_times()?,
        };
        log::info!(
            "Loaded demand for {} lanes and green times for {} lanes",
            snapshot.counts.len(),
            snapshot.green_times.len()
        );
        Ok(snapshot)
    }
}
