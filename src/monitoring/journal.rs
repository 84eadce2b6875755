use crate::shared_data::{current_timestamp, DetectionRecord};
use crate::flow_analyzer::demand_analysis::DetectionSummary;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::Path;

// Generic helper to append a record to a CSV file, writing the header on first use.
pub fn log_to_csv<T: Serialize>(path: &Path, record: &T) -> Result<(), csv::Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file_exists = path.exists();
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    wtr.serialize(record)?;
    wtr.flush()?;
    Ok(())
}

// One row per lane of a finished detection pass.
pub fn log_detection_pass(path: &Path, summary: &DetectionSummary) -> Result<(), csv::Error> {
    let ts = current_timestamp();
    for observation in &summary.observations {
        let record = DetectionRecord {
            timestamp: ts,
            lane: observation.lane.to_string(),
            vehicle_count: observation.vehicle_count,
            accident: observation.accident,
            green_time_secs: summary
                .snapshot
                .green_times
                .get(&observation.lane)
                .copied()
                .unwrap_or_default(),
        };
        log_to_csv(path, &record)?;
    }
    Ok(())
}

pub fn read_csv<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, csv::Error> {
    let mut rdr = csv::Reader::from_path(path)?;
    rdr.deserialize().collect()
}
