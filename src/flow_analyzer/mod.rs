pub mod demand_analysis;
pub mod detector;

// Re-export the items used by the binaries
pub use demand_analysis::{
    analyze_detections, run_and_record_detection_pass, run_detection_pass, DetectionSummary,
    LaneObservation,
};
pub use detector::{Detector, RandomDetector, SidecarDetector};
