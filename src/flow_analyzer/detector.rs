use crate::config::DetectionConfig;
use crate::errors::DetectionError;
use crate::shared_data::{BoundingBox, Detection};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Vehicle/accident detector run over one lane image.
pub trait Detector {
    fn detect(&mut self, image: &Path) -> Result<Vec<Detection>, DetectionError>;
}

/// Reads detections that an external inference process saved next to the image
/// as `<image>.detections.json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SidecarDetector;

impl SidecarDetector {
    pub fn sidecar_path(image: &Path) -> PathBuf {
        let mut name = OsString::from(image.as_os_str());
        name.push(".detections.json");
        PathBuf::from(name)
    }
}

impl Detector for SidecarDetector {
    fn detect(&mut self, image: &Path) -> Result<Vec<Detection>, DetectionError> {
        if !image.exists() {
            return Err(DetectionError::ImageNotFound(image.to_path_buf()));
        }
        let path = Self::sidecar_path(image);
        let contents = fs::read_to_string(&path).map_err(|source| DetectionError::Unreadable {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| DetectionError::Decode { path, source })
    }
}

/// Synthetic detections for dry runs without a camera or model.
#[derive(Debug, Clone)]
pub struct RandomDetector {
    rng: StdRng,
    max_vehicles: u32,
    accident_probability: f64,
    vehicle_class_ids: Vec<u32>,
    accident_class_id: u32,
}

impl RandomDetector {
    pub fn new(seed: Option<u64>, detection: &DetectionConfig) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            max_vehicles: 15,
            accident_probability: 0.1,
            vehicle_class_ids: detection.vehicle_class_ids.clone(),
            accident_class_id: detection.accident_class_id,
        }
    }

    pub fn with_max_vehicles(mut self, max_vehicles: u32) -> Self {
        self.max_vehicles = max_vehicles;
        self
    }

    pub fn with_accident_probability(mut self, probability: f64) -> Self {
        self.accident_probability = probability.clamp(0.0, 1.0);
        self
    }

    fn random_box(&mut self) -> BoundingBox {
        let x1 = self.rng.random_range(0.0..600.0);
        let y1 = self.rng.random_range(0.0..400.0);
        BoundingBox {
            x1,
            y1,
            x2: x1 + self.rng.random_range(20.0..120.0),
            y2: y1 + self.rng.random_range(20.0..80.0),
        }
    }
}

impl Detector for RandomDetector {
    fn detect(&mut self, _image: &Path) -> Result<Vec<Detection>, DetectionError> {
        let mut detections = Vec::new();
        if !self.vehicle_class_ids.is_empty() {
            let vehicles = self.rng.random_range(0..=self.max_vehicles);
            for _ in 0..vehicles {
                let idx = self.rng.random_range(0..self.vehicle_class_ids.len());
                let class_id = self.vehicle_class_ids[idx];
                let confidence = self.rng.random_range(0.3..1.0);
                let bbox = self.random_box();
                detections.push(Detection {
                    class_id,
                    confidence,
                    bbox,
                });
            }
        }
        if self.rng.random_bool(self.accident_probability) {
            let bbox = self.random_box();
            detections.push(Detection {
                class_id: self.accident_class_id,
                confidence: 0.9,
                bbox,
            });
        }
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(class_id: u32, confidence: f32) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: BoundingBox {
                x1: 0.0,
                y1: 0.0,
                x2: 10.0,
                y2: 10.0,
            },
        }
    }

    #[test]
    fn sidecar_path_appends_suffix() {
        assert_eq!(
            SidecarDetector::sidecar_path(Path::new("Images/IMG_3/IMG_3.jpg")),
            PathBuf::from("Images/IMG_3/IMG_3.jpg.detections.json")
        );
    }

    #[test]
    fn sidecar_detector_reads_saved_detections() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let image = dir.path().join("lane.jpg");
        fs::write(&image, b"jpeg").unwrap();
        let saved = vec![detection(2, 0.8), detection(0, 0.95)];
        fs::write(
            SidecarDetector::sidecar_path(&image),
            serde_json::to_string(&saved).unwrap(),
        )
        .unwrap();

        assert_eq!(SidecarDetector.detect(&image).unwrap(), saved);
    }

    #[test]
    fn sidecar_detector_reports_missing_and_corrupt_input() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let missing = dir.path().join("nope.jpg");
        assert!(matches!(
            SidecarDetector.detect(&missing),
            Err(DetectionError::ImageNotFound(_))
        ));

        let image = dir.path().join("lane.jpg");
        fs::write(&image, b"jpeg").unwrap();
        assert!(matches!(
            SidecarDetector.detect(&image),
            Err(DetectionError::Unreadable { .. })
        ));

        fs::write(SidecarDetector::sidecar_path(&image), "not json").unwrap();
        assert!(matches!(
            SidecarDetector.detect(&image),
            Err(DetectionError::Decode { .. })
        ));
    }

    #[test]
    fn random_detector_is_reproducible_and_bounded() {
        let config = DetectionConfig::default();
        let mut a = RandomDetector::new(Some(7), &config).with_max_vehicles(5);
        let mut b = RandomDetector::new(Some(7), &config).with_max_vehicles(5);
        for _ in 0..20 {
            let first = a.detect(Path::new("lane.jpg")).unwrap();
            let second = b.detect(Path::new("lane.jpg")).unwrap();
            assert_eq!(first, second);
            let vehicles = first
                .iter()
                .filter(|d| config.vehicle_class_ids.contains(&d.class_id))
                .count();
            assert!(vehicles <= 5);
        }
    }

    #[test]
    fn certain_accident_is_always_reported() {
        let config = DetectionConfig::default();
        let mut detector = RandomDetector::new(Some(1), &config)
            .with_max_vehicles(0)
            .with_accident_probability(1.0);
        let detections = detector.detect(Path::new("lane.jpg")).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, config.accident_class_id);
    }
}
