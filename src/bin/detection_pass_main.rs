use clap::{Parser, ValueEnum};
use smart_traffic_signal::flow_analyzer::{
    run_and_record_detection_pass, Detector, RandomDetector, SidecarDetector,
};
use smart_traffic_signal::monitoring::AccidentMonitor;
use smart_traffic_signal::SignalConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DetectorKind {
    /// Detections saved next to each lane image by the inference process
    Sidecar,
    /// Synthetic detections
    Random,
}

#[derive(Parser)]
#[command(name = "detection_pass")]
#[command(about = "Count vehicles per lane and persist the green-time tables", long_about = None)]
struct Cli {
    /// JSON configuration file. Without it the built-in lanes read their frames from ./Images
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "sidecar")]
    detector: DetectorKind,

    /// Seed for the random detector
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    println!("Starting detection pass...");

    let config = match SignalConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut detector: Box<dyn Detector> = match cli.detector {
        DetectorKind::Sidecar => Box::new(SidecarDetector),
        DetectorKind::Random => Box::new(RandomDetector::new(cli.seed, &config.detection)),
    };
    let monitor = AccidentMonitor::new();

    match run_and_record_detection_pass(detector.as_mut(), &config, &monitor) {
        Ok(summary) => {
            for observation in &summary.observations {
                println!(
                    "{}: {} vehicles, green {}s{}",
                    observation.lane,
                    observation.vehicle_count,
                    summary.snapshot.green_times[&observation.lane],
                    if observation.accident { " (accident)" } else { "" }
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Detection error: {}", e);
            ExitCode::FAILURE
        }
    }
}
