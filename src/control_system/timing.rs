use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How a blocking dwell ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dwell {
    Elapsed,
    Cancelled,
}

/// Holds the calling thread for a phase's dwell time.
pub trait Sleeper {
    fn dwell(&mut self, duration: Duration) -> Dwell;
}

/// Sleeps in short ticks so an operator stop is honoured without waiting out a long green.
#[derive(Debug, Clone)]
pub struct InterruptibleSleeper {
    stop: Arc<AtomicBool>,
    tick: Duration,
}

impl InterruptibleSleeper {
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        Self::with_tick(stop, Duration::from_millis(100))
    }

    pub fn with_tick(stop: Arc<AtomicBool>, tick: Duration) -> Self {
        Self { stop, tick }
    }
}

impl Sleeper for InterruptibleSleeper {
    fn dwell(&mut self, duration: Duration) -> Dwell {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return Dwell::Cancelled;
            }
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Dwell::Elapsed;
                    }
                    self.tick.min(deadline - now)
                }
                // Past what Instant can represent: only a stop ends it.
                None => self.tick,
            };
            thread::sleep(wait);
        }
    }
}
