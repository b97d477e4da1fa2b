use std::time::{Duration, Instant};
use tracing::debug;

/// Wall-clock timer for one relaunch phase, reported at debug level
#[derive(Debug)]
pub struct PhaseTimer {
    phase: &'static str,
    started: Instant,
}

impl PhaseTimer {
    pub fn start(phase: &'static str) -> Self {
        debug!(phase, "Starting phase");
        Self {
            phase,
            started: Instant::now(),
        }
    }

    pub fn phase(&self) -> &'static str {
        self.phase
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        debug!(
            phase = self.phase,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Phase completed"
        );
        elapsed
    }
}
