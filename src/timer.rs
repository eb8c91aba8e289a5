use std::time::{Duration, Instant};

/// Monotonic stopwatch used for queue-arrival latency and phase timing.
#[derive(Clone, Copy, Debug)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time in seconds at double precision.
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use {super::Timer, std::time::Duration};

    #[test]
    fn elapsed_advances() {
        let timer = Timer::start();
        std::thread::sleep(Duration::from_millis(5));

        assert!(timer.elapsed() >= Duration::from_millis(5));
        assert!(timer.elapsed_secs() > 0.0);
    }

    #[test]
    fn reset_restarts() {
        let mut timer = Timer::start();
        std::thread::sleep(Duration::from_millis(5));
        timer.reset();

        assert!(timer.elapsed() < Duration::from_millis(5));
    }
}
