//! Fixed-rate tick scheduling for the simulation loop.

/// Default simulation rate in Hz.
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Accumulates real elapsed time and yields discrete fixed-length ticks.
#[derive(Debug, Clone)]
pub struct FixedTickSchedule {
    accumulator_secs: f64,
    tick_duration_secs: f64,
    total_ticks: u64,
}

impl FixedTickSchedule {
    /// Creates a schedule at [`DEFAULT_TICK_RATE`].
    pub fn new() -> Self {
        Self::with_tick_rate(DEFAULT_TICK_RATE)
    }

    /// Creates a schedule with a custom tick rate. A rate of zero is treated as 1 Hz.
    pub fn with_tick_rate(hz: u32) -> Self {
        Self {
            accumulator_secs: 0.0,
            tick_duration_secs: 1.0 / f64::from(hz.max(1)),
            total_ticks: 0,
        }
    }

    /// Accumulates elapsed time and returns the number of ticks to process.
    pub fn accumulate(&mut self, dt_secs: f64) -> u32 {
        self.accumulator_secs += dt_secs.max(0.0);
        let mut ticks = 0u32;
        while self.accumulator_secs >= self.tick_duration_secs {
            self.accumulator_secs -= self.tick_duration_secs;
            self.total_ticks += 1;
            ticks += 1;
        }
        ticks
    }

    /// Total ticks processed since creation.
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn tick_duration_secs(&self) -> f64 {
        self.tick_duration_secs
    }

    /// Simulated time covered by the ticks processed so far.
    pub fn elapsed_secs(&self) -> f64 {
        self.total_ticks as f64 * self.tick_duration_secs
    }
}

impl Default for FixedTickSchedule {
    fn default() -> Self {
        Self::new()
    }
}
