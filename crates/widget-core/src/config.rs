use std::time::Duration;

/// Tunables for a [`Runtime`](crate::Runtime).
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeConfig {
    /// Upper bound on update/position passes within one flush. Work that
    /// is still pending afterwards is dropped with a warning.
    pub max_flush_passes: usize,
    /// Upper bound on `do_update` calls within one flush; exceeding it is
    /// reported as an update cycle.
    pub max_update_iterations: usize,
    /// Binds slower than this are logged at `warn`.
    pub slow_bind_threshold: Option<Duration>,
}

impl RuntimeConfig {
    pub fn with_max_flush_passes(mut self, passes: usize) -> Self {
        self.max_flush_passes = passes.max(1);
        self
    }

    pub fn with_max_update_iterations(mut self, iterations: usize) -> Self {
        self.max_update_iterations = iterations.max(1);
        self
    }

    pub fn with_slow_bind_threshold(mut self, threshold: Duration) -> Self {
        self.slow_bind_threshold = Some(threshold);
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_passes: 8,
            max_update_iterations: 100_000,
            slow_bind_threshold: None,
        }
    }
}
