//! Standard frame scheduling for widget runtimes.
//!
//! The runtime itself collapses repeated frame requests, so [`StdScheduler`]
//! only forwards each request to an optional waker, letting an event loop
//! on another thread know that the UI thread wants a frame. [`StdRuntime`]
//! bundles it with a [`widget_core::Runtime`] and runs flushes when frames
//! are due.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use widget_core::{FrameScheduler, Runtime, RuntimeConfig, RuntimeHandle, WidgetError};

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that wakes a host event loop.
#[derive(Default)]
pub struct StdScheduler {
    requests: AtomicU64,
    waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames the runtime has asked for so far.
    pub fn frames_requested(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Registers a waker invoked whenever a frame is requested.
    pub fn set_frame_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.write().unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Some(Arc::new(waker));
    }

    pub fn clear_frame_waker(&self) {
        *self.waker.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("frames_requested", &self.frames_requested())
            .finish()
    }
}

impl FrameScheduler for StdScheduler {
    fn schedule_frame(&self) {
        let count = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        log::trace!("frame #{count} requested");
        // Cloned so the waker runs without holding the lock.
        let waker = self
            .waker
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

/// A runtime driven by a [`StdScheduler`].
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    runtime: Runtime,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let runtime = Runtime::with_config(scheduler.clone(), config);
        Self { scheduler, runtime }
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Whether the runtime is waiting for a frame.
    pub fn needs_frame(&self) -> bool {
        self.runtime.needs_frame()
    }

    pub fn set_frame_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_frame_waker(waker);
    }

    pub fn clear_frame_waker(&self) {
        self.scheduler.clear_frame_waker();
    }

    /// Frame callback for hosts: flushes if a frame was requested.
    ///
    /// Returns whether a flush ran. Flush errors are logged and returned;
    /// the runtime stays usable afterwards.
    pub fn run_frame(&self) -> Result<bool, WidgetError> {
        if !self.needs_frame() {
            return Ok(false);
        }
        let started = Instant::now();
        if let Err(err) = self.runtime.update_all() {
            log::error!("frame failed: {err}");
            return Err(err);
        }
        log::trace!("frame flushed in {:?}", started.elapsed());
        Ok(true)
    }

    /// Runs frames until none is requested or `budget` has elapsed. Returns
    /// the number of frames that ran.
    pub fn run_until_idle(&self, budget: Duration) -> Result<usize, WidgetError> {
        let deadline = Instant::now() + budget;
        let mut frames = 0;
        while Instant::now() < deadline && self.run_frame()? {
            frames += 1;
        }
        Ok(frames)
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}
