//! Testing utilities for widget runtimes.
//!
//! [`Harness`] owns a runtime driven by a [`CountingScheduler`], so tests
//! can observe frame requests and flush exactly when they choose.
//! [`EventLog`] records runtime notifications for later assertions.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use widget_core::{
    CreateOptions, Event, EventKind, FrameScheduler, ListenerId, Node, Runtime, RuntimeConfig,
    Template, Topic, WidgetError,
};

/// Installs `env_logger` for the current test binary. Safe to call from
/// every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Scheduler that only records requests.
#[derive(Debug, Default)]
pub struct CountingScheduler {
    requests: AtomicUsize,
}

impl CountingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames requested since creation.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl FrameScheduler for CountingScheduler {
    fn schedule_frame(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Headless host: a runtime plus manual frame control.
pub struct Harness {
    runtime: Runtime,
    scheduler: Arc<CountingScheduler>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        init_logging();
        let scheduler = Arc::new(CountingScheduler::new());
        let runtime = Runtime::with_config(scheduler.clone(), config);
        Self { runtime, scheduler }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn scheduler(&self) -> Arc<CountingScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn frame_requests(&self) -> usize {
        self.scheduler.requests()
    }

    /// Creates a node and mounts it as a root.
    pub fn mount(
        &self,
        template: impl Into<Template>,
        options: CreateOptions,
    ) -> Result<Node, WidgetError> {
        let node = self.runtime.create(template, options)?;
        self.runtime.mount(&node)?;
        Ok(node)
    }

    /// Flushes unconditionally.
    pub fn flush(&self) -> Result<(), WidgetError> {
        self.runtime.update_all()
    }

    /// Flushes if a frame was requested, the way a host's frame callback
    /// would. Returns whether a flush ran.
    pub fn pump(&self) -> Result<bool, WidgetError> {
        if !self.runtime.needs_frame() {
            return Ok(false);
        }
        self.runtime.update_all()?;
        Ok(true)
    }

    /// Pumps until no frame is requested, at most `max_frames` times.
    pub fn settle(&self, max_frames: usize) -> Result<usize, WidgetError> {
        let mut frames = 0;
        while frames < max_frames && self.pump()? {
            frames += 1;
        }
        Ok(frames)
    }

    pub fn record(&self, topic: Topic) -> EventLog {
        EventLog::attach(&self.runtime, topic)
    }

    pub fn record_all(&self, kind: EventKind) -> EventLog {
        self.record(Topic::global(kind))
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Notifications received on one topic, in arrival order. Stops recording
/// when dropped.
pub struct EventLog {
    runtime: Runtime,
    listener: ListenerId,
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventLog {
    pub fn attach(runtime: &Runtime, topic: Topic) -> Self {
        let events: Rc<RefCell<Vec<Event>>> = Rc::default();
        let sink = Rc::clone(&events);
        let listener = runtime.listen(topic, move |event| {
            sink.borrow_mut().push(event.clone());
        });
        Self {
            runtime: runtime.clone(),
            listener,
            events,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// `(name, value, previous)` of every recorded prop change.
    pub fn prop_changes(&self) -> Vec<(String, widget_core::Value, widget_core::Value)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::PropChanged {
                    name,
                    value,
                    previous,
                    ..
                } => Some((name.clone(), value.clone(), previous.clone())),
                _ => None,
            })
            .collect()
    }

    /// `on` flags of every recorded bind notification.
    pub fn binds(&self) -> Vec<bool> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Bind { on, .. } => Some(*on),
                _ => None,
            })
            .collect()
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        if !self.runtime.unlisten(self.listener) {
            log::debug!("event log listener {} was already removed", self.listener);
        }
    }
}
