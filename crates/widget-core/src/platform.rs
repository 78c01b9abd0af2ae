//! Host abstraction for frame scheduling.
//!
//! The runtime never flushes on its own. It asks the host for a frame and
//! the host answers by calling [`Runtime::update_all`](crate::Runtime::update_all)
//! from its frame callback.

/// Requests frames from the host platform.
///
/// Implementations must be safe to call from any thread so hosts can wire
/// them to their event-loop wakers.
pub trait FrameScheduler: Send + Sync {
    /// Request that the host run a flush on its next frame.
    fn schedule_frame(&self);
}
