//! Cancellable tick bookkeeping for the processing loop
//!
//! [`ProcessingLoop`] holds at most one pending frame handle. Pausing or
//! stopping cancels that handle in the host scheduler, and a tick whose
//! handle no longer matches the pending one is treated as stale and skipped,
//! so a cancelled tick never runs its body.

use super::scheduler::{FrameCallback, FrameHandle, FrameScheduler};
use std::rc::Rc;

/// Loop controller owned by the engine
pub struct ProcessingLoop {
    scheduler: Rc<dyn FrameScheduler>,
    /// Handle of the next scheduled tick
    pending: Option<FrameHandle>,
    /// True while a tick body (including callbacks) runs
    in_tick: bool,
    /// Ticks executed since creation
    ticks: u64,
}

impl ProcessingLoop {
    /// Create an idle loop on `scheduler`
    pub fn new(scheduler: Rc<dyn FrameScheduler>) -> Self {
        Self {
            scheduler,
            pending: None,
            in_tick: false,
            ticks: 0,
        }
    }

    /// Schedule the next tick unless one is already pending
    ///
    /// `make` builds the tick callback only when a new frame is requested.
    /// Returns the handle of the newly requested frame.
    pub fn schedule_with(&mut self, make: impl FnOnce() -> FrameCallback) -> Option<FrameHandle> {
        if self.pending.is_some() {
            return None;
        }
        let handle = self.scheduler.request_frame(make());
        self.pending = Some(handle);
        Some(handle)
    }

    /// Cancel the pending tick, if any
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                self.scheduler.cancel_frame(handle);
                true
            }
            None => false,
        }
    }

    /// Claim the tick identified by `handle`
    ///
    /// Returns `false` for stale handles (cancelled or superseded ticks).
    pub fn begin_tick(&mut self, handle: FrameHandle) -> bool {
        if self.pending != Some(handle) {
            return false;
        }
        self.pending = None;
        self.in_tick = true;
        self.ticks += 1;
        true
    }

    /// Mark the current tick as finished
    pub fn end_tick(&mut self) {
        self.in_tick = false;
    }

    /// Whether a tick is waiting in the scheduler
    pub fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether a tick body is currently running
    pub fn in_tick(&self) -> bool {
        self.in_tick
    }

    /// Ticks executed so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
