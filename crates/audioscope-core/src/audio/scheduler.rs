//! Host frame scheduling
//!
//! The engine never drives itself. It asks a [`FrameScheduler`] for a
//! callback in the next cooperative slot and cancels it when processing
//! halts. [`FrameQueue`] is a single-threaded implementation the host
//! advances one quantum at a time with [`FrameQueue::run_frame`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Identifies one scheduled frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(u64);

/// Callback run in a future frame, receiving its own handle
pub type FrameCallback = Box<dyn FnOnce(FrameHandle)>;

/// Host primitive for cooperative frame scheduling
pub trait FrameScheduler {
    /// Schedule `callback` for the next frame
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;

    /// Cancel a scheduled callback; unknown or already-run handles are ignored
    fn cancel_frame(&self, handle: FrameHandle);
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    pending: VecDeque<(FrameHandle, FrameCallback)>,
}

/// Deterministic frame queue
///
/// Callbacks requested while a frame runs are deferred to the next frame.
/// Clones share the same queue.
#[derive(Clone, Default)]
pub struct FrameQueue {
    state: Rc<RefCell<QueueState>>,
}

impl FrameQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every callback that was pending when the frame began
    ///
    /// Returns the number of callbacks executed. No queue borrow is held
    /// while a callback runs, so callbacks may request or cancel frames.
    pub fn run_frame(&self) -> usize {
        let cutoff = self.state.borrow().next_id;
        let mut executed = 0;
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                match state.pending.front() {
                    Some((handle, _)) if handle.0 < cutoff => state.pending.pop_front(),
                    _ => None,
                }
            };
            match next {
                Some((handle, callback)) => {
                    callback(handle);
                    executed += 1;
                }
                None => break,
            }
        }
        executed
    }

    /// Number of callbacks waiting for a frame
    pub fn pending(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Whether `handle` is still waiting to run
    pub fn is_pending(&self, handle: FrameHandle) -> bool {
        self.state
            .borrow()
            .pending
            .iter()
            .any(|(pending, _)| *pending == handle)
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let mut state = self.state.borrow_mut();
        let handle = FrameHandle(state.next_id);
        state.next_id += 1;
        state.pending.push_back((handle, callback));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.state
            .borrow_mut()
            .pending
            .retain(|(pending, _)| *pending != handle);
    }
}
