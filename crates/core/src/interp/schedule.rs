//! Cooperative scheduling primitives.
//!
//! Evaluations run on a single logical thread and yield at well-defined
//! points: time-slot exhaustion and non-cache-resident resource
//! resolution. Cancellation is a checked token consulted at the top of
//! every loop iteration; it raises a condition that bypasses normal error
//! reporting.

use crate::error::{EvalError, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Wall-clock budget of one execution slot.
const TIME_SLOT_DURATION: Duration = Duration::from_millis(20);
/// Loop iterations between clock reads, bounding check overhead.
const CHECK_TIME_EVERY: u32 = 100;

/// Fires after a fixed wall-clock budget, checked every fixed number of
/// loop iterations.
pub struct TimeSlotManager {
    end_time: Instant,
    checked: u32,
}

impl TimeSlotManager {
    pub fn new() -> Self {
        let mut manager = Self {
            end_time: Instant::now(),
            checked: 0,
        };
        manager.reset();
        manager
    }

    /// True when the current slot's budget is exhausted.
    pub fn check(&mut self) -> bool {
        self.checked += 1;
        if self.checked < CHECK_TIME_EVERY {
            return false;
        }
        self.checked = 0;
        Instant::now() >= self.end_time
    }

    /// Start a fresh slot.
    pub fn reset(&mut self) {
        self.end_time = Instant::now() + TIME_SLOT_DURATION;
        self.checked = 0;
    }
}

impl Default for TimeSlotManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-evaluation task handle: the host's cancellation signal plus the
/// form recursion guard shared by nested descents.
pub struct EvalTask {
    cancelled: AtomicBool,
    form_stack: parking_lot::Mutex<Vec<crate::model::ObjRef>>,
}

impl EvalTask {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
            form_stack: parking_lot::Mutex::new(Vec::new()),
        })
    }

    /// Abandon all further work for this evaluation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Raise the teardown condition when cancelled.
    pub fn ensure_running(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(EvalError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Track a form descent; false means the form is already on the
    /// stack (a reference cycle).
    pub fn enter_form(&self, obj_ref: crate::model::ObjRef) -> bool {
        let mut stack = self.form_stack.lock();
        if stack.contains(&obj_ref) {
            return false;
        }
        stack.push(obj_ref);
        true
    }

    pub fn exit_form(&self, obj_ref: crate::model::ObjRef) {
        let mut stack = self.form_stack.lock();
        if let Some(pos) = stack.iter().rposition(|r| *r == obj_ref) {
            stack.remove(pos);
        }
    }
}

/// Yield control back to the executor once.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_raises_abort() {
        let task = EvalTask::new();
        assert!(task.ensure_running().is_ok());
        task.cancel();
        assert!(matches!(task.ensure_running(), Err(EvalError::Aborted)));
    }

    #[test]
    fn test_form_cycle_detected() {
        let task = EvalTask::new();
        let r = crate::model::ObjRef::new(3, 0);
        assert!(task.enter_form(r));
        assert!(!task.enter_form(r));
        task.exit_form(r);
        assert!(task.enter_form(r));
    }

    #[test]
    fn test_yield_now_completes() {
        futures::executor::block_on(yield_now());
    }
}
