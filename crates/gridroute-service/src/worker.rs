//! Background loops of the asynchronous execution modes.
//!
//! Panics inside a search are turned into `Failed` results by the engine.
//! Anything that still unwinds out of a loop (a panicking callback) ends
//! asynchronous processing for good.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::ExecutionMode;
use crate::error::ServiceError;
use crate::service::{Pending, Shared};

/// Body of the dedicated worker thread: drain, then sleep on the condvar
/// until more work arrives or the mode is left.
pub(crate) fn run_dedicated(shared: Arc<Shared>) {
    log::debug!("path worker started");
    guarded(&shared, || {
        while let Some(pending) = wait_next(&shared, ExecutionMode::DedicatedThread, true) {
            shared.process(pending);
        }
    });
    log::debug!("path worker stopped");
}

/// One pool work item: drain the queue, then return the thread to rayon.
pub(crate) fn run_pooled(shared: Arc<Shared>) {
    guarded(&shared, || {
        while let Some(pending) = wait_next(&shared, ExecutionMode::ThreadPool, false) {
            shared.process(pending);
        }
    });
}

/// Next request for a worker of `mode`, or `None` once the worker should
/// stop. Clears `worker_active` on the way out.
fn wait_next(shared: &Shared, mode: ExecutionMode, block: bool) -> Option<Pending> {
    let mut st = shared.state.lock();
    loop {
        if st.disposed || st.mode != mode {
            st.worker_active = false;
            return None;
        }
        if let Some(pending) = st.queue.pop() {
            return Some(pending);
        }
        if !block {
            st.worker_active = false;
            return None;
        }
        shared.wake.wait(&mut st);
    }
}

fn guarded(shared: &Shared, body: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(body)) {
        let err = ServiceError::WorkerPanic(panic_message(&*payload));
        shared.fall_back(err.to_string());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
