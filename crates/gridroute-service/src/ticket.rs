//! Delivery of finished results to whoever queued the request.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use gridroute_paths::{DecayFlag, PathResult};

use crate::error::ServiceError;

/// Callback invoked with the finished result, on whichever thread
/// processed the request.
pub type PathCallback = Box<dyn FnOnce(PathResult) + Send>;

/// Where a finished result goes.
pub(crate) enum Completion {
    Ticket(Sender<PathResult>),
    Callback(PathCallback),
}

impl Completion {
    pub(crate) fn complete(self, result: PathResult) {
        match self {
            Completion::Ticket(tx) => {
                if tx.send(result).is_err() {
                    log::trace!("ticket dropped before its result arrived");
                }
            }
            Completion::Callback(f) => f(result),
        }
    }
}

/// Handle to a queued request.
///
/// Dropping the ticket does not cancel the request; use
/// [`decay`](Self::decay) for that.
#[derive(Debug)]
pub struct PathTicket {
    rx: Receiver<PathResult>,
    decay: DecayFlag,
}

impl PathTicket {
    pub(crate) fn new(rx: Receiver<PathResult>, decay: DecayFlag) -> Self {
        Self { rx, decay }
    }

    /// Block until the result arrives.
    pub fn wait(self) -> Result<PathResult, ServiceError> {
        self.rx.recv().map_err(|_| ServiceError::Disconnected)
    }

    /// Block for at most `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<PathResult, ServiceError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => ServiceError::Timeout,
            RecvTimeoutError::Disconnected => ServiceError::Disconnected,
        })
    }

    /// The result if it is already there.
    pub fn try_result(&self) -> Result<Option<PathResult>, ServiceError> {
        match self.rx.try_recv() {
            Ok(r) => Ok(Some(r)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ServiceError::Disconnected),
        }
    }

    /// Mark the request as no longer wanted. A request that has not been
    /// dequeued yet completes as `Decayed` without being searched.
    pub fn decay(&self) {
        self.decay.decay();
    }

    pub fn is_decayed(&self) -> bool {
        self.decay.is_decayed()
    }
}
