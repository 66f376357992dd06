use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use gridroute_paths::{
    PathEngine, PathRequest, PathResult, PathStatus, Progress, Rejected, RequestError, SearchKind,
    validate,
};
use parking_lot::{Condvar, Mutex};

use crate::config::{ExecutionMode, ServiceConfig};
use crate::error::ServiceError;
use crate::queue::RequestQueue;
use crate::ticket::{Completion, PathTicket};
use crate::worker;

/// Notifications about the service itself.
#[derive(Clone, Debug, PartialEq)]
pub enum ServiceEvent {
    /// Asynchronous processing could not start or crashed.
    AsyncFailed(String),
    /// The service switched execution mode.
    ModeChanged(ExecutionMode),
}

/// What a [`tick`](PathService::tick) stopped on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing left to do.
    Idle,
    /// The frame budget ran out with work remaining.
    Yielded,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub(crate) struct Pending {
    pub(crate) request: PathRequest,
    pub(crate) completion: Completion,
}

pub(crate) struct State {
    pub(crate) queue: RequestQueue<Pending>,
    pub(crate) mode: ExecutionMode,
    /// A dedicated thread is alive, or a pool work item is draining.
    pub(crate) worker_active: bool,
    pub(crate) disposed: bool,
}

/// The engine and, in time-sliced mode, the completion of the request it
/// is partway through.
struct Slot {
    engine: PathEngine,
    current: Option<Completion>,
}

impl Slot {
    /// Run the time-sliced request in flight, if any, to its end.
    fn finish_current(&mut self) -> Option<(Completion, PathResult)> {
        let completion = self.current.take()?;
        while self.engine.step() == Progress::Running {}
        self.collect(completion)
    }

    fn collect(&mut self, completion: Completion) -> Option<(Completion, PathResult)> {
        match self.engine.finish() {
            Some(result) => Some((completion, result)),
            None => {
                log::warn!("engine finished without a result; dropping request");
                None
            }
        }
    }
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<State>,
    pub(crate) wake: Condvar,
    slot: Mutex<Slot>,
    events: Sender<ServiceEvent>,
}

impl Shared {
    fn next(&self) -> Option<Pending> {
        let mut st = self.state.lock();
        let (pending, priority) = st.queue.pop_with_priority()?;
        log::trace!(
            "dequeued request at priority {priority}, {} left",
            st.queue.len()
        );
        Some(pending)
    }

    /// Run one request to completion on the calling thread and deliver the
    /// result. Completions run outside every lock.
    pub(crate) fn process(&self, pending: Pending) {
        let Pending {
            request,
            completion,
        } = pending;
        if request.is_decayed() {
            log::trace!("request from {:?} decayed in the queue", request.requester);
            completion.complete(PathResult::empty(request, PathStatus::Decayed));
            return;
        }
        let (earlier, result) = {
            let mut slot = self.slot.lock();
            let earlier = slot.finish_current();
            let result = match slot.engine.process_request(request) {
                Ok(result) => result,
                Err(Rejected { error, request }) => PathResult::failed(request, error.to_string()),
            };
            (earlier, result)
        };
        if let Some((c, r)) = earlier {
            c.complete(r);
        }
        completion.complete(result);
    }

    fn finish_in_flight(&self) {
        let done = self.slot.lock().finish_current();
        if let Some((c, r)) = done {
            c.complete(r);
        }
    }

    /// Abandon asynchronous processing for time-sliced processing.
    pub(crate) fn fall_back(&self, reason: String) {
        let changed = {
            let mut st = self.state.lock();
            st.worker_active = false;
            let from = st.mode;
            if from.is_async() {
                st.mode = ExecutionMode::TimeSliced;
            }
            from.is_async()
        };
        self.wake.notify_all();
        log::warn!("async path processing failed: {reason}");
        let _ = self.events.send(ServiceEvent::AsyncFailed(reason));
        if changed {
            log::info!("path service switched to time-sliced processing");
            let _ = self
                .events
                .send(ServiceEvent::ModeChanged(ExecutionMode::TimeSliced));
        }
    }
}

// ---------------------------------------------------------------------------
// PathService
// ---------------------------------------------------------------------------

/// Prioritised front end to a [`PathEngine`].
///
/// Requests are queued with a priority (higher first, FIFO among equals)
/// and processed according to the configured [`ExecutionMode`]. Results
/// come back through a [`PathTicket`] or a callback.
///
/// When a worker thread cannot be started, or crashes, the service emits
/// [`ServiceEvent::AsyncFailed`] and continues in
/// [`ExecutionMode::TimeSliced`]; queued requests are kept.
pub struct PathService {
    shared: Arc<Shared>,
    config: ServiceConfig,
    search: SearchKind,
    events: Receiver<ServiceEvent>,
    pool: Option<rayon::ThreadPool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PathService {
    pub fn new(engine: PathEngine, config: ServiceConfig) -> Self {
        let (tx, events) = crossbeam_channel::unbounded();
        let search = engine.settings().search;
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: RequestQueue::new(),
                mode: config.mode,
                worker_active: false,
                disposed: false,
            }),
            wake: Condvar::new(),
            slot: Mutex::new(Slot {
                engine,
                current: None,
            }),
            events: tx,
        });
        let mut service = Self {
            shared,
            config,
            search,
            events,
            pool: None,
            worker: Mutex::new(None),
        };
        if service.config.mode == ExecutionMode::ThreadPool {
            let name = service.config.thread_name.clone();
            let built = rayon::ThreadPoolBuilder::new()
                .num_threads(service.config.pool_threads)
                .thread_name(move |i| format!("{name}-{i}"))
                .build();
            match built {
                Ok(pool) => service.pool = Some(pool),
                Err(e) => service.shared.fall_back(ServiceError::from(e).to_string()),
            }
        }
        log::info!("path service started in {:?} mode", service.mode());
        service
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The mode currently in effect. It differs from the configured one
    /// after a fall-back.
    pub fn mode(&self) -> ExecutionMode {
        self.shared.state.lock().mode
    }

    /// Service notifications.
    pub fn events(&self) -> &Receiver<ServiceEvent> {
        &self.events
    }

    /// Number of queued requests not yet picked up.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().disposed
    }

    /// Validate and queue `request`. The result is delivered through the
    /// returned ticket.
    pub fn queue_request(&self, request: PathRequest, priority: i32) -> Result<PathTicket, Rejected> {
        let decay = request.decay_flag();
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.enqueue(request, priority, Completion::Ticket(tx))?;
        Ok(PathTicket::new(rx, decay))
    }

    /// Validate and queue `request`; `callback` receives the result on
    /// whichever thread processed it.
    pub fn queue_request_with(
        &self,
        request: PathRequest,
        priority: i32,
        callback: impl FnOnce(PathResult) + Send + 'static,
    ) -> Result<(), Rejected> {
        self.enqueue(request, priority, Completion::Callback(Box::new(callback)))
    }

    fn enqueue(&self, request: PathRequest, priority: i32, completion: Completion) -> Result<(), Rejected> {
        if let Err(error) = validate(&request, self.search) {
            return Err(Rejected { error, request });
        }
        let start = {
            let mut st = self.shared.state.lock();
            if st.disposed {
                return Err(Rejected {
                    error: RequestError::Disposed,
                    request,
                });
            }
            st.queue.push(
                Pending {
                    request,
                    completion,
                },
                priority,
            );
            if st.mode.is_async() && !st.worker_active {
                st.worker_active = true;
                Some(st.mode)
            } else {
                if st.mode == ExecutionMode::DedicatedThread {
                    self.shared.wake.notify_one();
                }
                None
            }
        };
        if let Some(mode) = start {
            self.start_worker(mode);
        }
        Ok(())
    }

    fn start_worker(&self, mode: ExecutionMode) {
        let shared = Arc::clone(&self.shared);
        if mode == ExecutionMode::ThreadPool {
            match &self.pool {
                Some(pool) => pool.spawn(move || worker::run_pooled(shared)),
                None => self.shared.fall_back("worker pool is not available".to_string()),
            }
            return;
        }
        let spawned = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || worker::run_dedicated(shared));
        match spawned {
            // A previous handle belongs to a worker that already left its loop.
            Ok(handle) => *self.worker.lock() = Some(handle),
            Err(e) => self.shared.fall_back(ServiceError::Spawn(e).to_string()),
        }
    }

    /// Process every queued request on the calling thread. Returns how many
    /// were dequeued.
    pub fn process_requests(&self) -> usize {
        self.shared.finish_in_flight();
        let mut n = 0;
        while let Some(pending) = self.shared.next() {
            self.shared.process(pending);
            n += 1;
        }
        n
    }

    /// Spend up to the frame budget on queued requests. A search that does
    /// not fit is resumed by the next tick.
    pub fn tick(&self) -> TickOutcome {
        let deadline = Instant::now() + self.config.frame_budget;
        let mut done = Vec::new();
        let outcome = {
            let mut slot = self.shared.slot.lock();
            loop {
                if slot.current.is_none() {
                    let Some(Pending {
                        request,
                        completion,
                    }) = self.shared.next()
                    else {
                        break TickOutcome::Idle;
                    };
                    if request.is_decayed() {
                        done.push((completion, PathResult::empty(request, PathStatus::Decayed)));
                        continue;
                    }
                    match slot.engine.start(request) {
                        Ok(()) => slot.current = Some(completion),
                        Err(Rejected { error, request }) => {
                            done.push((completion, PathResult::failed(request, error.to_string())));
                            continue;
                        }
                    }
                }
                if slot.engine.step() != Progress::Running {
                    if let Some(completion) = slot.current.take() {
                        done.extend(slot.collect(completion));
                    }
                }
                if Instant::now() >= deadline {
                    break TickOutcome::Yielded;
                }
            }
        };
        for (completion, result) in done {
            completion.complete(result);
        }
        outcome
    }

    /// Stop accepting requests and drop the queued ones; their tickets
    /// disconnect and their callbacks never run. A request already being
    /// searched finishes. Waits for the dedicated worker to exit.
    pub fn dispose(&self) {
        let dropped = {
            let mut st = self.shared.state.lock();
            if st.disposed {
                return;
            }
            st.disposed = true;
            st.queue.drain()
        };
        self.shared.wake.notify_all();
        let count = dropped.len();
        drop(dropped);
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                log::warn!("path worker exited with a panic");
            }
        }
        log::info!("path service disposed, {count} queued requests dropped");
    }
}

impl Drop for PathService {
    fn drop(&mut self) {
        self.dispose();
    }
}
