use std::time::Duration;

/// How queued requests get processed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExecutionMode {
    /// One long-lived worker thread drains the queue, then sleeps until
    /// new work arrives.
    #[default]
    DedicatedThread,
    /// A rayon pool drains the queue; one work item per wake-up.
    ThreadPool,
    /// Nothing runs until the host calls
    /// [`process_requests`](crate::PathService::process_requests).
    Synchronous,
    /// The host calls [`tick`](crate::PathService::tick) once per frame;
    /// each tick searches for at most
    /// [`frame_budget`](ServiceConfig::frame_budget).
    TimeSliced,
}

impl ExecutionMode {
    /// Whether requests are processed off the caller's thread.
    pub const fn is_async(self) -> bool {
        matches!(self, ExecutionMode::DedicatedThread | ExecutionMode::ThreadPool)
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ServiceConfig {
    pub mode: ExecutionMode,
    /// Time one [`tick`](crate::PathService::tick) may spend searching.
    pub frame_budget: Duration,
    /// Name of the dedicated worker thread.
    pub thread_name: String,
    /// Worker count of the pool; 0 lets rayon decide.
    pub pool_threads: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            frame_budget: Duration::from_millis(2),
            thread_name: "gridroute-worker".to_string(),
            pool_threads: 0,
        }
    }
}

impl ServiceConfig {
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_frame_budget(mut self, budget: Duration) -> Self {
        self.frame_budget = budget;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_pool_threads(mut self, threads: usize) -> Self {
        self.pool_threads = threads;
        self
    }
}
