use thiserror::Error;

/// Failures of the dispatch layer itself.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service dropped the request (disposed) before completing it.
    #[error("request was dropped before it completed")]
    Disconnected,
    #[error("timed out waiting for a path result")]
    Timeout,
    #[error("failed to spawn the path worker thread")]
    Spawn(#[source] std::io::Error),
    #[error("failed to build the path worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("path worker panicked: {0}")]
    WorkerPanic(String),
}
