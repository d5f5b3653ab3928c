use thiserror::Error;

/// Scratch allocation failure. Fatal for the current call; the arena makes a
/// single attempt and never retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("scratch allocation of {requested} elements ({bytes} bytes) failed")]
pub struct AllocError {
    /// Number of elements requested.
    pub requested: usize,
    /// Size of the failed reservation in bytes.
    pub bytes: usize,
}

/// Errors raised while setting up the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The work-group thread pool could not be started.
    #[error("failed to start the work-group thread pool\nCaused by:\n  {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),

    /// A scratch allocation failed.
    #[error(transparent)]
    Alloc(#[from] AllocError),
}
