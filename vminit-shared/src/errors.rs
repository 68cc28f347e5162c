//! Error taxonomy for the guest boot sequence.

use thiserror::Error;

/// Result alias used across the boot sequencer.
pub type InitResult<T> = Result<T, InitError>;

/// Errors raised while booting the guest or supervising its workload.
#[derive(Error, Debug)]
pub enum InitError {
    /// Malformed configuration document, command, environment or user spec.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unknown user, group or network interface.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("mount error: {0}")]
    Mount(String),

    /// Directory, file, symlink or ownership operation failed.
    #[error("filesystem error: {0}")]
    Storage(String),

    /// Credential or resource-limit change failed.
    #[error("credential error: {0}")]
    Credentials(String),

    #[error("network error: {0}")]
    Network(String),

    /// The workload could not be found, spawned or waited on.
    #[error("workload error: {0}")]
    Workload(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A boot task failed; `source` carries the underlying cause.
    #[error("{task} failed: {source}")]
    Task {
        task: String,
        #[source]
        source: Box<InitError>,
    },
}

/// Coarse classification used to decide whether a failure stops the boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Lookup,
    KernelOperation,
    Workload,
}

impl InitError {
    /// Wrap an error with the name of the boot task that produced it.
    pub fn in_task(self, task: impl Into<String>) -> Self {
        InitError::Task {
            task: task.into(),
            source: Box::new(self),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            InitError::Config(_) | InitError::Json(_) => ErrorCategory::Configuration,
            InitError::NotFound(_) => ErrorCategory::Lookup,
            InitError::Workload(_) => ErrorCategory::Workload,
            InitError::Task { source, .. } => source.category(),
            InitError::Mount(_)
            | InitError::Storage(_)
            | InitError::Credentials(_)
            | InitError::Network(_)
            | InitError::Internal(_)
            | InitError::Io(_) => ErrorCategory::KernelOperation,
        }
    }

    /// Whether the boot sequence must stop. Workload failures never do:
    /// the guest reboots once the workload is gone either way.
    pub fn is_fatal(&self) -> bool {
        self.category() != ErrorCategory::Workload
    }
}
