//! Pipeline error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::backend::{ApiError, DeviceClass};
use crate::pipeline::Stage;

/// Step of the dispatch engine that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    /// Host-side check of the iteration space.
    Validate,
    /// Kernel enqueue.
    Enqueue,
    /// Blocking read of the destination buffer.
    Readback,
    /// Queue drain before teardown.
    Finish,
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validate => "validate",
            Self::Enqueue => "enqueue",
            Self::Readback => "readback",
            Self::Finish => "finish",
        })
    }
}

/// Compute pipeline errors.
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("No {class} device available: {reason} ({source})")]
    DeviceUnavailable {
        class: DeviceClass,
        reason: String,
        source: ApiError,
    },

    #[error("Failed to create context: {0}")]
    ContextCreation(#[source] ApiError),

    #[error("Failed to create command queue: {0}")]
    QueueCreation(#[source] ApiError),

    #[error("Failed to allocate {what} buffer of {bytes} bytes: {source}")]
    Allocation {
        what: &'static str,
        bytes: usize,
        source: ApiError,
    },

    #[error("Failed to transfer {what} buffer: {source}")]
    Transfer { what: &'static str, source: ApiError },

    #[error("Kernel source not found: {}: {reason}", path.display())]
    SourceNotFound { path: PathBuf, reason: String },

    #[error("Kernel source too large: {} is {size} bytes, limit {limit}", path.display())]
    SourceTooLarge { path: PathBuf, size: u64, limit: usize },

    #[error("Failed to build kernel '{entry_point}' ({}):\n{log}", ApiError::new(*code))]
    Build {
        entry_point: String,
        log: String,
        code: i32,
    },

    #[error("Failed to bind kernel argument {index} ({name}): {source}")]
    ArgumentBinding {
        index: u32,
        name: &'static str,
        source: ApiError,
    },

    #[error("Dispatch failed during {phase}: {source}")]
    Dispatch { phase: DispatchPhase, source: ApiError },

    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("Pipeline already in state {0}")]
    InvalidState(Stage),
}

/// Result type for pipeline operations.
pub type ComputeResult<T> = Result<T, ComputeError>;

impl ComputeError {
    /// Process exit status for this error. Never zero.
    ///
    /// Errors raised by a compute-API call carry that call's status code
    /// unchanged. Kernel source errors map to `1`, host-side shape and state
    /// errors to `-1`.
    pub fn exit_code(&self) -> i32 {
        let code = match self {
            Self::DeviceUnavailable { source, .. }
            | Self::Allocation { source, .. }
            | Self::Transfer { source, .. }
            | Self::ArgumentBinding { source, .. }
            | Self::Dispatch { source, .. } => source.code,
            Self::ContextCreation(e) | Self::QueueCreation(e) => e.code,
            Self::Build { code, .. } => *code,
            Self::SourceNotFound { .. } | Self::SourceTooLarge { .. } => 1,
            Self::BufferSizeMismatch { .. }
            | Self::InvalidDimensions(..)
            | Self::BackendNotAvailable(_)
            | Self::InvalidState(_) => -1,
        };
        if code == 0 { -1 } else { code }
    }

    /// Pipeline stage whose transition failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::BackendNotAvailable(_) => Stage::Idle,
            Self::DeviceUnavailable { .. } => Stage::Resolved,
            Self::ContextCreation(_) | Self::QueueCreation(_) => Stage::Contexted,
            Self::Allocation { .. } | Self::Transfer { .. } | Self::BufferSizeMismatch { .. } => {
                Stage::Buffered
            }
            Self::SourceNotFound { .. } | Self::SourceTooLarge { .. } | Self::Build { .. } => {
                Stage::Compiled
            }
            Self::ArgumentBinding { .. } | Self::InvalidDimensions(..) => Stage::Dispatched,
            Self::Dispatch { phase, .. } => match phase {
                DispatchPhase::Validate | DispatchPhase::Enqueue => Stage::Dispatched,
                DispatchPhase::Readback => Stage::Retrieved,
                DispatchPhase::Finish => Stage::TornDown,
            },
            Self::InvalidState(stage) => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::status;

    #[test]
    fn test_exit_code_propagates_api_status() {
        let err = ComputeError::Allocation {
            what: "source",
            bytes: 16,
            source: ApiError::new(status::MEM_OBJECT_ALLOCATION_FAILURE),
        };
        assert_eq!(err.exit_code(), -4);
        assert_eq!(err.stage(), Stage::Buffered);

        let err = ComputeError::QueueCreation(ApiError::new(status::INVALID_DEVICE));
        assert_eq!(err.exit_code(), -33);
    }

    #[test]
    fn test_exit_code_never_zero() {
        let err = ComputeError::ContextCreation(ApiError::new(status::SUCCESS));
        assert_eq!(err.exit_code(), -1);

        let err = ComputeError::SourceNotFound {
            path: PathBuf::from("missing.cl"),
            reason: "not found".into(),
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(ComputeError::InvalidDimensions(0, 4).exit_code(), -1);
    }

    #[test]
    fn test_build_error_carries_log() {
        let err = ComputeError::Build {
            entry_point: "gamma_transform".into(),
            log: "line 3: expected ';'".into(),
            code: status::BUILD_PROGRAM_FAILURE,
        };
        let msg = err.to_string();
        assert!(msg.contains("gamma_transform"));
        assert!(msg.contains("CL_BUILD_PROGRAM_FAILURE"));
        assert!(msg.contains("expected ';'"));
        assert_eq!(err.stage(), Stage::Compiled);
    }

    #[test]
    fn test_dispatch_phase_stage() {
        let fault = ApiError::new(status::OUT_OF_RESOURCES);
        let enqueue = ComputeError::Dispatch { phase: DispatchPhase::Enqueue, source: fault };
        let readback = ComputeError::Dispatch { phase: DispatchPhase::Readback, source: fault };
        assert_eq!(enqueue.stage(), Stage::Dispatched);
        assert_eq!(readback.stage(), Stage::Retrieved);
        assert_eq!(readback.exit_code(), -5);
    }
}
