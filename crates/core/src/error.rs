use std::path::PathBuf;

use thiserror::Error;

/// Failure classes the host dispatches on.
///
/// Everything else (inference engine failures, malformed frame data) stays
/// an opaque `anyhow::Error` and propagates unmodified.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("FILM model not found at {}", .0.display())]
    ModelNotFound(PathBuf),

    /// Raised when the host interrupt flag is observed mid-run.
    #[error("processing interrupted")]
    Cancelled,
}
