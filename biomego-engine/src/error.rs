//! Error types for container engines

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures reported while realizing a container description
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine binary is missing or not working
    #[error("Container engine unavailable: {0}")]
    Unavailable(String),

    /// The container could not be created (image pull, bad reference, ...)
    #[error("Failed to start container from {image}: {message}")]
    ContainerStart {
        /// Image reference that was requested
        image: String,
        /// Message reported by the engine
        message: String,
    },

    /// A command ran and exited non-zero
    #[error("Command `{command}` exited with code {exit_code}: {}", .stderr.trim())]
    ExecFailed {
        /// The command line that was executed
        command: String,
        /// Process exit code, -1 when killed by a signal
        exit_code: i32,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },

    /// A command succeeded but its stdout is not UTF-8
    #[error("Command `{command}` wrote output that is not UTF-8: {source}")]
    InvalidOutput {
        /// The command line that was executed
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// A directory could not be staged, mounted or copied
    #[error("Failed to prepare directory: {0}")]
    Mount(String),

    /// An include pattern did not parse
    #[error("Invalid include pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    /// Local process or file plumbing failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Exit code of a failed command, if that is what happened
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExecFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Check if a command ran and exited non-zero
    pub fn is_exec_failure(&self) -> bool {
        matches!(self, Self::ExecFailed { .. })
    }
}
