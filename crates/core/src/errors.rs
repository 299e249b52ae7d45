//! Error types for the cvstest harness.
//!
//! Fixture construction is fail-fast: every subordinate process failure is an
//! [`ExecError`] that the caller propagates up to `main`. Tree comparison
//! findings are not errors at all; they are reported as diagnostics and
//! returned as plain verdicts.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the harness library.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A filesystem operation on a fixture directory or file failed.
    #[error("fixture I/O error at '{path}': {source}")]
    Fixture {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The converted repository could not be opened or moved to a ref.
    #[error("converted tree error: {0}")]
    Git(#[from] git2::Error),
}

impl HarnessError {
    /// Wrap an I/O error with the path it happened on.
    pub fn fixture(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        HarnessError::Fixture {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Subordinate process errors
// ---------------------------------------------------------------------------

/// Failures of an external command run by the process runner.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The process could not be started at all.
    #[error("execution of '{command}'{legend} failed: {source}")]
    Spawn {
        command: String,
        legend: String,
        #[source]
        source: std::io::Error,
    },

    /// The child was killed by a signal.
    #[error("'{command}': child was terminated by signal {signal}")]
    Signaled { command: String, signal: i32 },

    /// The child exited with a nonzero status.
    #[error("'{command}': child returned {code}")]
    Failed { command: String, code: i32 },

    /// Plumbing between piped children (tee, log file) failed.
    #[error("pipeline I/O error in '{command}': {source}")]
    Pipe {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_error_messages() {
        let err = ExecError::Failed {
            command: "cvs -Q init".into(),
            code: 1,
        };
        assert_eq!(err.to_string(), "'cvs -Q init': child returned 1");

        let err = ExecError::Signaled {
            command: "cvsps".into(),
            signal: 9,
        };
        assert!(err.to_string().contains("terminated by signal 9"));

        let err = ExecError::Spawn {
            command: "nope".into(),
            legend: " (version check)".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(
            err.to_string(),
            "execution of 'nope' (version check) failed: not found"
        );
    }

    #[test]
    fn test_harness_error_from_subsystem() {
        let exec = ExecError::Failed {
            command: "git init".into(),
            code: 128,
        };
        let err: HarnessError = exec.into();
        assert!(matches!(err, HarnessError::Exec(_)));

        let err: HarnessError = ConfigError::FileNotFound("x.toml".into()).into();
        assert!(err.to_string().contains("x.toml"));

        let err = HarnessError::fixture(
            "/tmp/t.checkout",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/t.checkout"));
    }
}
