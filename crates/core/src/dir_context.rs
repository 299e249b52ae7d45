//! Scoped change of the process working directory.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Verbosity;
use crate::errors::HarnessError;

/// Guard that changes into a directory and changes back when dropped.
///
/// A target that does not exist (yet) is tolerated: the guard then leaves the
/// working directory alone, and the restore on drop is a no-op in effect.
#[derive(Debug)]
pub struct DirectoryContext {
    source: PathBuf,
    entered: bool,
}

impl DirectoryContext {
    pub fn enter(target: &Path, verbosity: Verbosity) -> Result<Self, HarnessError> {
        let source = std::env::current_dir().map_err(|e| HarnessError::fixture(".", e))?;
        if verbosity >= Verbosity::Commands {
            info!("In {}:", relative_display(target, &source));
        }
        let entered = target.is_dir();
        if entered {
            std::env::set_current_dir(target).map_err(|e| HarnessError::fixture(target, e))?;
        }
        Ok(Self { source, entered })
    }

    /// Whether the target existed and is now the working directory.
    pub fn entered(&self) -> bool {
        self.entered
    }
}

impl Drop for DirectoryContext {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.source) {
            warn!(dir = %self.source.display(), error = %e, "failed to restore working directory");
        }
    }
}

fn relative_display(target: &Path, from: &Path) -> String {
    target
        .strip_prefix(from)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| target.display().to_string())
}
