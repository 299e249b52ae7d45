//! CVS repository and checkout fixtures.
//!
//! A [`CvsRepository`] owns a backing store created with `cvs init`; each
//! [`CvsCheckout`] owns one working copy of a module from it. All
//! version-control work goes through the `cvs` client against a
//! `:local:` root.

pub mod checkout;
pub mod clock;
pub mod repository;

pub use checkout::CvsCheckout;
pub use clock::CommitClock;
pub use repository::{CvsRepository, VendorImport};

/// Remove a directory tree, treating "already gone" as success.
pub(crate) fn remove_tree(path: &std::path::Path) -> Result<(), crate::errors::HarnessError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(crate::errors::HarnessError::fixture(path, e)),
    }
}
