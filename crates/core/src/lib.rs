//! cvstest core library.
//!
//! Builds synthetic CVS repositories and checkouts, runs the converter under
//! test against them, and compares the converted tree with the CVS working
//! copy: process runner, scoped working directory, repository and checkout
//! fixtures, converter invocation and tree comparison.

pub mod compare;
pub mod config;
pub mod convert;
pub mod cvs;
pub mod dir_context;
pub mod errors;
pub mod process;

// Re-exports for convenience.
pub use compare::{expect_different, expect_same, ConvertComparison};
pub use config::{ConversionMode, HarnessConfig, Verbosity};
pub use convert::Conversion;
pub use cvs::{CvsCheckout, CvsRepository, VendorImport};
pub use errors::HarnessError;
