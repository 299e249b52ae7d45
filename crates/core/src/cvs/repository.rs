//! The backing-store fixture.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info, instrument};

use super::checkout::CvsCheckout;
use super::clock::CommitClock;
use super::remove_tree;
use crate::config::{HarnessConfig, Verbosity};
use crate::convert::{self, Conversion};
use crate::dir_context::DirectoryContext;
use crate::errors::{ExecError, HarnessError};
use crate::process::Runner;

/// State shared between a repository and every checkout spawned from it.
#[derive(Debug)]
pub(crate) struct RepositoryHandle {
    pub(crate) name: String,
    pub(crate) directory: PathBuf,
    pub(crate) base_dir: PathBuf,
    pub(crate) config: HarnessConfig,
    pub(crate) runner: Runner,
    pub(crate) clock: CommitClock,
}

impl RepositoryHandle {
    /// The `-d` argument naming this backing store.
    pub(crate) fn cvsroot(&self) -> String {
        format!(":local:{}", self.directory.display())
    }

    /// Run a `cvs` command against this backing store, in the current
    /// working directory.
    pub(crate) fn cvs(&self, args: &[&str]) -> Result<(), ExecError> {
        let mut cmd = self.runner.command(&self.config.cvs);
        if self.config.verbosity < Verbosity::Vcs {
            cmd.arg("-Q");
        }
        cmd.arg("-d").arg(self.cvsroot()).args(args);
        self.runner.run(&mut cmd, "")
    }

    /// Run a `cvs` command that creates revisions, keeping commit seconds
    /// strictly increasing across the repository.
    pub(crate) fn cvs_timed(&self, args: &[&str]) -> Result<(), ExecError> {
        self.clock.wait_for_fresh_second();
        let result = self.cvs(args);
        self.clock.record();
        result
    }
}

/// A vendor drop to be brought in with `cvs import`.
#[derive(Debug, Clone)]
pub struct VendorImport {
    pub vendor_tag: String,
    pub release_tag: String,
    pub message: String,
    /// Explicit vendor branch number, e.g. `1.1.3`. CVS uses `1.1.1` when
    /// this is `None`.
    pub branch: Option<String>,
    pub files: Vec<(String, String)>,
}

impl VendorImport {
    pub fn new(vendor_tag: impl Into<String>, release_tag: impl Into<String>) -> Self {
        let release_tag = release_tag.into();
        Self {
            vendor_tag: vendor_tag.into(),
            message: format!("Import {}", release_tag),
            release_tag,
            branch: None,
            files: Vec::new(),
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.push((name.into(), content.into()));
        self
    }
}

/// A CVS backing store on disk plus the checkouts made from it.
#[derive(Debug)]
pub struct CvsRepository {
    handle: Rc<RepositoryHandle>,
    checkouts: Vec<PathBuf>,
}

impl CvsRepository {
    /// Bind a repository fixture to `<base_dir>/<name>`.
    ///
    /// Nothing is created on disk; call [`init`](Self::init) for a fresh
    /// store, or leave it out to work against an existing one.
    pub fn new(name: impl Into<String>, config: &HarnessConfig) -> Self {
        let name = name.into();
        let base_dir = config.base_dir();
        let directory = base_dir.join(&name);
        Self {
            handle: Rc::new(RepositoryHandle {
                name,
                directory,
                base_dir,
                config: config.clone(),
                runner: Runner::new(config),
                clock: CommitClock::new(),
            }),
            checkouts: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.handle.name
    }

    pub fn directory(&self) -> &Path {
        &self.handle.directory
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.handle.config
    }

    /// Working directories of the checkouts this repository has spawned.
    pub fn checkouts(&self) -> &[PathBuf] {
        &self.checkouts
    }

    /// Execute an arbitrary `cvs` command against this backing store.
    pub fn run(&self, args: &[&str]) -> Result<(), HarnessError> {
        let _ctx = DirectoryContext::enter(&self.handle.base_dir, self.handle.config.verbosity)?;
        self.handle.cvs(args)?;
        Ok(())
    }

    /// Destroy any previous store of this name and create an empty one.
    #[instrument(skip(self), fields(repo = %self.handle.name))]
    pub fn init(&self) -> Result<(), HarnessError> {
        let dir = &self.handle.directory;
        remove_tree(dir)?;
        std::fs::create_dir_all(dir).map_err(|e| HarnessError::fixture(dir, e))?;
        self.run(&["init"])?;
        info!(path = %dir.display(), "initialized cvs repository");
        Ok(())
    }

    /// Create an empty module. Its directory under the root is all CVS needs.
    pub fn module(&self, name: &str) -> Result<PathBuf, HarnessError> {
        let module = self.handle.directory.join(name);
        if self.handle.config.verbosity >= Verbosity::Commands {
            info!("Creating module {}", module.display());
        }
        std::fs::create_dir(&module).map_err(|e| HarnessError::fixture(&module, e))?;
        Ok(module)
    }

    /// Check out `module`, optionally renaming the working copy to `alias`.
    pub fn checkout(&mut self, module: &str, alias: Option<&str>) -> Result<CvsCheckout, HarnessError> {
        let checkout = CvsCheckout::new(Rc::clone(&self.handle), module, alias)?;
        self.checkouts.push(checkout.directory().to_path_buf());
        Ok(checkout)
    }

    /// Bring a vendor drop into `module` with `cvs import`.
    #[instrument(skip(self, release), fields(repo = %self.handle.name, vendor = %release.vendor_tag, release = %release.release_tag))]
    pub fn import(&self, module: &str, release: &VendorImport) -> Result<(), HarnessError> {
        let staging = self
            .handle
            .base_dir
            .join(format!("{}.import", self.handle.name));
        remove_tree(&staging)?;
        for (name, content) in &release.files {
            let path = staging.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| HarnessError::fixture(parent, e))?;
            }
            std::fs::write(&path, content).map_err(|e| HarnessError::fixture(&path, e))?;
        }
        std::fs::create_dir_all(&staging).map_err(|e| HarnessError::fixture(&staging, e))?;

        let mut args = vec!["import"];
        if let Some(branch) = &release.branch {
            args.extend(["-b", branch.as_str()]);
        }
        args.extend([
            "-m",
            release.message.as_str(),
            module,
            release.vendor_tag.as_str(),
            release.release_tag.as_str(),
        ]);
        {
            let _ctx = DirectoryContext::enter(&staging, self.handle.config.verbosity)?;
            self.handle.cvs_timed(&args)?;
        }
        debug!(files = release.files.len(), "vendor drop imported");
        remove_tree(&staging)
    }

    /// Delete a branch tag from every file of `module`.
    pub fn delete_branch_tag(&self, module: &str, tag: &str) -> Result<(), HarnessError> {
        self.run(&["rtag", "-d", "-B", tag, module])
    }

    /// Convert `module` into a fresh tree at `<base_dir>/<output>`, leaving the
    /// converter's stream in `<output>.log`.
    pub fn convert(&self, module: &str, output: &str) -> Result<Conversion, HarnessError> {
        convert::convert(&self.handle, module, output)
    }

    /// Delete every checkout spawned from this repository, unless scratch
    /// directories are being retained.
    pub fn cleanup(&self) -> Result<(), HarnessError> {
        if self.handle.config.retain {
            debug!(repo = %self.handle.name, "retaining checkouts");
            return Ok(());
        }
        for checkout in &self.checkouts {
            remove_tree(checkout)?;
        }
        Ok(())
    }

    /// Delete the backing store itself, unless scratch directories are being
    /// retained.
    pub fn destroy(&self) -> Result<(), HarnessError> {
        if self.handle.config.retain {
            return Ok(());
        }
        remove_tree(&self.handle.directory)
    }
}
