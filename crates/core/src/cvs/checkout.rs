//! The working-copy fixture.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info, instrument};

use super::remove_tree;
use super::repository::RepositoryHandle;
use crate::config::Verbosity;
use crate::dir_context::DirectoryContext;
use crate::errors::HarnessError;

/// One checked-out module. Every operation runs with the working directory
/// scoped to the checkout.
#[derive(Debug)]
pub struct CvsCheckout {
    repo: Rc<RepositoryHandle>,
    name: String,
    directory: PathBuf,
}

impl CvsCheckout {
    pub(crate) fn new(
        repo: Rc<RepositoryHandle>,
        module: &str,
        alias: Option<&str>,
    ) -> Result<Self, HarnessError> {
        let base = repo.base_dir.clone();
        {
            let _ctx = DirectoryContext::enter(&base, repo.config.verbosity)?;
            repo.cvs(&["co", module])?;
        }
        let name = alias.unwrap_or(module).to_string();
        if let Some(alias) = alias {
            let target = base.join(alias);
            remove_tree(&target)?;
            let source = base.join(module);
            std::fs::rename(&source, &target).map_err(|e| HarnessError::fixture(&source, e))?;
        }
        let directory = base.join(&name);
        info!(module, checkout = %directory.display(), "checked out module");
        Ok(Self {
            repo,
            name,
            directory,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of `file` inside the working copy.
    pub fn path(&self, file: &str) -> PathBuf {
        self.directory.join(file)
    }

    /// Execute a `cvs` command inside the checkout directory.
    pub fn run(&self, args: &[&str]) -> Result<(), HarnessError> {
        let _ctx = DirectoryContext::enter(&self.directory, self.repo.config.verbosity)?;
        self.repo.cvs(args)?;
        Ok(())
    }

    /// Add files to the version-controlled set.
    pub fn add(&self, files: &[&str]) -> Result<(), HarnessError> {
        self.run(&with_prefix(&["add"], files))
    }

    /// Remove files from the version-controlled set.
    pub fn remove(&self, files: &[&str]) -> Result<(), HarnessError> {
        self.run(&with_prefix(&["remove", "-f"], files))
    }

    /// Tag the current revision as `<branch>_root`, branch from it, and move
    /// the working copy onto the branch.
    #[instrument(skip(self), fields(checkout = %self.name))]
    pub fn branch(&self, branch: &str) -> Result<(), HarnessError> {
        let root = format!("{}_root", branch);
        self.run(&["tag", &root])?;
        self.run(&["tag", "-r", &root, "-b", branch])?;
        self.run(&["up", "-r", branch])
    }

    /// Move to trunk (`HEAD`) or to an existing branch.
    pub fn switch(&self, branch: &str) -> Result<(), HarnessError> {
        self.run(&["up", "-A"])?;
        if branch != "HEAD" {
            self.run(&["up", "-r", branch])?;
        }
        Ok(())
    }

    pub fn tag(&self, name: &str) -> Result<(), HarnessError> {
        self.run(&["tag", name])
    }

    /// Tag the merge point as `merge_<branch>`, return to trunk and join the
    /// branch. The join still has to be committed.
    #[instrument(skip(self), fields(checkout = %self.name))]
    pub fn merge(&self, branch: &str) -> Result<(), HarnessError> {
        self.run(&["tag", &format!("merge_{}", branch)])?;
        self.run(&["up", "-A"])?;
        self.run(&["up", "-j", branch])
    }

    /// Commit pending changes. Commit seconds are strictly increasing across
    /// the whole repository.
    #[instrument(skip(self), fields(checkout = %self.name))]
    pub fn commit(&self, message: &str) -> Result<(), HarnessError> {
        let _ctx = DirectoryContext::enter(&self.directory, self.repo.config.verbosity)?;
        self.repo.cvs_timed(&["commit", "-m", message])?;
        Ok(())
    }

    /// Create or overwrite a file in the working copy.
    pub fn write(&self, file: &str, content: &str) -> Result<(), HarnessError> {
        if self.repo.config.verbosity >= Verbosity::Commands {
            info!("{} <- {}", file, content);
        }
        let _ctx = DirectoryContext::enter(&self.directory, self.repo.config.verbosity)?;
        std::fs::write(file, content).map_err(|e| HarnessError::fixture(self.path(file), e))
    }

    /// Append to a file in the working copy, creating it if needed.
    pub fn append(&self, file: &str, content: &str) -> Result<(), HarnessError> {
        if self.repo.config.verbosity >= Verbosity::Commands {
            info!("{} <-| {}", file, content);
        }
        let _ctx = DirectoryContext::enter(&self.directory, self.repo.config.verbosity)?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
            .and_then(|mut f| f.write_all(content.as_bytes()))
            .map_err(|e| HarnessError::fixture(self.path(file), e))
    }

    /// Update to a revision or tag, with keyword expansion suppressed.
    /// `master` means the trunk head.
    pub fn update(&self, rev: &str) -> Result<(), HarnessError> {
        let rev = if rev == "master" { "HEAD" } else { rev };
        debug!(checkout = %self.name, rev, "updating");
        self.run(&["up", "-kk", "-r", rev])
    }

    /// Delete the working copy.
    pub fn cleanup(&self) -> Result<(), HarnessError> {
        remove_tree(&self.directory)
    }
}

fn with_prefix<'a>(prefix: &[&'a str], rest: &[&'a str]) -> Vec<&'a str> {
    prefix.iter().chain(rest).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_prefix() {
        assert_eq!(
            with_prefix(&["remove", "-f"], &["a.txt", "b.txt"]),
            vec!["remove", "-f", "a.txt", "b.txt"]
        );
        assert_eq!(with_prefix(&["add"], &[]), vec!["add"]);
    }
}
