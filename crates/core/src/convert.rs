//! Running the converter under test against a fixture repository.

use std::path::{Path, PathBuf};

use git2::{Repository, RepositoryInitOptions};
use tracing::{info, instrument};

use crate::config::ConversionMode;
use crate::cvs::remove_tree;
use crate::cvs::repository::RepositoryHandle;
use crate::errors::HarnessError;

/// Branch the converted history is checked out on.
pub const DEFAULT_BRANCH: &str = "master";

/// A converted tree and the log of the stream that produced it.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub directory: PathBuf,
    pub log: PathBuf,
}

impl Conversion {
    /// Path of `file` inside the converted tree.
    pub fn path(&self, file: &str) -> PathBuf {
        self.directory.join(file)
    }

    /// Delete the converted tree and its log.
    pub fn cleanup(&self) -> Result<(), HarnessError> {
        remove_tree(&self.directory)?;
        match std::fs::remove_file(&self.log) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HarnessError::fixture(&self.log, e)),
        }
    }
}

#[instrument(skip(repo), fields(repo = %repo.name))]
pub(crate) fn convert(
    repo: &RepositoryHandle,
    module: &str,
    output: &str,
) -> Result<Conversion, HarnessError> {
    let directory = repo.base_dir.join(output);
    let log = repo.base_dir.join(format!("{}.log", output));
    fresh_target(&directory)?;

    match repo.config.conversion {
        ConversionMode::FastExport => fast_export(repo, module, &directory, &log)?,
        ConversionMode::Legacy => legacy_import(repo, module, &directory, &log)?,
    }

    info!(output = %directory.display(), "conversion finished");
    Ok(Conversion { directory, log })
}

/// Destroy anything at `directory` and initialize an empty git repository.
fn fresh_target(directory: &Path) -> Result<(), HarnessError> {
    remove_tree(directory)?;
    std::fs::create_dir_all(directory).map_err(|e| HarnessError::fixture(directory, e))?;
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head(DEFAULT_BRANCH);
    Repository::init_opts(directory, &opts)?;
    Ok(())
}

/// `converter --fast-export | tee log | git fast-import`, then check out.
fn fast_export(
    repo: &RepositoryHandle,
    module: &str,
    directory: &Path,
    log: &Path,
) -> Result<(), HarnessError> {
    let runner = &repo.runner;

    let mut producer = runner.command(&repo.config.converter);
    for _ in 0..repo.config.converter_flags() {
        producer.arg("-v");
    }
    producer
        .arg("--root")
        .arg(repo.cvsroot())
        .arg("--fast-export")
        .arg(module);

    let mut consumer = runner.command(&repo.config.git);
    consumer
        .args(["fast-import", "--quiet", "--done"])
        .current_dir(directory);

    runner.run_tee(&mut producer, log, &mut consumer, "conversion")?;
    checkout_ref(directory, DEFAULT_BRANCH)?;
    Ok(())
}

/// `git cvsimport` into the fresh target, which drives the converter itself.
fn legacy_import(
    repo: &RepositoryHandle,
    module: &str,
    directory: &Path,
    log: &Path,
) -> Result<(), HarnessError> {
    let runner = &repo.runner;
    let mut cmd = runner.command(&repo.config.git);
    cmd.arg("cvsimport");
    if repo.config.converter_flags() > 0 {
        cmd.arg("-v");
    }
    cmd.arg("-d")
        .arg(repo.cvsroot())
        .arg("-C")
        .arg(directory)
        .arg("-o")
        .arg(DEFAULT_BRANCH)
        .arg(module);
    runner.run_logged(&mut cmd, log, "legacy conversion")?;
    Ok(())
}

/// Move the converted tree's working copy to `refname`.
///
/// `HEAD` and `master` select the default branch; anything else is resolved
/// as a tag or branch and checked out detached. Returns `Ok(false)` when the
/// ref does not exist in the converted history.
pub fn checkout_ref(directory: &Path, refname: &str) -> Result<bool, HarnessError> {
    let repo = Repository::open(directory)?;
    let mut builder = git2::build::CheckoutBuilder::new();
    builder.force().remove_untracked(true);

    if refname == "HEAD" || refname == DEFAULT_BRANCH {
        let full = format!("refs/heads/{}", DEFAULT_BRANCH);
        if repo.find_reference(&full).is_err() {
            return Ok(false);
        }
        repo.set_head(&full)?;
        repo.checkout_head(Some(&mut builder))?;
        return Ok(true);
    }

    let commit = match repo
        .revparse_single(refname)
        .and_then(|obj| obj.peel_to_commit())
    {
        Ok(commit) => commit,
        Err(_) => return Ok(false),
    };
    repo.set_head_detached(commit.id())?;
    repo.checkout_head(Some(&mut builder))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) -> git2::Oid {
        let workdir = repo.workdir().unwrap().to_path_buf();
        std::fs::write(workdir.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    #[test]
    fn test_fresh_target_replaces_old_contents() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("t.git");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("stale.txt"), "old").unwrap();

        fresh_target(&target).unwrap();
        assert!(!target.join("stale.txt").exists());
        let repo = Repository::open(&target).unwrap();
        assert_eq!(
            repo.find_reference("HEAD").unwrap().symbolic_target(),
            Some("refs/heads/master")
        );
    }

    #[test]
    fn test_checkout_ref_moves_between_tag_and_master() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("t.git");
        fresh_target(&target).unwrap();
        let repo = Repository::open(&target).unwrap();

        let first = commit_file(&repo, "a.txt", "one\n", "first");
        repo.tag_lightweight("v1", &repo.find_object(first, None).unwrap(), false)
            .unwrap();
        commit_file(&repo, "b.txt", "two\n", "second");

        assert!(checkout_ref(&target, "v1").unwrap());
        assert!(target.join("a.txt").exists());
        assert!(!target.join("b.txt").exists());

        assert!(checkout_ref(&target, "master").unwrap());
        assert!(target.join("b.txt").exists());

        assert!(!checkout_ref(&target, "no_such_tag").unwrap());
    }

    #[test]
    fn test_conversion_cleanup_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let conversion = Conversion {
            directory: dir.path().join("t.git"),
            log: dir.path().join("t.git.log"),
        };
        std::fs::create_dir(&conversion.directory).unwrap();
        std::fs::write(&conversion.log, "stream").unwrap();
        conversion.cleanup().unwrap();
        assert!(!conversion.directory.exists());
        assert!(!conversion.log.exists());
        conversion.cleanup().unwrap();
    }
}
