//! Comparing a CVS working copy with its converted counterpart.
//!
//! These are assertions, not preconditions: a mismatch is logged with `warn!`
//! and returned as `false`, and the scenario carries on. Only I/O failures
//! that make the comparison itself impossible are errors.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::HarnessConfig;
use crate::convert::{self, Conversion};
use crate::cvs::{CvsCheckout, CvsRepository};
use crate::errors::HarnessError;

/// Metadata directory name in a CVS working copy.
pub const CVS_METADATA: &str = "CVS";
/// Metadata directory name in a git working tree.
pub const GIT_METADATA: &str = ".git";

// ---------------------------------------------------------------------------
// File comparison
// ---------------------------------------------------------------------------

/// Byte-for-byte comparison. A missing file never equals anything.
pub fn files_identical(a: &Path, b: &Path) -> Result<bool, HarnessError> {
    let (meta_a, meta_b) = match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => (ma, mb),
        (Err(e), _) if e.kind() == ErrorKind::NotFound => return Ok(false),
        (_, Err(e)) if e.kind() == ErrorKind::NotFound => return Ok(false),
        (Err(e), _) => return Err(HarnessError::fixture(a, e)),
        (_, Err(e)) => return Err(HarnessError::fixture(b, e)),
    };
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut ra = BufReader::new(File::open(a).map_err(|e| HarnessError::fixture(a, e))?);
    let mut rb = BufReader::new(File::open(b).map_err(|e| HarnessError::fixture(b, e))?);
    let mut buf_a = [0u8; 8192];
    let mut buf_b = [0u8; 8192];
    loop {
        let n = ra.read(&mut buf_a).map_err(|e| HarnessError::fixture(a, e))?;
        if n == 0 {
            // Same length, so b is exhausted too.
            return Ok(true);
        }
        rb.read_exact(&mut buf_b[..n])
            .map_err(|e| HarnessError::fixture(b, e))?;
        if buf_a[..n] != buf_b[..n] {
            return Ok(false);
        }
    }
}

/// Complain if two files are not identical. Returns whether they were.
pub fn expect_same(a: impl AsRef<Path>, b: impl AsRef<Path>) -> Result<bool, HarnessError> {
    let (a, b) = (a.as_ref(), b.as_ref());
    let same = files_identical(a, b)?;
    if !same {
        warn!("{} and {} are not the same.", a.display(), b.display());
    }
    Ok(same)
}

/// Complain if two files are unexpectedly identical. Returns whether they
/// differed.
pub fn expect_different(a: impl AsRef<Path>, b: impl AsRef<Path>) -> Result<bool, HarnessError> {
    let (a, b) = (a.as_ref(), b.as_ref());
    let same = files_identical(a, b)?;
    if same {
        warn!("{} and {} are unexpectedly the same.", a.display(), b.display());
    }
    Ok(!same)
}

// ---------------------------------------------------------------------------
// Tree comparison
// ---------------------------------------------------------------------------

/// Sorted paths, relative to `root`, of every regular file under it, skipping
/// any directory named `ignore`.
pub fn manifest(root: &Path, ignore: &str) -> Result<Vec<PathBuf>, HarnessError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !(e.depth() > 0 && e.file_type().is_dir() && e.file_name() == ignore));
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            HarnessError::fixture(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            files.push(rel.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// The first way two trees were found to differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeDifference {
    /// The file lists differ. Both full, sorted manifests are kept.
    Manifest {
        left: Vec<PathBuf>,
        right: Vec<PathBuf>,
    },
    /// Same file lists, but this file's content differs.
    Content { path: PathBuf },
}

/// Paths in `from` that `other` lacks. Both must be sorted.
fn missing_from(from: &[PathBuf], other: &[PathBuf]) -> Vec<PathBuf> {
    from.iter()
        .filter(|p| other.binary_search(p).is_err())
        .cloned()
        .collect()
}

/// Compare two trees by manifest, then content.
pub fn diff_trees(
    left: &Path,
    left_ignore: &str,
    right: &Path,
    right_ignore: &str,
) -> Result<Option<TreeDifference>, HarnessError> {
    let left_files = manifest(left, left_ignore)?;
    let right_files = manifest(right, right_ignore)?;
    if left_files != right_files {
        return Ok(Some(TreeDifference::Manifest {
            left: left_files,
            right: right_files,
        }));
    }
    for rel in &left_files {
        if !files_identical(&left.join(rel), &right.join(rel))? {
            return Ok(Some(TreeDifference::Content { path: rel.clone() }));
        }
    }
    Ok(None)
}

fn display_paths(paths: &[PathBuf]) -> String {
    let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    format!("[{}]", names.join(", "))
}

/// Turn the result of [`diff_trees`] into a verdict against an expectation.
///
/// Returns whether the trees matched, plus the complaint to log, if any. A
/// difference is only worth a complaint when a match was expected, and a
/// match only when a difference was.
pub fn judge(
    difference: Option<&TreeDifference>,
    success_expected: bool,
    left: &Path,
    right: &Path,
) -> (bool, Option<String>) {
    match difference {
        None if success_expected => (true, None),
        None => (true, Some("trees unexpectedly match".to_string())),
        Some(_) if !success_expected => (false, None),
        Some(TreeDifference::Manifest {
            left: lfiles,
            right: rfiles,
        }) => {
            let only_left = missing_from(lfiles, rfiles);
            let only_right = missing_from(rfiles, lfiles);
            let complaint = format!(
                "file manifests don't match: {} has {}, {} has {} (only in the first: {}, only in the second: {})",
                left.display(),
                display_paths(lfiles),
                right.display(),
                display_paths(rfiles),
                display_paths(&only_left),
                display_paths(&only_right)
            );
            (false, Some(complaint))
        }
        Some(TreeDifference::Content { path }) => {
            let complaint = format!(
                "{} and {} are different.",
                left.join(path).display(),
                right.join(path).display()
            );
            (false, Some(complaint))
        }
    }
}

// ---------------------------------------------------------------------------
// ConvertComparison
// ---------------------------------------------------------------------------

/// A repository, a checkout of one module, and that module's conversion.
///
/// Scratch directories follow the `<stem>.testrepo`, `<stem>.checkout`,
/// `<stem>.git` layout.
#[derive(Debug)]
pub struct ConvertComparison {
    stem: String,
    repo: CvsRepository,
    checkout: CvsCheckout,
    conversion: Conversion,
}

impl ConvertComparison {
    /// Create a fresh repository with an empty `module`, check it out, let
    /// `populate` build history, then convert.
    pub fn build<F>(
        stem: &str,
        module: &str,
        config: &HarnessConfig,
        populate: F,
    ) -> Result<Self, HarnessError>
    where
        F: FnOnce(&mut CvsRepository, &CvsCheckout) -> Result<(), HarnessError>,
    {
        let mut repo = CvsRepository::new(format!("{}.testrepo", stem), config);
        repo.init()?;
        repo.module(module)?;
        let checkout = repo.checkout(module, Some(&format!("{}.checkout", stem)))?;
        populate(&mut repo, &checkout)?;
        Self::convert_existing(stem, module, repo, checkout)
    }

    /// Use a repository that already exists on disk.
    pub fn open(stem: &str, module: &str, config: &HarnessConfig) -> Result<Self, HarnessError> {
        let mut repo = CvsRepository::new(format!("{}.testrepo", stem), config);
        let checkout = repo.checkout(module, Some(&format!("{}.checkout", stem)))?;
        Self::convert_existing(stem, module, repo, checkout)
    }

    fn convert_existing(
        stem: &str,
        module: &str,
        repo: CvsRepository,
        checkout: CvsCheckout,
    ) -> Result<Self, HarnessError> {
        let conversion = repo.convert(module, &format!("{}.git", stem))?;
        Ok(Self {
            stem: stem.to_string(),
            repo,
            checkout,
            conversion,
        })
    }

    pub fn checkout(&self) -> &CvsCheckout {
        &self.checkout
    }

    pub fn conversion(&self) -> &Conversion {
        &self.conversion
    }

    /// Check whether the checkout at `tag` matches the converted tree at the
    /// same ref. With `success_expected` false, a divergence is the desired
    /// outcome and only a full match is reported.
    pub fn compare_tree_at_tag(
        &self,
        legend: &str,
        tag: &str,
        success_expected: bool,
    ) -> Result<bool, HarnessError> {
        info!(stem = %self.stem, legend, tag, "comparing trees");
        self.checkout.update(tag)?;
        if !convert::checkout_ref(&self.conversion.directory, tag)? {
            if success_expected {
                warn!(
                    "{} {} {}: ref missing from converted history",
                    self.stem, legend, tag
                );
            }
            return Ok(false);
        }

        let difference = diff_trees(
            self.checkout.directory(),
            CVS_METADATA,
            &self.conversion.directory,
            GIT_METADATA,
        )?;
        let (same, complaint) = judge(
            difference.as_ref(),
            success_expected,
            self.checkout.directory(),
            &self.conversion.directory,
        );
        if let Some(complaint) = complaint {
            warn!("{} {} {}: {}", self.stem, legend, tag, complaint);
        }
        Ok(same)
    }

    /// Remove the converted tree, the checkout and the backing store, unless
    /// scratch directories are being retained.
    pub fn cleanup(&self) -> Result<(), HarnessError> {
        if self.repo.config().retain {
            info!(stem = %self.stem, "retaining scratch directories");
            return Ok(());
        }
        self.conversion.cleanup()?;
        self.repo.cleanup()?;
        self.repo.destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_files_identical() {
        let dir = tempfile::TempDir::new().unwrap();
        write(dir.path(), "a", "same\n");
        write(dir.path(), "b", "same\n");
        write(dir.path(), "c", "sane\n");
        write(dir.path(), "d", "same\nplus\n");
        let p = |n: &str| dir.path().join(n);

        assert!(files_identical(&p("a"), &p("b")).unwrap());
        assert!(!files_identical(&p("a"), &p("c")).unwrap());
        assert!(!files_identical(&p("a"), &p("d")).unwrap());
        assert!(!files_identical(&p("a"), &p("missing")).unwrap());
    }

    #[test]
    fn test_files_identical_large() {
        let dir = tempfile::TempDir::new().unwrap();
        let big: String = "0123456789abcdef".repeat(4096);
        write(dir.path(), "a", &big);
        write(dir.path(), "b", &big);
        let mut altered = big.clone();
        altered.replace_range(40_000..40_001, "X");
        write(dir.path(), "c", &altered);

        assert!(files_identical(&dir.path().join("a"), &dir.path().join("b")).unwrap());
        assert!(!files_identical(&dir.path().join("a"), &dir.path().join("c")).unwrap());
    }

    #[test]
    fn test_expect_same_and_different() {
        let dir = tempfile::TempDir::new().unwrap();
        write(dir.path(), "a", "x");
        write(dir.path(), "b", "x");
        write(dir.path(), "c", "y");
        let p = |n: &str| dir.path().join(n);

        assert!(expect_same(p("a"), p("b")).unwrap());
        assert!(!expect_same(p("a"), p("c")).unwrap());
        assert!(expect_different(p("a"), p("c")).unwrap());
        assert!(!expect_different(p("a"), p("b")).unwrap());
        assert!(expect_different(p("a"), p("missing")).unwrap());
    }

    #[test]
    fn test_manifest_skips_metadata_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        write(root, "top.txt", "1");
        write(root, "sub/inner.txt", "2");
        write(root, "CVS/Entries", "meta");
        write(root, "sub/CVS/Root", "meta");

        let files = manifest(root, CVS_METADATA).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("sub/inner.txt"), PathBuf::from("top.txt")]
        );
    }

    #[test]
    fn test_manifest_keeps_file_named_like_metadata() {
        let dir = tempfile::TempDir::new().unwrap();
        write(dir.path(), "CVS", "a plain file");
        let files = manifest(dir.path(), CVS_METADATA).unwrap();
        assert_eq!(files, vec![PathBuf::from("CVS")]);
    }

    #[test]
    fn test_diff_trees_ignores_metadata_on_both_sides() {
        let dir = tempfile::TempDir::new().unwrap();
        let left = dir.path().join("t.checkout");
        let right = dir.path().join("t.git");
        write(&left, "a.txt", "alpha\n");
        write(&left, "CVS/Entries", "/a.txt/1.1///\n");
        write(&right, "a.txt", "alpha\n");
        write(&right, ".git/HEAD", "ref: refs/heads/master\n");

        assert_eq!(
            diff_trees(&left, CVS_METADATA, &right, GIT_METADATA).unwrap(),
            None
        );
        // Running it again gives the same verdict.
        assert_eq!(
            diff_trees(&left, CVS_METADATA, &right, GIT_METADATA).unwrap(),
            None
        );
    }

    #[test]
    fn test_diff_trees_reports_manifest_difference() {
        let dir = tempfile::TempDir::new().unwrap();
        let left = dir.path().join("l");
        let right = dir.path().join("r");
        write(&left, "a.txt", "a");
        write(&left, "only-left.txt", "l");
        write(&right, "a.txt", "a");
        write(&right, "only-right.txt", "r");

        let diff = diff_trees(&left, CVS_METADATA, &right, GIT_METADATA)
            .unwrap()
            .unwrap();
        assert_eq!(
            diff,
            TreeDifference::Manifest {
                left: vec![PathBuf::from("a.txt"), PathBuf::from("only-left.txt")],
                right: vec![PathBuf::from("a.txt"), PathBuf::from("only-right.txt")],
            }
        );
    }

    fn manifest_difference() -> TreeDifference {
        TreeDifference::Manifest {
            left: vec![PathBuf::from("a.txt"), PathBuf::from("extra.txt")],
            right: vec![PathBuf::from("a.txt")],
        }
    }

    #[test]
    fn test_judge_when_match_expected() {
        let (l, r) = (Path::new("/w/t.checkout"), Path::new("/w/t.git"));

        assert_eq!(judge(None, true, l, r), (true, None));

        let (same, complaint) = judge(Some(&manifest_difference()), true, l, r);
        assert!(!same);
        let complaint = complaint.unwrap();
        assert!(complaint.contains("file manifests don't match"));
        assert!(complaint.contains("[a.txt, extra.txt]"));
        assert!(complaint.contains("has [a.txt]"));
        assert!(complaint.contains("only in the first: [extra.txt]"));

        let content = TreeDifference::Content {
            path: PathBuf::from("a.txt"),
        };
        let (same, complaint) = judge(Some(&content), true, l, r);
        assert!(!same);
        assert_eq!(
            complaint.unwrap(),
            "/w/t.checkout/a.txt and /w/t.git/a.txt are different."
        );
    }

    #[test]
    fn test_judge_when_divergence_expected() {
        let (l, r) = (Path::new("/w/t.checkout"), Path::new("/w/t.git"));

        assert_eq!(judge(Some(&manifest_difference()), false, l, r), (false, None));
        let content = TreeDifference::Content {
            path: PathBuf::from("a.txt"),
        };
        assert_eq!(judge(Some(&content), false, l, r), (false, None));

        let (same, complaint) = judge(None, false, l, r);
        assert!(same);
        assert_eq!(complaint.as_deref(), Some("trees unexpectedly match"));
    }

    #[test]
    fn test_diff_trees_reports_first_content_difference() {
        let dir = tempfile::TempDir::new().unwrap();
        let left = dir.path().join("l");
        let right = dir.path().join("r");
        for (name, l, r) in [("a.txt", "1", "1"), ("b.txt", "2", "X"), ("c.txt", "3", "Y")] {
            write(&left, name, l);
            write(&right, name, r);
        }
        let diff = diff_trees(&left, CVS_METADATA, &right, GIT_METADATA)
            .unwrap()
            .unwrap();
        assert_eq!(
            diff,
            TreeDifference::Content {
                path: PathBuf::from("b.txt")
            }
        );
    }
}
