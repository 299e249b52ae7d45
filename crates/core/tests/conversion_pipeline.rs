//! Conversion and comparison tests that stand in shell scripts for the CVS
//! client and the converter.
//!
//! The stand-in `cvs` only checks that it was handed an absolute, existing
//! `:local:` root and creates the directory for `co`. The stand-in converter
//! prints a fixed fast-import stream. Only `git` has to be installed; without
//! it the tests skip.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serial_test::serial;
use tempfile::TempDir;

use cvstest_core::convert::checkout_ref;
use cvstest_core::dir_context::DirectoryContext;
use cvstest_core::{ConvertComparison, CvsRepository, HarnessConfig, Verbosity};

// ===========================================================================
// Helper functions
// ===========================================================================

const STAND_IN_CVS: &str = r#"#!/bin/sh
root=""
while [ $# -gt 0 ]; do
  case "$1" in
    -Q) shift ;;
    -d) root="$2"; shift 2 ;;
    *) break ;;
  esac
done
case "$root" in
  :local:/*) ;;
  *) echo "relative root: $root" >&2; exit 1 ;;
esac
[ -d "${root#:local:}" ] || { echo "no repository at $root" >&2; exit 1; }
if [ "$1" = co ]; then mkdir -p "$2"; fi
exit 0
"#;

const STREAM: &str = "blob
mark :1
data 6
hello

commit refs/heads/master
mark :2
committer Harness <harness@example.com> 1000000000 +0000
data 8
initial
M 100644 :1 hello.txt

reset refs/tags/first
from :2

blob
mark :3
data 4
two

commit refs/heads/master
mark :4
committer Harness <harness@example.com> 1000000001 +0000
data 7
second
from :2
M 100644 :3 second.txt

done
";

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

/// A config whose `cvs` and converter are stand-in scripts under `tools`.
fn stand_in_config(tools: &Path, base_dir: PathBuf) -> HarnessConfig {
    let stream = tools.join("stream.fi");
    std::fs::write(&stream, STREAM).unwrap();
    HarnessConfig {
        cvs: script(tools, "cvs", STAND_IN_CVS),
        converter: script(
            tools,
            "converter",
            &format!("#!/bin/sh\ncat '{}'\n", stream.display()),
        ),
        base_dir: Some(base_dir),
        extra_path: Vec::new(),
        ..HarnessConfig::default()
    }
}

fn build(config: &HarnessConfig) -> ConvertComparison {
    ConvertComparison::build("fake", "module", config, |_repo, co| {
        co.write("hello.txt", "hello\n")?;
        co.write("second.txt", "two\n")?;
        Ok(())
    })
    .unwrap()
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
#[serial]
fn test_fast_export_pipeline_logs_stream_and_checks_out_master() {
    if !git_available() {
        eprintln!("skipping: git not installed");
        return;
    }
    let tools = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let config = stand_in_config(tools.path(), work.path().to_path_buf());

    let repo = CvsRepository::new("fake.testrepo", &config);
    repo.init().unwrap();
    let conversion = repo.convert("module", "fake.git").unwrap();

    assert_eq!(conversion.directory, work.path().join("fake.git"));
    assert_eq!(std::fs::read_to_string(&conversion.log).unwrap(), STREAM);
    assert_eq!(
        std::fs::read_to_string(conversion.path("hello.txt")).unwrap(),
        "hello\n"
    );
    assert!(conversion.path("second.txt").exists());

    assert!(checkout_ref(&conversion.directory, "first").unwrap());
    assert!(!conversion.path("second.txt").exists());
    assert!(checkout_ref(&conversion.directory, "HEAD").unwrap());
    assert!(conversion.path("second.txt").exists());
    assert!(!checkout_ref(&conversion.directory, "no-such-tag").unwrap());

    conversion.cleanup().unwrap();
    assert!(!conversion.directory.exists());
    assert!(!conversion.log.exists());
}

#[test]
#[serial]
fn test_converter_gets_one_flag_per_extra_verbosity() {
    if !git_available() {
        eprintln!("skipping: git not installed");
        return;
    }
    let tools = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let args = tools.path().join("args.txt");
    let mut config = stand_in_config(tools.path(), work.path().to_path_buf());
    config.converter = script(
        tools.path(),
        "converter-args",
        &format!("#!/bin/sh\necho \"$@\" > '{}'\necho done\n", args.display()),
    );
    config.verbosity = Verbosity::Converter;
    config.converter_verbose = 2;

    let repo = CvsRepository::new("args.testrepo", &config);
    repo.init().unwrap();
    repo.convert("module", "args.git").unwrap();

    let recorded = std::fs::read_to_string(&args).unwrap();
    assert!(recorded.starts_with("-v -v --root :local:/"));
    assert!(recorded.trim_end().ends_with("--fast-export module"));
}

#[test]
#[serial]
fn test_compare_tree_at_tag_verdicts() {
    if !git_available() {
        eprintln!("skipping: git not installed");
        return;
    }
    let tools = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let config = stand_in_config(tools.path(), work.path().to_path_buf());
    let comparison = build(&config);

    // Same trees.
    assert!(comparison.compare_tree_at_tag("trunk", "master", true).unwrap());
    assert!(comparison.compare_tree_at_tag("trunk", "master", false).unwrap());

    // At `first` the converted tree lacks second.txt.
    assert!(!comparison.compare_tree_at_tag("trunk", "first", true).unwrap());
    assert!(!comparison.compare_tree_at_tag("trunk", "first", false).unwrap());

    // A ref the conversion never produced.
    assert!(!comparison.compare_tree_at_tag("trunk", "missing", true).unwrap());
    assert!(!comparison.compare_tree_at_tag("trunk", "missing", false).unwrap());

    // Same file list, different content.
    comparison.checkout().write("hello.txt", "changed\n").unwrap();
    assert!(!comparison.compare_tree_at_tag("trunk", "master", true).unwrap());
    assert!(!comparison.compare_tree_at_tag("trunk", "master", false).unwrap());

    comparison.cleanup().unwrap();
    for leftover in ["fake.git", "fake.git.log", "fake.checkout", "fake.testrepo"] {
        assert!(!work.path().join(leftover).exists(), "{} left behind", leftover);
    }
}

#[test]
#[serial]
fn test_relative_base_dir_keeps_fixtures_together() {
    let tools = TempDir::new().unwrap();
    let cwd = TempDir::new().unwrap();
    std::fs::create_dir(cwd.path().join("scratch")).unwrap();
    let config = stand_in_config(tools.path(), PathBuf::from("scratch"));

    let _ctx = DirectoryContext::enter(cwd.path(), Verbosity::Quiet).unwrap();
    config.validate().unwrap();
    let mut repo = CvsRepository::new("p.testrepo", &config);
    repo.init().unwrap();
    repo.module("module").unwrap();
    let co = repo.checkout("module", Some("p.checkout")).unwrap();
    co.write("a.txt", "a\n").unwrap();
    co.add(&["a.txt"]).unwrap();

    let scratch = cwd.path().join("scratch");
    assert!(scratch.join("p.testrepo").join("module").is_dir());
    assert!(scratch.join("p.checkout").join("a.txt").is_file());
    assert!(!scratch.join("scratch").exists());
}
