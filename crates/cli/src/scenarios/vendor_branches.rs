//! Vendor branch handling.
//!
//! Files in the repository:
//!
//! - `imported-once.txt`: imported once. The trunk and the first vendor
//!   revision are identical.
//! - `imported-twice.txt`: imported twice. Trunk should carry the second
//!   import.
//! - `imported-modified.txt`: imported, then modified on trunk.
//! - `imported-modified-imported.txt`: imported, modified on trunk, then
//!   imported again.
//! - `added-imported.txt`: added on trunk first, then imported with
//!   different content, so the vendor branch never became its default branch.
//! - `imported-anonymously.txt`: like `imported-twice.txt`, on a vendor
//!   branch whose branch tag has since been deleted.

use tracing::info;

use cvstest_core::{
    expect_different, expect_same, ConvertComparison, CvsCheckout, CvsRepository, HarnessConfig,
    HarnessError, VendorImport,
};

use super::Findings;

const STEM: &str = "t9601";
const MODULE: &str = "module";

const ANON_VENDOR: &str = "anonvendor";

pub fn run(config: &HarnessConfig) -> Result<Findings, HarnessError> {
    let comparison = ConvertComparison::build(STEM, MODULE, config, populate)?;
    let co = comparison.checkout();
    let git = comparison.conversion();
    let mut findings = Findings::new();

    co.update("master")?;

    findings.check(
        "imported-once.txt",
        expect_same(co.path("imported-once.txt"), git.path("imported-once.txt"))?,
    );

    // Known converter divergence, kept as a regression marker: trunk in the
    // conversion does not pick up the second import.
    findings.check(
        "imported-twice.txt (known divergence)",
        expect_different(co.path("imported-twice.txt"), git.path("imported-twice.txt"))?,
    );

    for file in [
        "imported-modified.txt",
        "imported-modified-imported.txt",
        "added-imported.txt",
        "imported-anonymously.txt",
    ] {
        findings.check(file, expect_same(co.path(file), git.path(file))?);
    }

    co.update("vendortag-1")?;
    findings.check(
        "imported-once.txt at vendortag-1",
        expect_same(co.path("imported-once.txt"), git.path("imported-once.txt"))?,
    );

    comparison.cleanup()?;
    Ok(findings)
}

fn populate(repo: &mut CvsRepository, co: &CvsCheckout) -> Result<(), HarnessError> {
    info!("adding added-imported.txt on trunk");
    co.write("added-imported.txt", "Added on trunk.\n")?;
    co.add(&["added-imported.txt"])?;
    co.commit("Add added-imported.txt")?;

    info!("first vendor import");
    repo.import(
        MODULE,
        &VendorImport::new("vendorbranch", "vendortag-1")
            .message("First vendor import")
            .file("imported-once.txt", "This file was imported once.\n")
            .file("imported-twice.txt", "This is the first import.\n")
            .file("imported-modified.txt", "Imported, not yet modified.\n")
            .file(
                "imported-modified-imported.txt",
                "Imported, not yet modified.\n",
            )
            .file("added-imported.txt", "Vendor version of an added file.\n"),
    )?;

    info!("modifying imported files on trunk");
    co.switch("HEAD")?;
    co.append("imported-modified.txt", "Modified on trunk.\n")?;
    co.append("imported-modified-imported.txt", "Modified on trunk.\n")?;
    co.commit("Modify imported files on trunk")?;

    info!("second vendor import");
    repo.import(
        MODULE,
        &VendorImport::new("vendorbranch", "vendortag-2")
            .message("Second vendor import")
            .file("imported-twice.txt", "This is the second import.\n")
            .file(
                "imported-modified-imported.txt",
                "Imported, not yet modified.\nChanged by the vendor.\n",
            ),
    )?;

    info!("anonymous vendor branch");
    for (release, content) in [
        ("anontag-1", "First anonymous import.\n"),
        ("anontag-2", "Second anonymous import.\n"),
    ] {
        repo.import(
            MODULE,
            &VendorImport::new(ANON_VENDOR, release)
                .branch("1.1.3")
                .file("imported-anonymously.txt", content),
        )?;
    }
    repo.delete_branch_tag(MODULE, ANON_VENDOR)?;

    co.switch("HEAD")
}
