//! A branch cut from a tagged trunk, worked on, and merged back.

use cvstest_core::{ConvertComparison, CvsCheckout, CvsRepository, HarnessConfig, HarnessError};

use super::Findings;

const STEM: &str = "branches";
const MODULE: &str = "module";

pub fn run(config: &HarnessConfig) -> Result<Findings, HarnessError> {
    let comparison = ConvertComparison::build(STEM, MODULE, config, populate)?;
    let mut findings = Findings::new();

    for (legend, tag) in [
        ("trunk", "release_1"),
        ("branch root", "stable_root"),
        ("branch", "stable_fix"),
        ("trunk", "before_merge"),
        ("trunk", "after_merge"),
        ("trunk head", "master"),
    ] {
        let same = comparison.compare_tree_at_tag(legend, tag, true)?;
        findings.check(format!("{} at {}", legend, tag), same);
    }

    comparison.cleanup()?;
    Ok(findings)
}

fn populate(_repo: &mut CvsRepository, co: &CvsCheckout) -> Result<(), HarnessError> {
    co.write("README", "A small program.\n")?;
    co.write("hello.c", "int main(void) { return 1; }\n")?;
    co.add(&["README", "hello.c"])?;
    co.commit("Initial revision")?;
    co.tag("release_1")?;

    co.branch("stable")?;
    co.write("hello.c", "int main(void) { return 0; }\n")?;
    co.commit("Fix exit status on stable")?;
    co.tag("stable_fix")?;

    co.switch("HEAD")?;
    co.write("NEWS", "Nothing yet.\n")?;
    co.add(&["NEWS"])?;
    co.commit("Add NEWS")?;
    co.append("README", "See NEWS.\n")?;
    co.commit("Point at NEWS")?;
    co.tag("before_merge")?;

    co.merge("stable")?;
    co.commit("Merge stable")?;
    co.tag("after_merge")
}
