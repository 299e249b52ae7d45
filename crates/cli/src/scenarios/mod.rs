//! The scenario catalogue.
//!
//! A scenario builds its own repository, converts it once, and records each
//! comparison in [`Findings`]. Fixture failures abort the scenario with an
//! error; comparison failures are only recorded.

mod branches;
mod vendor_branches;

use cvstest_core::{HarnessConfig, HarnessError};

/// Outcome of the comparisons a scenario made.
#[derive(Debug, Default)]
pub struct Findings {
    checks: usize,
    failures: Vec<String>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one comparison verdict.
    pub fn check(&mut self, label: impl Into<String>, passed: bool) {
        self.checks += 1;
        if !passed {
            self.failures.push(label.into());
        }
    }

    pub fn checks(&self) -> usize {
        self.checks
    }

    pub fn passed(&self) -> usize {
        self.checks - self.failures.len()
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A named, self-contained test scenario.
#[derive(Clone, Copy, Debug)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub run: fn(&HarnessConfig) -> Result<Findings, HarnessError>,
}

/// Every scenario, in the order they run by default.
pub const CATALOGUE: &[Scenario] = &[
    Scenario {
        name: "t9601",
        description: "vendor branches",
        run: vendor_branches::run,
    },
    Scenario {
        name: "branches",
        description: "branches, tags and a merge back to trunk",
        run: branches::run,
    },
];

/// Look a scenario up by name.
pub fn find(name: &str) -> Option<&'static Scenario> {
    CATALOGUE.iter().find(|s| s.name == name)
}
