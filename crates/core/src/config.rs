//! TOML-based configuration for the cvstest harness.
//!
//! A [`HarnessConfig`] is built once (defaults, optionally a TOML file, then
//! command-line overrides) and handed to every fixture constructor. Nothing in
//! the library reads ambient global state.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Verbosity
// ---------------------------------------------------------------------------

/// How chatty the harness and its subordinate tools are.
///
/// Levels are cumulative: each one includes everything below it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Verbosity {
    #[default]
    Quiet,
    /// Scenario steps are logged.
    Steps,
    /// Every command line is echoed before it runs.
    Commands,
    /// The version-control system is run without `-Q`.
    Vcs,
    /// The converter gets `-v` flags.
    Converter,
}

impl Verbosity {
    /// Map a count of repeated `-v` flags to a level, saturating at the top.
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Verbosity::Quiet,
            1 => Verbosity::Steps,
            2 => Verbosity::Commands,
            3 => Verbosity::Vcs,
            _ => Verbosity::Converter,
        }
    }

    /// Numeric level, 0 for quiet.
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Number of `-v` flags the converter gets for `count` repeated `-v`
    /// flags on the harness command line: one per flag beyond `Vcs`.
    pub fn converter_flags_for_count(count: u8) -> u8 {
        count.saturating_sub(Verbosity::Vcs.level())
    }
}

// ---------------------------------------------------------------------------
// Conversion mode
// ---------------------------------------------------------------------------

/// How the converted tree is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionMode {
    /// Converter emits a fast-export stream piped into `git fast-import`.
    #[default]
    FastExport,
    /// `git cvsimport` drives the converter itself.
    Legacy,
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// The CVS client program.
    pub cvs: String,

    /// The git program (used for `fast-import` and `cvsimport`).
    pub git: String,

    /// The converter under test.
    pub converter: String,

    /// Directory in which scenario scratch directories are created.
    /// `None` means the current directory at the time of use.
    pub base_dir: Option<PathBuf>,

    /// Directories prepended to `PATH` for every subordinate process.
    /// Relative entries are resolved against the base directory.
    pub extra_path: Vec<PathBuf>,

    pub conversion: ConversionMode,

    /// Keep scratch directories instead of deleting them.
    pub retain: bool,

    pub verbosity: Verbosity,

    /// Number of `-v` flags passed to the converter. At `converter`
    /// verbosity it is at least one.
    pub converter_verbose: u8,

    /// Turn comparison findings into a failing exit status.
    pub strict: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            cvs: "cvs".into(),
            git: "git".into(),
            converter: "cvsps".into(),
            base_dir: None,
            extra_path: vec![PathBuf::from("..")],
            conversion: ConversionMode::default(),
            retain: false,
            verbosity: Verbosity::default(),
            converter_verbose: 0,
            strict: false,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file. Missing keys take defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Reject configurations that cannot possibly run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("cvs", &self.cvs),
            ("git", &self.git),
            ("converter", &self.converter),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    detail: "program name must not be empty".into(),
                });
            }
        }
        if let Some(dir) = &self.base_dir {
            if !dir.is_dir() {
                return Err(ConfigError::InvalidValue {
                    field: "base_dir".into(),
                    detail: format!("'{}' is not a directory", dir.display()),
                });
            }
        }
        Ok(())
    }

    /// Resolve the directory scratch fixtures live in, as an absolute path.
    ///
    /// A relative `base_dir` is taken relative to the current directory at
    /// the time of the call. `:local:` roots must be absolute.
    pub fn base_dir(&self) -> PathBuf {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        match &self.base_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => cwd.join(dir),
            None => cwd,
        }
    }

    /// Number of `-v` flags to pass to the converter.
    pub fn converter_flags(&self) -> usize {
        let floor = u8::from(self.verbosity >= Verbosity::Converter);
        usize::from(self.converter_verbose.max(floor))
    }

    /// The `PATH` value subordinate processes run with, or `None` when there
    /// is nothing to prepend.
    pub fn search_path(&self) -> Option<OsString> {
        if self.extra_path.is_empty() {
            return None;
        }
        let base = self.base_dir();
        let mut dirs: Vec<PathBuf> = self
            .extra_path
            .iter()
            .map(|p| if p.is_absolute() { p.clone() } else { base.join(p) })
            .collect();
        if let Some(current) = std::env::var_os("PATH") {
            dirs.extend(std::env::split_paths(&current));
        }
        std::env::join_paths(dirs).ok()
    }
}
