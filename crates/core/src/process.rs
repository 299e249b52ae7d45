//! Blocking execution of subordinate commands.
//!
//! Every fixture operation ends up here. A command either exits 0 or the
//! caller gets an [`ExecError`]; there is no retry and no partial success.

use std::ffi::OsString;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use tracing::{debug, info, warn};

use crate::config::{HarnessConfig, Verbosity};
use crate::errors::ExecError;

/// Runs commands with the harness's `PATH` and echo settings.
#[derive(Debug, Clone)]
pub struct Runner {
    verbosity: Verbosity,
    search_path: Option<OsString>,
}

impl Runner {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            verbosity: config.verbosity,
            search_path: config.search_path(),
        }
    }

    /// Start building a command for `program` with the harness `PATH`.
    pub fn command(&self, program: &str) -> Command {
        let mut cmd = Command::new(program);
        if let Some(path) = &self.search_path {
            cmd.env("PATH", path);
        }
        cmd
    }

    /// Run `cmd` to completion, inheriting stdio.
    pub fn run(&self, cmd: &mut Command, legend: &str) -> Result<(), ExecError> {
        let rendered = render(cmd);
        self.echo(&rendered, legend);
        let status = cmd
            .status()
            .map_err(|source| spawn_error(&rendered, legend, source))?;
        check_status(&rendered, status)
    }

    /// Run `cmd` with its standard output captured into `log`.
    pub fn run_logged(&self, cmd: &mut Command, log: &Path, legend: &str) -> Result<(), ExecError> {
        let rendered = format!("{} > {}", render(cmd), log.display());
        self.echo(&rendered, legend);
        let file = File::create(log).map_err(|source| ExecError::Pipe {
            command: rendered.clone(),
            source,
        })?;
        let status = cmd
            .stdout(Stdio::from(file))
            .status()
            .map_err(|source| spawn_error(&rendered, legend, source))?;
        check_status(&rendered, status)
    }

    /// Run `producer | tee log | consumer`.
    ///
    /// Both ends must succeed. If the consumer stops reading early, the rest
    /// of the producer's output still goes to the log.
    pub fn run_tee(
        &self,
        producer: &mut Command,
        log: &Path,
        consumer: &mut Command,
        legend: &str,
    ) -> Result<(), ExecError> {
        let rendered = format!(
            "{} | tee {} | {}",
            render(producer),
            log.display(),
            render(consumer)
        );
        self.echo(&rendered, legend);
        let pipe_err = |source: std::io::Error| ExecError::Pipe {
            command: rendered.clone(),
            source,
        };

        let mut log_file = File::create(log).map_err(pipe_err)?;

        let mut producer_child = producer
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| spawn_error(&rendered, legend, source))?;
        let mut consumer_child = match consumer.stdin(Stdio::piped()).spawn() {
            Ok(child) => child,
            Err(source) => {
                let _ = producer_child.kill();
                let _ = producer_child.wait();
                return Err(spawn_error(&rendered, legend, source));
            }
        };

        let mut source_pipe = producer_child.stdout.take();
        let mut sink = consumer_child.stdin.take();
        let pumped = match source_pipe.as_mut() {
            Some(out) => pump(out, &mut log_file, &mut sink),
            None => Ok(()),
        };
        // Closing stdin lets the consumer see end of stream.
        drop(sink);
        drop(source_pipe);
        if let Err(e) = pumped {
            let _ = producer_child.kill();
            let _ = producer_child.wait();
            let _ = consumer_child.wait();
            return Err(pipe_err(e));
        }

        let producer_status = producer_child.wait().map_err(pipe_err)?;
        let consumer_status = consumer_child.wait().map_err(pipe_err)?;
        check_status(&render(producer), producer_status)?;
        check_status(&render(consumer), consumer_status)
    }

    fn echo(&self, rendered: &str, legend: &str) {
        if self.verbosity >= Verbosity::Commands {
            info!("Executing '{}'{}", rendered, legend_suffix(legend));
        } else {
            debug!(command = %rendered, "executing");
        }
    }
}

/// Copy `source` into `log` and, while it keeps reading, into `sink`.
fn pump(
    source: &mut impl Read,
    log: &mut impl Write,
    sink: &mut Option<impl Write>,
) -> std::io::Result<()> {
    let mut buf = [0u8; 8192];
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        log.write_all(&buf[..n])?;
        if let Some(stdin) = sink.as_mut() {
            if let Err(e) = stdin.write_all(&buf[..n]) {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(e);
                }
                warn!("consumer closed its input early");
                *sink = None;
            }
        }
    }
    log.flush()
}

/// Render a command as a single human-readable line.
pub fn render(cmd: &Command) -> String {
    let mut line = cmd.get_program().to_string_lossy().into_owned();
    for arg in cmd.get_args() {
        let arg = arg.to_string_lossy();
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            line.push('\'');
            line.push_str(&arg);
            line.push('\'');
        } else {
            line.push_str(&arg);
        }
    }
    line
}

fn legend_suffix(legend: &str) -> String {
    if legend.is_empty() {
        String::new()
    } else {
        format!(" ({})", legend)
    }
}

fn spawn_error(command: &str, legend: &str, source: std::io::Error) -> ExecError {
    ExecError::Spawn {
        command: command.to_string(),
        legend: legend_suffix(legend),
        source,
    }
}

/// Translate an exit status into the harness's fail-fast contract.
fn check_status(command: &str, status: ExitStatus) -> Result<(), ExecError> {
    if status.success() {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Err(ExecError::Signaled {
                command: command.to_string(),
                signal,
            });
        }
    }
    Err(ExecError::Failed {
        command: command.to_string(),
        code: status.code().unwrap_or(-1),
    })
}
