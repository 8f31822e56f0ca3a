use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use thiserror::Error;

use crate::logging::ChangeLog;
use crate::names::{NameList, bytes_to_path};
use crate::process::{CommandRunner, Terminal};
use crate::quote::command_line;

/// Verbose and interactive, then the end-of-options marker.
const EXECUTOR_FLAGS: [&str; 2] = ["-vi", "--"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Rename,
    Copy,
}

impl Mode {
    pub fn program(self) -> &'static str {
        match self {
            Mode::Rename => "mv",
            Mode::Copy => "cp",
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            Mode::Rename => "rename",
            Mode::Copy => "copy",
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            Mode::Rename => "renamed",
            Mode::Copy => "copied",
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("failed to spawn '{program}'")]
    Spawn {
        program: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("'{program}' {from:?} -> {to:?} failed ({status}); earlier operations were kept")]
    Failed {
        program: &'static str,
        from: PathBuf,
        to: PathBuf,
        status: ExitStatus,
    },
    #[error("writing command for {from:?}")]
    Output {
        from: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One differing pair, with both names joined onto the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Pairs whose replacement differs from the original, in list order.
pub fn plan(names: &NameList, dir: &Path) -> Vec<Operation> {
    names
        .iter()
        .filter_map(|entry| {
            let replacement = entry.change()?;
            Some(Operation {
                from: dir.join(bytes_to_path(entry.original())),
                to: dir.join(bytes_to_path(replacement)),
            })
        })
        .collect()
}

pub struct ActionExecutor<'a> {
    mode: Mode,
    dir: &'a Path,
    display_only: bool,
    change_log: Option<&'a ChangeLog>,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(mode: Mode, dir: &'a Path) -> Self {
        Self {
            mode,
            dir,
            display_only: false,
            change_log: None,
        }
    }

    pub fn display_only(mut self, display_only: bool) -> Self {
        self.display_only = display_only;
        self
    }

    pub fn with_change_log(mut self, change_log: Option<&'a ChangeLog>) -> Self {
        self.change_log = change_log;
        self
    }

    /// Runs one executor child per changed name, strictly in order, and
    /// stops at the first failure. Returns how many operations went ahead.
    /// In display-only mode the commands are written to `out` instead.
    pub fn apply(
        &self,
        names: &NameList,
        runner: &mut dyn CommandRunner,
        out: &mut dyn Write,
    ) -> Result<usize, ActionError> {
        let program = self.mode.program();
        let mut performed = 0usize;

        for operation in plan(names, self.dir) {
            if self.display_only {
                out.write_all(&command_line(
                    program,
                    &EXECUTOR_FLAGS,
                    &operation.from,
                    &operation.to,
                ))
                .map_err(|source| ActionError::Output {
                    from: operation.from.clone(),
                    source,
                })?;
                performed += 1;
                continue;
            }

            let mut args: Vec<OsString> = EXECUTOR_FLAGS.iter().map(OsString::from).collect();
            args.push(operation.from.clone().into_os_string());
            args.push(operation.to.clone().into_os_string());
            let status = runner
                .run(program, &args, Terminal::Input)
                .map_err(|source| ActionError::Spawn { program, source })?;
            if !status.success() {
                return Err(ActionError::Failed {
                    program,
                    from: operation.from,
                    to: operation.to,
                    status,
                });
            }
            performed += 1;
            self.log(&operation);
        }

        out.flush().map_err(|source| ActionError::Output {
            from: self.dir.to_path_buf(),
            source,
        })?;
        Ok(performed)
    }

    fn log(&self, operation: &Operation) {
        let Some(log) = self.change_log else {
            return;
        };
        if let Err(err) = log.record(
            self.mode.command(),
            &operation.from,
            &operation.to,
            self.mode.verb(),
        ) {
            eprintln!(
                "warning: could not record {} in {}: {err:#}",
                operation.from.display(),
                log.path().display()
            );
        }
    }
}

/// Final user-facing line, e.g. `1 file renamed` or `3 files copied`.
pub fn report(count: usize, mode: Mode, display_only: bool) -> String {
    let plural = if count == 1 { "" } else { "s" };
    if display_only {
        format!("{count} {} command{plural} printed", mode.command())
    } else {
        format!("{count} file{plural} {}", mode.verb())
    }
}
