//! Editor round trip over a scratch manifest.
//!
//! The names are written one per line to a scratch file named after our
//! process id, the user's editor is run on it, and the lines are read back
//! and paired with the names by position. Pairing is all or nothing: a
//! missing or inserted line aborts the run before anything is renamed.

use std::env;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{self, ExitStatus};

use thiserror::Error;

use crate::line_reader::{LineError, LineReader};
use crate::names::NameList;
use crate::process::{CommandRunner, Terminal};

/// Environment variables consulted for the editor, in order.
pub const EDITOR_VARS: [&str; 2] = ["EDITOR", "VISUAL"];

const SCRATCH_PREFIX: &str = "edrename";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no editor configured; set EDITOR or VISUAL")]
    NoEditor,
    #[error("cannot parse editor command '{0}'")]
    BadEditor(String),
    #[error("creating scratch file {path:?}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("writing scratch file {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("editor '{program}' failed ({status})")]
    EditorFailed { program: String, status: ExitStatus },
    #[error("reading back {path:?}")]
    ReadBack {
        path: PathBuf,
        #[source]
        source: LineError,
    },
    #[error("missing lines: expected {expected}, found {found}")]
    MissingLines { expected: usize, found: usize },
    #[error("surplus line {line}: expected {expected}; lines must be edited in place, not inserted")]
    SurplusLines { expected: usize, line: usize },
}

/// Editor program plus any arguments that precede the manifest path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorCommand {
    program: String,
    args: Vec<String>,
}

impl EditorCommand {
    /// Splits `raw` with shell word rules, so `code --wait` works.
    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        let mut words = shlex::split(raw)
            .filter(|words| !words.is_empty())
            .ok_or_else(|| ManifestError::BadEditor(raw.to_string()))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| ManifestError::BadEditor(raw.to_string()))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    /// First non-blank candidate among `explicit` and [`EDITOR_VARS`].
    pub fn resolve<F>(explicit: Option<&str>, lookup: F) -> Result<Self, ManifestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let candidate = explicit
            .map(str::to_string)
            .into_iter()
            .chain(EDITOR_VARS.iter().filter_map(|var| lookup(var)))
            .find(|value| !value.trim().is_empty())
            .ok_or(ManifestError::NoEditor)?;
        Self::parse(&candidate)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn invoke(&self, manifest: &Path, runner: &mut dyn CommandRunner) -> Result<(), ManifestError> {
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.push(manifest.as_os_str().to_owned());
        let status = runner
            .run(&self.program, &args, Terminal::Full)
            .map_err(|source| ManifestError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(ManifestError::EditorFailed {
                program: self.program.clone(),
                status,
            });
        }
        Ok(())
    }
}

/// Scratch manifest that is removed when dropped, on every exit path.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Creates `<dir>/edrename.<pid>` readable and writable by the owner
    /// only. A stale file left by an earlier process with the same id is
    /// replaced.
    pub fn create(dir: &Path) -> Result<(Self, File), ManifestError> {
        let path = dir.join(format!("{SCRATCH_PREFIX}.{}", process::id()));
        let file = match open_exclusive(&path) {
            Err(err) if err.kind() == ErrorKind::AlreadyExists => fs::remove_file(&path)
                .and_then(|_| open_exclusive(&path)),
            other => other,
        }
        .map_err(|source| ManifestError::Create {
            path: path.clone(),
            source,
        })?;
        Ok((Self { path }, file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn open_exclusive(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

pub struct ManifestEditor {
    editor: EditorCommand,
    scratch_dir: PathBuf,
}

impl ManifestEditor {
    pub fn new(editor: EditorCommand) -> Self {
        Self {
            editor,
            scratch_dir: env::temp_dir(),
        }
    }

    #[cfg(test)]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn editor(&self) -> &EditorCommand {
        &self.editor
    }

    /// Runs the round trip and fills in every replacement, or fails without
    /// touching any of them.
    pub fn edit(
        &self,
        names: &mut NameList,
        runner: &mut dyn CommandRunner,
    ) -> Result<(), ManifestError> {
        let (scratch, file) = ScratchFile::create(&self.scratch_dir)?;
        write_manifest(file, names).map_err(|source| ManifestError::Write {
            path: scratch.path().to_path_buf(),
            source,
        })?;
        self.editor.invoke(scratch.path(), runner)?;
        let lines = read_back(scratch.path(), names.len())?;
        names.assign_replacements(lines);
        Ok(())
    }
}

fn write_manifest(file: File, names: &NameList) -> io::Result<()> {
    let mut writer = BufWriter::new(file);
    for entry in names {
        writer.write_all(entry.original())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// Reads exactly `expected` lines. Blank lines after them are tolerated;
/// anything else means the user inserted a line and positions no longer
/// line up.
pub fn read_back(path: &Path, expected: usize) -> Result<Vec<Vec<u8>>, ManifestError> {
    let read_err = |source: LineError| ManifestError::ReadBack {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|err| read_err(LineError::Io(err)))?;
    let mut reader = LineReader::new(file);

    let mut lines = Vec::with_capacity(expected);
    while lines.len() < expected {
        match reader.next_line().map_err(read_err)? {
            Some(line) => lines.push(line.to_vec()),
            None => {
                return Err(ManifestError::MissingLines {
                    expected,
                    found: lines.len(),
                });
            }
        }
    }
    while let Some(line) = reader.next_line().map_err(read_err)? {
        if !line.is_empty() {
            return Err(ManifestError::SurplusLines {
                expected,
                line: reader.lines_read(),
            });
        }
    }
    Ok(lines)
}
