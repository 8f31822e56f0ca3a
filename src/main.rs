use std::env;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, ArgGroup, Parser, ValueHint};

mod actions;
mod collect;
mod line_reader;
mod logging;
mod manifest;
mod names;
mod process;
mod quote;

use actions::{ActionExecutor, Mode, report};
use collect::{Pattern, Source, Syntax};
use logging::ChangeLog;
use manifest::{EditorCommand, ManifestEditor};
use process::{CommandRunner, SystemRunner};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let session = Session::from_cli(cli, |var| env::var(var).ok())?;
    let outcome = {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        session.run(io::stdin().lock(), &mut SystemRunner, &mut out)?
    };

    let message = match outcome {
        Outcome::NoMatches => match &session.source {
            Source::Directory(pattern) => format!(
                "no matching files in {} for '{}'",
                session.dir.display(),
                pattern.as_str()
            ),
            Source::Stream => "no matching files: no names on standard input".to_string(),
        },
        Outcome::Applied(count) => report(count, session.mode, session.display_only),
    };
    // With -o, stdout carries nothing but the commands.
    if session.display_only {
        eprintln!("{message}");
    } else {
        println!("{message}");
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    NoMatches,
    Applied(usize),
}

/// Everything resolved from the command line and environment before any
/// file is read or written.
struct Session {
    source: Source,
    dir: PathBuf,
    mode: Mode,
    display_only: bool,
    editor: ManifestEditor,
    change_log: Option<ChangeLog>,
}

impl Session {
    fn from_cli<F>(cli: Cli, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = match (cli.stdin, cli.basic, cli.extended) {
            (true, _, _) => Source::Stream,
            (false, Some(expr), _) => Source::Directory(Pattern::new(&expr, Syntax::Basic)?),
            (false, None, Some(expr)) => {
                Source::Directory(Pattern::new(&expr, Syntax::Extended)?)
            }
            (false, None, None) => bail!("one of -e, -E or -i is required"),
        };
        let editor = EditorCommand::resolve(cli.editor.as_deref(), lookup)?;
        let mode = if cli.copy { Mode::Copy } else { Mode::Rename };

        Ok(Self {
            source,
            dir: cli.dir,
            mode,
            display_only: cli.output_only,
            editor: ManifestEditor::new(editor),
            change_log: cli.log.map(ChangeLog::new),
        })
    }

    fn run<R: Read>(
        &self,
        stdin: R,
        runner: &mut dyn CommandRunner,
        out: &mut dyn Write,
    ) -> Result<Outcome> {
        let Some(mut names) = collect::collect(&self.source, &self.dir, stdin)? else {
            return Ok(Outcome::NoMatches);
        };

        self.editor.edit(&mut names, runner).with_context(|| {
            format!(
                "editing {} name(s) with '{}'",
                names.len(),
                self.editor.editor().program()
            )
        })?;

        let performed = ActionExecutor::new(self.mode, &self.dir)
            .display_only(self.display_only)
            .with_change_log(self.change_log.as_ref())
            .apply(&names, runner, out)
            .with_context(|| format!("{} aborted", self.mode.command()))?;
        Ok(Outcome::Applied(performed))
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "edrename",
    version,
    about = "Rename or copy files by editing their names in $EDITOR",
    after_help = "Edit names in place only: deleting, inserting or reordering lines aborts the run."
)]
#[command(group(ArgGroup::new("names").required(true).args(["basic", "extended", "stdin"])))]
struct Cli {
    /// Copy instead of rename
    #[arg(short = 'c', long = "copy", action = ArgAction::SetTrue)]
    copy: bool,
    /// Search and operate in DIR instead of the current directory
    #[arg(short = 'd', long = "dir", value_name = "DIR", default_value = ".", value_hint = ValueHint::DirPath)]
    dir: PathBuf,
    /// Select entries matching a basic regular expression
    #[arg(short = 'e', long = "regexp", value_name = "REGEXP")]
    basic: Option<String>,
    /// Select entries matching an extended regular expression
    #[arg(short = 'E', long = "extended-regexp", value_name = "REGEXP")]
    extended: Option<String>,
    /// Read the names from standard input, one per line
    #[arg(short = 'i', long = "stdin", action = ArgAction::SetTrue)]
    stdin: bool,
    /// Print the equivalent shell commands instead of running them
    #[arg(short = 'o', long = "output-only", action = ArgAction::SetTrue)]
    output_only: bool,
    /// Editor command; defaults to $EDITOR, then $VISUAL
    #[arg(long, value_name = "CMD")]
    editor: Option<String>,
    /// Append every performed operation to FILE as JSON lines
    #[arg(long = "log", value_name = "FILE", value_hint = ValueHint::FilePath)]
    log: Option<PathBuf>,
}
