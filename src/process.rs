use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::process::{Command, ExitStatus};

use is_terminal::IsTerminal;

const TTY_PATH: &str = "/dev/tty";

/// Which standard streams a child needs connected to the user's terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Full-screen programs such as editors need both input and output.
    Full,
    /// `mv -i` style prompts only need to read the answer.
    Input,
}

/// Spawns one child, blocks until it exits and hands back its status.
pub trait CommandRunner {
    fn run(&mut self, program: &str, args: &[OsString], terminal: Terminal)
    -> io::Result<ExitStatus>;
}

/// Runs real processes. When our own stdin or stdout is redirected (names
/// piped in, commands piped out) the child gets `/dev/tty` for that stream
/// instead, so the user can still interact with it.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &mut self,
        program: &str,
        args: &[OsString],
        terminal: Terminal,
    ) -> io::Result<ExitStatus> {
        let mut command = Command::new(program);
        command.args(args);
        attach_terminal(&mut command, terminal);
        command.status()
    }
}

fn attach_terminal(command: &mut Command, terminal: Terminal) {
    let need_input = !io::stdin().is_terminal();
    let need_output = terminal == Terminal::Full && !io::stdout().is_terminal();
    if !need_input && !need_output {
        return;
    }
    let Some(tty) = open_tty() else {
        return;
    };
    if need_input {
        match tty.try_clone() {
            Ok(handle) => {
                command.stdin(handle);
            }
            Err(_) => return,
        }
    }
    if need_output {
        command.stdout(tty);
    }
}

fn open_tty() -> Option<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(TTY_PATH)
        .ok()
}
