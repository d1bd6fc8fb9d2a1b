//! External process helpers: availability checks and command execution.

use std::io;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use log::debug;

use crate::error::{Error, Result};

/// Check that `tool` can be started, by asking it for its version.
pub fn require(tool: &str) -> Result<()> {
    let status = Command::new(tool)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => {
            debug!("found {}", tool);
            Ok(())
        }
        _ => Err(Error::MissingDependency {
            tool: tool.to_string(),
        }),
    }
}

/// Run `command` to completion and capture its output. A spawn failure because
/// the program does not exist becomes `MissingDependency { tool }`.
pub(crate) fn output(command: &mut Command, tool: &str, display: &str) -> Result<Output> {
    command.stdin(Stdio::null()).output().map_err(|e| spawn_error(e, tool, display))
}

/// Run `command_line` through the platform shell in `directory`, with the
/// child's output going straight to this process's stdout and stderr.
pub fn run_shell(directory: &Path, command_line: &str) -> Result<()> {
    let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
    debug!("{} {} {:?} (in {})", shell, flag, command_line, directory.display());

    let status = Command::new(shell)
        .args([flag, command_line])
        .current_dir(directory)
        .status()
        .map_err(|e| spawn_error(e, shell, command_line))?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::CommandFailed {
            command: command_line.to_string(),
            stderr: match status.code() {
                Some(code) => format!("exited with status {}", code),
                None => "terminated by signal".to_string(),
            },
        })
    }
}

/// Build a shell command line from separate arguments.
///
/// A single argument is taken as a complete command line, so that
/// `run -- "npm test && npm run lint"` keeps its shell syntax. Several
/// arguments are each quoted so the shell sees exactly those words.
pub fn command_line<S: AsRef<str>>(args: &[S]) -> String {
    match args {
        [only] => only.as_ref().to_string(),
        _ => args
            .iter()
            .map(|arg| quote(arg.as_ref()))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        arg.to_string()
    } else if cfg!(windows) {
        format!("\"{}\"", arg.replace('"', "\"\""))
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

fn spawn_error(error: io::Error, tool: &str, display: &str) -> Error {
    if error.kind() == io::ErrorKind::NotFound {
        Error::MissingDependency {
            tool: tool.to_string(),
        }
    } else {
        Error::CommandFailed {
            command: display.to_string(),
            stderr: error.to_string(),
        }
    }
}
