//! External command execution.
//!
//! Provisioning steps are plain shell strings. They run through a [`Shell`]
//! so the CLI can swap in a dry run and tests can record what would run.

use crate::error::{CommandFailedDetails, Error, Result};
use serde::Serialize;
use std::cell::RefCell;
use std::process::Command;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

pub trait Shell {
    /// Run `command` and capture its output. Never fails; inspect `success`.
    fn execute(&self, command: &str) -> CommandOutput;

    /// Commands issued so far, for shells that keep a log.
    fn history(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Run `command` and turn a non-zero exit into `command.failed`.
///
/// `display` is what gets logged and reported; pass a masked form when the
/// command embeds credentials.
pub fn run(shell: &dyn Shell, command: &str, display: &str) -> Result<CommandOutput> {
    log_status!("shell", "{}", display);
    let output = shell.execute(command);

    if !output.success {
        return Err(Error::command_failed(CommandFailedDetails {
            command: display.to_string(),
            exit_code: output.exit_code,
            stdout: output.stdout.trim().to_string(),
            stderr: output.stderr.trim().to_string(),
        }));
    }

    Ok(output)
}

/// Runs commands with `sh -c` on this machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalShell;

impl Shell for LocalShell {
    fn execute(&self, command: &str) -> CommandOutput {
        match Command::new("sh").args(["-c", command]).output() {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput {
                stdout: String::new(),
                stderr: format!("Command error: {}", e),
                success: false,
                exit_code: -1,
            },
        }
    }
}

/// Records commands without running them; every command "succeeds".
#[derive(Debug, Default)]
pub struct DryRunShell {
    issued: RefCell<Vec<String>>,
}

impl DryRunShell {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Shell for DryRunShell {
    fn execute(&self, command: &str) -> CommandOutput {
        self.issued.borrow_mut().push(command.to_string());
        CommandOutput {
            success: true,
            ..CommandOutput::default()
        }
    }

    fn history(&self) -> Vec<String> {
        self.issued.borrow().clone()
    }
}
