//! Running external tools, with privilege escalation when it is needed.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use which::which;

use crate::error::{Error, Result};

/// A program, its arguments and what it needs from the environment.
#[derive(Debug, Clone)]
pub struct CommandLine {
    program: PathBuf,
    args: Vec<OsString>,
    stdin: Option<Vec<u8>>,
    env: Vec<(String, OsString)>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandLine {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Sets a variable that is also carried across escalation.
    pub fn env(mut self, key: impl Into<String>, value: impl AsRef<OsStr>) -> Self {
        self.env.push((key.into(), value.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(self.env.iter().map(|(k, v)| (k, v)));
        cmd
    }

    fn escalated(&self, helper: &Path, separator: bool) -> Command {
        let mut cmd = Command::new(helper);
        if separator {
            cmd.arg("--");
        }
        cmd.arg(&self.program).args(&self.args);
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// When a command should be run with elevated rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    Never,
    /// Escalate up front; for writes into root-owned locations.
    Always,
    /// Run unprivileged and retry escalated if the failed run printed this.
    OnFailure(&'static str),
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub status: String,
    /// stdout followed by stderr.
    pub combined: Vec<u8>,
}

impl CommandOutput {
    pub fn contains(&self, needle: &str) -> bool {
        let needle = needle.as_bytes();
        !needle.is_empty()
            && self
                .combined
                .windows(needle.len())
                .any(|w| w == needle)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.combined).into_owned()
    }

    /// Turns an unsuccessful exit into `Error::CommandFailed`.
    pub fn check(self, cmd: &CommandLine) -> Result<CommandOutput> {
        if self.success {
            Ok(self)
        } else {
            Err(Error::CommandFailed {
                command: cmd.to_string(),
                reason: self.status.clone(),
                output: self.text(),
            })
        }
    }
}

/// Runs commands, prefixing them with an escalation helper (`sudo`) when
/// required and available.
#[derive(Debug, Clone)]
pub struct Runner {
    helper: Option<PathBuf>,
    elevated: bool,
}

impl Runner {
    /// Looks up `sudo` on `PATH` and whether the process is already root.
    pub fn detect() -> Self {
        let helper = if cfg!(windows) { None } else { which("sudo").ok() };
        Runner {
            helper,
            elevated: is_elevated(),
        }
    }

    /// A runner that never escalates.
    pub fn unprivileged() -> Self {
        Runner {
            helper: None,
            elevated: false,
        }
    }

    pub fn with_helper(helper: impl Into<PathBuf>) -> Self {
        Runner {
            helper: Some(helper.into()),
            elevated: false,
        }
    }

    fn escalation_helper(&self) -> Option<&Path> {
        if self.elevated || cfg!(windows) {
            return None;
        }
        self.helper.as_deref()
    }

    /// Runs the command. A non-zero exit is reported through
    /// `CommandOutput::success`; only a failure to spawn is an error.
    pub fn run(&self, cmd: &CommandLine, escalation: Escalation) -> Result<CommandOutput> {
        match (escalation, self.escalation_helper()) {
            (Escalation::Always, Some(helper)) => {
                log::debug!("Executing {} {}", helper.display(), cmd);
                let mut escalated = cmd.escalated(helper, true);
                escalated.envs(cmd.env.iter().map(|(k, v)| (k, v)));
                execute(escalated, cmd)
            }
            (Escalation::OnFailure(signature), Some(helper)) => {
                log::debug!("Executing {}", cmd);
                let out = execute(cmd.command(), cmd)?;
                if out.success || !out.contains(signature) {
                    return Ok(out);
                }

                log::debug!("retrying with {}: {}", helper.display(), cmd);
                let mut escalated = cmd.escalated(helper, false);
                escalated
                    .env_clear()
                    .envs(cmd.env.iter().map(|(k, v)| (k, v)));
                execute(escalated, cmd)
            }
            _ => {
                log::debug!("Executing {}", cmd);
                execute(cmd.command(), cmd)
            }
        }
    }

    /// `run` followed by `CommandOutput::check`.
    pub fn run_checked(&self, cmd: &CommandLine, escalation: Escalation) -> Result<CommandOutput> {
        self.run(cmd, escalation)?.check(cmd)
    }
}

fn execute(mut command: Command, cmd: &CommandLine) -> Result<CommandOutput> {
    let spawn_error = |e: std::io::Error| Error::CommandFailed {
        command: cmd.to_string(),
        reason: e.to_string(),
        output: String::new(),
    };

    command
        .stdin(if cmd.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(spawn_error)?;
    let stdin = child.stdin.take();

    // stdin is fed while the output pipes drain, so tools that echo their
    // input (tee) cannot fill the stdout pipe and stall
    let output = std::thread::scope(|scope| {
        if let (Some(input), Some(mut stdin)) = (cmd.stdin.as_deref(), stdin) {
            scope.spawn(move || {
                // a child that exits without reading reports through its status
                if let Err(e) = stdin.write_all(input) {
                    log::debug!("writing stdin of {}: {}", cmd, e);
                }
            });
        }
        child.wait_with_output()
    })
    .map_err(spawn_error)?;
    let mut combined = output.stdout;
    combined.extend_from_slice(&output.stderr);

    Ok(CommandOutput {
        success: output.status.success(),
        status: output.status.to_string(),
        combined,
    })
}

#[cfg(unix)]
fn is_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_elevated() -> bool {
    false
}
