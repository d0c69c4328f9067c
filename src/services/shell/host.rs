//! Process host for the panel's shell.
//!
//! Owns the child process and the write end of its stdin. The stdout/stderr
//! read ends are handed over once to the output relay via
//! [`ShellHost::take_output`].

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

use super::error::{SpawnError, WriteError};

/// Program, arguments and working directory used to launch the shell.
///
/// Resolved once when the panel is constructed (see
/// [`crate::config::PanelConfig::shell_command`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Platform default: `bash` on Linux and macOS, `cmd.exe /K` on Windows
    /// (keeps the command interpreter open), `sh` anywhere else.
    pub fn platform_default() -> Self {
        let (program, args) = detect_shell();
        Self::new(program).with_args(args)
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Detect the shell program (and its default arguments) for this platform.
pub fn detect_shell() -> (&'static str, Vec<&'static str>) {
    if cfg!(windows) {
        ("cmd.exe", vec!["/K"])
    } else if cfg!(any(target_os = "linux", target_os = "macos")) {
        ("bash", Vec::new())
    } else {
        ("sh", Vec::new())
    }
}

/// How the shell process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ProcessExit {
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn from_signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "{code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown"),
        }
    }
}

/// The read ends of the child's output pipes.
pub struct ShellOutput {
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// The seam between the session state machine and a running shell.
///
/// [`ShellHost`] is the real implementation; tests drive the session with
/// a scripted one.
pub trait ShellProcess: Send {
    /// Write `text` followed by a line terminator and flush.
    fn submit_line(&mut self, text: &str) -> Result<(), WriteError>;

    /// Ask the process to stop, waiting up to `grace` before killing it.
    /// A no-op once the process has exited.
    fn terminate(&mut self, grace: Duration);

    /// Non-blocking exit check.
    fn poll_exit(&mut self) -> Option<ProcessExit>;

    fn pid(&self) -> Option<u32>;
}

/// Owns one child shell process.
pub struct ShellHost {
    command: ShellCommand,
    child: Child,
    stdin: Option<ChildStdin>,
    output: Option<ShellOutput>,
    exit: Option<ProcessExit>,
}

impl ShellHost {
    /// Launch the shell with all three standard streams piped.
    pub fn start(command: &ShellCommand) -> Result<Self, SpawnError> {
        let mut builder = Command::new(&command.program);
        builder
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &command.working_dir {
            if !dir.is_dir() {
                return Err(SpawnError::InvalidWorkingDir {
                    path: dir.display().to_string(),
                });
            }
            builder.current_dir(dir);
        }

        let mut child = builder
            .spawn()
            .map_err(|e| SpawnError::from_io(&command.program, e))?;

        let stdin = child.stdin.take();
        let output = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => Some(ShellOutput { stdout, stderr }),
            _ => None,
        };

        tracing::info!("Started shell '{}' (pid {})", command, child.id());

        Ok(Self {
            command: command.clone(),
            child,
            stdin,
            output,
            exit: None,
        })
    }

    /// Hand the output pipes to the relay. Returns `None` after the first call.
    pub fn take_output(&mut self) -> Option<ShellOutput> {
        self.output.take()
    }

    fn record_exit(&mut self, status: ExitStatus) -> ProcessExit {
        let exit = ProcessExit::from(status);
        if self.exit.is_none() {
            tracing::info!("Shell '{}' exited ({})", self.command.program, exit);
        }
        self.exit = Some(exit);
        // Nothing can be delivered any more
        self.stdin = None;
        exit
    }

    /// Request a soft stop. Closing stdin first lets line-reading shells exit
    /// on EOF; SIGTERM covers the rest.
    #[cfg(unix)]
    fn request_stop(&mut self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        self.stdin = None;
        let pid = Pid::from_raw(self.child.id() as i32);
        if let Err(e) = kill(pid, Signal::SIGTERM) {
            tracing::debug!("SIGTERM to pid {} failed: {}", pid, e);
        }
    }

    fn force_kill(&mut self) {
        if let Err(e) = self.child.kill() {
            tracing::debug!("Kill of shell pid {} failed: {}", self.child.id(), e);
        }
        match self.child.wait() {
            Ok(status) => {
                self.record_exit(status);
            }
            Err(e) => {
                tracing::warn!("Failed to reap shell pid {}: {}", self.child.id(), e);
            }
        }
    }
}

impl ShellProcess for ShellHost {
    fn submit_line(&mut self, text: &str) -> Result<(), WriteError> {
        if self.poll_exit().is_some() {
            return Err(WriteError::NotRunning);
        }
        let stdin = self.stdin.as_mut().ok_or(WriteError::NotRunning)?;

        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');

        stdin.write_all(line.as_bytes())?;
        stdin.flush()?;
        tracing::debug!("Sent {} bytes to shell stdin", line.len());
        Ok(())
    }

    fn terminate(&mut self, grace: Duration) {
        if self.poll_exit().is_some() {
            return;
        }

        tracing::info!(
            "Terminating shell '{}' (pid {}), grace {:?}",
            self.command.program,
            self.child.id(),
            grace
        );

        #[cfg(unix)]
        {
            self.request_stop();
            match self.child.wait_timeout(grace) {
                Ok(Some(status)) => {
                    self.record_exit(status);
                    return;
                }
                Ok(None) => {
                    tracing::warn!(
                        "Shell pid {} still running after {:?}, killing",
                        self.child.id(),
                        grace
                    );
                }
                Err(e) => {
                    tracing::warn!("Waiting for shell pid {} failed: {}", self.child.id(), e);
                }
            }
        }

        #[cfg(not(unix))]
        {
            // No soft stop for console processes without a window; closing
            // stdin is the closest equivalent.
            self.stdin = None;
            if let Ok(Some(status)) = self.child.wait_timeout(grace) {
                self.record_exit(status);
                return;
            }
        }

        self.force_kill();
    }

    fn poll_exit(&mut self) -> Option<ProcessExit> {
        if self.exit.is_some() {
            return self.exit;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => Some(self.record_exit(status)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to poll shell pid {}: {}", self.child.id(), e);
                None
            }
        }
    }

    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }
}

impl Drop for ShellHost {
    fn drop(&mut self) {
        if self.poll_exit().is_none() {
            tracing::debug!("Shell host dropped while running, killing pid {}", self.child.id());
            self.force_kill();
        }
    }
}
