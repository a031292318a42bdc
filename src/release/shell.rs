//! External command execution for `shell` steps
//!
//! The rendered command is handed to the configured shell as a single argument
//! (`<shell> -c <command>`, or `cmd /C <command>`), so pipes, redirects and
//! quoting behave exactly as typed. Callers that render untrusted field values
//! into commands inherit the usual shell injection hazards.
//!
//! Both output streams are drained on their own threads while the child runs;
//! a chatty child can never stall on a full pipe.

use crate::release::{StepFailure, StepOutcome};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long to wait for the reader threads after a timed-out child was killed
const DRAIN_AFTER_KILL: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One command invocation
#[derive(Debug, Clone)]
pub struct ShellCommand<'a> {
  /// Shell executable, e.g. `/bin/bash`
  pub program: &'a str,
  pub command: &'a str,
  pub workdir: Option<&'a Path>,
  /// Merged over the inherited environment
  pub env: &'a [(String, String)],
  pub timeout: Option<Duration>,
}

/// Captured result of a finished (or killed) command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
  /// `None` when the process was ended by a signal
  pub exit_code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
  pub timed_out: bool,
}

impl ShellOutput {
  pub fn success(&self) -> bool {
    !self.timed_out && self.exit_code == Some(0)
  }

  /// `stdout + stderr`, or `ok` when both are empty
  pub fn combined(&self) -> String {
    let combined = format!("{}{}", self.stdout, self.stderr);
    if combined.is_empty() { "ok".to_string() } else { combined }
  }

  /// Failure message for an unsuccessful run
  pub fn error_message(&self, timeout: Option<Duration>) -> Option<String> {
    if self.timed_out {
      let secs = timeout.map(|t| t.as_secs()).unwrap_or_default();
      return Some(format!("shell command timed out after {}s", secs));
    }
    match self.exit_code {
      Some(0) => None,
      Some(code) => Some(format!("shell command failed (exit {})", code)),
      None => Some("shell command terminated by signal".to_string()),
    }
  }
}

/// Flag the shell uses to take a command string
fn command_flag(program: &str) -> &'static str {
  let name = Path::new(program)
    .file_stem()
    .and_then(|s| s.to_str())
    .unwrap_or(program);
  if name.eq_ignore_ascii_case("cmd") { "/C" } else { "-c" }
}

/// Run a command to completion (or timeout) and capture its output
pub fn run(cmd: &ShellCommand<'_>) -> StepOutcome<ShellOutput> {
  let mut command = Command::new(cmd.program);
  command
    .arg(command_flag(cmd.program))
    .arg(cmd.command)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());
  if let Some(dir) = cmd.workdir {
    command.current_dir(dir);
  }
  for (key, value) in cmd.env {
    command.env(key, value);
  }

  let mut child = command
    .spawn()
    .map_err(|e| StepFailure::execution(format!("failed to start shell process {}: {}", cmd.program, e)))?;

  let stdout = spawn_reader(child.stdout.take());
  let stderr = spawn_reader(child.stderr.take());

  let waited = match cmd.timeout {
    None => child
      .wait()
      .map(|status| (Some(status), false))
      .map_err(|e| StepFailure::execution(format!("failed to wait for shell process: {}", e))),
    Some(timeout) => wait_with_deadline(&mut child, timeout),
  };
  let (status, timed_out) = match waited {
    Ok(waited) => waited,
    Err(failure) => {
      kill_and_reap(&mut child);
      let deadline = Instant::now() + DRAIN_AFTER_KILL;
      join_bounded(stdout, deadline);
      join_bounded(stderr, deadline);
      return Err(failure);
    }
  };

  let (stdout, stderr) = if timed_out {
    tracing::warn!(command = cmd.command, timeout_secs = cmd.timeout.map(|t| t.as_secs()), "shell command timed out");
    drop(child);
    let deadline = Instant::now() + DRAIN_AFTER_KILL;
    (join_bounded(stdout, deadline), join_bounded(stderr, deadline))
  } else {
    (join_reader(stdout), join_reader(stderr))
  };

  Ok(ShellOutput {
    exit_code: status.and_then(|s| s.code()),
    stdout,
    stderr,
    timed_out,
  })
}

/// Poll until the child exits or `timeout` elapses; on expiry kill and reap it.
/// A wait error leaves the child to the caller.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> StepOutcome<(Option<ExitStatus>, bool)> {
  let deadline = Instant::now() + timeout;
  loop {
    match child.try_wait() {
      Ok(Some(status)) => return Ok((Some(status), false)),
      Ok(None) => {}
      Err(e) => return Err(StepFailure::execution(format!("failed to wait for shell process: {}", e))),
    }
    if Instant::now() >= deadline {
      return Ok((kill_and_reap(child), true));
    }
    thread::sleep(POLL_INTERVAL);
  }
}

/// Kill the child (a no-op if it already exited) and collect its exit status
fn kill_and_reap(child: &mut Child) -> Option<ExitStatus> {
  let _ = child.kill();
  child.wait().ok()
}

type Reader = Option<JoinHandle<String>>;

fn spawn_reader<R: Read + Send + 'static>(stream: Option<R>) -> Reader {
  stream.map(|mut stream| {
    thread::spawn(move || {
      let mut buf = Vec::new();
      let _ = stream.read_to_end(&mut buf);
      String::from_utf8_lossy(&buf).into_owned()
    })
  })
}

fn join_reader(reader: Reader) -> String {
  reader.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Join a reader unless it is still blocked at `deadline` (a grandchild may hold the pipe)
fn join_bounded(reader: Reader, deadline: Instant) -> String {
  let Some(handle) = reader else {
    return String::new();
  };
  while !handle.is_finished() {
    if Instant::now() >= deadline {
      return String::new();
    }
    thread::sleep(POLL_INTERVAL);
  }
  handle.join().unwrap_or_default()
}
