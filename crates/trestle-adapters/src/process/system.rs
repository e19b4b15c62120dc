//! Hook execution with `std::process`.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};
use trestle_core::{
    application::{
        ApplicationError,
        cancellation::CancellationToken,
        ports::{CommandSpec, ProcessOutput, ProcessRunner, Termination},
    },
    error::{TrestleError, TrestleResult},
};

/// Production process runner.
///
/// Spawns the program directly (no shell), captures stdout and stderr on
/// reader threads, and polls for exit so that timeouts and cancellation can
/// kill the child.
///
/// On unix the child leads its own process group and the whole group is
/// killed, so grandchildren do not outlive a timed-out hook. Output readers
/// are given `drain_grace` after exit; a pipe still held open past that is
/// abandoned rather than waited on.
#[derive(Debug, Clone, Copy)]
pub struct SystemProcessRunner {
    poll_interval: Duration,
    drain_grace: Duration,
}

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            drain_grace: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner for SystemProcessRunner {
    #[instrument(skip_all, fields(program = %command.program))]
    fn run(&self, command: &CommandSpec, cancel: &CancellationToken) -> TrestleResult<ProcessOutput> {
        if command.program.is_empty() {
            return Err(spawn_error(command, "empty command"));
        }

        let started = Instant::now();
        let mut builder = Command::new(&command.program);
        builder
            .args(&command.args)
            .current_dir(&command.working_dir)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt as _;
            builder.process_group(0);
        }
        let mut child = builder
            .spawn()
            .map_err(|e| spawn_error(command, &e.to_string()))?;
        debug!(pid = child.id(), "Spawned");

        let stdout = capture(child.stdout.take());
        let stderr = capture(child.stderr.take());

        let (exit_code, termination) = self.wait(&mut child, command, cancel)?;

        let drain_until = Instant::now() + self.drain_grace;
        Ok(ProcessOutput {
            exit_code,
            stdout: collect(stdout, drain_until),
            stderr: collect(stderr, drain_until),
            termination,
            duration: started.elapsed(),
        })
    }
}

impl SystemProcessRunner {
    fn wait(
        &self,
        child: &mut Child,
        command: &CommandSpec,
        cancel: &CancellationToken,
    ) -> TrestleResult<(Option<i32>, Termination)> {
        let deadline = Instant::now() + command.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok((status.code(), Termination::Exited)),
                Ok(None) => {}
                Err(e) => return Err(spawn_error(command, &e.to_string())),
            }

            let termination = if cancel.is_cancelled() {
                Some(Termination::Cancelled)
            } else if Instant::now() >= deadline {
                Some(Termination::TimedOut)
            } else {
                None
            };

            if let Some(termination) = termination {
                warn!(?termination, "Killing process");
                kill_tree(child);
                let _ = child.wait();
                return Ok((None, termination));
            }

            thread::sleep(self.poll_interval);
        }
    }
}

/// Kill the child and, on unix, every process in its group.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        match Command::new("kill")
            .args(["-KILL", "--", &group])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => return,
            Ok(status) => debug!(%status, "Group kill failed, killing child only"),
            Err(e) => debug!(error = %e, "Group kill unavailable, killing child only"),
        }
    }
    if let Err(e) = child.kill() {
        debug!(error = %e, "Kill failed, process probably exited");
    }
}

fn capture<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

/// Output of a reader thread, or empty if the pipe is still open at `deadline`.
fn collect(reader: Option<Receiver<String>>, deadline: Instant) -> String {
    let Some(reader) = reader else {
        return String::new();
    };
    let wait = deadline.saturating_duration_since(Instant::now());
    reader.recv_timeout(wait).unwrap_or_else(|_| {
        debug!("Output pipe still held open, abandoning reader");
        String::new()
    })
}

fn spawn_error(command: &CommandSpec, reason: &str) -> TrestleError {
    ApplicationError::ProcessFailed {
        program: command.program.clone(),
        reason: reason.into(),
    }
    .into()
}
