//! Scripted process runner for tests and dry runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use trestle_core::{
    application::{
        ApplicationError,
        cancellation::CancellationToken,
        ports::{CommandSpec, ProcessOutput, ProcessRunner, Termination},
    },
    error::TrestleResult,
};

/// What a scripted program does when run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedResponse {
    Exit { code: i32, stdout: String, stderr: String },
    TimeOut,
    /// The program cannot be started.
    Missing,
}

impl ScriptedResponse {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::Exit {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn fail(code: i32, stderr: impl Into<String>) -> Self {
        Self::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs nothing; answers by program name and records every call.
///
/// Programs with no scripted response succeed with empty output. Clones share
/// the call log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProcessRunner {
    responses: Arc<Mutex<HashMap<String, ScriptedResponse>>>,
    calls: Arc<Mutex<Vec<CommandSpec>>>,
}

impl ScriptedProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, program: impl Into<String>, response: ScriptedResponse) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(program.into(), response);
        }
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Program and arguments of every call, joined.
    pub fn call_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::display_line).collect()
    }
}

impl ProcessRunner for ScriptedProcessRunner {
    fn run(&self, command: &CommandSpec, cancel: &CancellationToken) -> TrestleResult<ProcessOutput> {
        self.calls
            .lock()
            .map_err(|_| ApplicationError::StoreLockError)?
            .push(command.clone());

        if cancel.is_cancelled() {
            return Ok(ProcessOutput {
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                termination: Termination::Cancelled,
                duration: Duration::ZERO,
            });
        }

        let response = self
            .responses
            .lock()
            .map_err(|_| ApplicationError::StoreLockError)?
            .get(&command.program)
            .cloned()
            .unwrap_or_else(|| ScriptedResponse::ok(""));

        match response {
            ScriptedResponse::Exit {
                code,
                stdout,
                stderr,
            } => Ok(ProcessOutput {
                exit_code: Some(code),
                stdout,
                stderr,
                termination: Termination::Exited,
                duration: Duration::from_millis(1),
            }),
            ScriptedResponse::TimeOut => Ok(ProcessOutput {
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                termination: Termination::TimedOut,
                duration: command.timeout,
            }),
            ScriptedResponse::Missing => Err(ApplicationError::ProcessFailed {
                program: command.program.clone(),
                reason: "No such file or directory".into(),
            }
            .into()),
        }
    }
}
