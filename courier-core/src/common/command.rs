/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! Command execution for the `command_sync` / `command_async` operation
//! family.

use std::path::Path;
use std::process::Stdio;

use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::message::{FrameError, COMMAND_ASYNC, COMMAND_FIELD, COMMAND_SYNC, OPERATION_FIELD};

/// Result of running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command ran to completion (sync). `status` is `None` when the
    /// process was terminated by a signal.
    Completed {
        /// Process exit status.
        status: Option<i32>,
    },
    /// The command was spawned without waiting (async).
    Spawned {
        /// OS process id, when still known at return time.
        pid: Option<u32>,
    },
}

/// A validated command document extracted from a frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    operation: String,
    command: String,
}

impl CommandRequest {
    /// Extracts a command request from a verified frame body.
    ///
    /// The body must carry a command-family `operation` and a `command`
    /// field; [`validate`](crate::message::validate) guarantees both for
    /// frames that reached dispatch, so this mostly re-checks documents
    /// assembled in-process.
    pub fn from_body(document: &Value) -> Result<Self, FrameError> {
        let operation = document
            .get(OPERATION_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| FrameError::MissingRequiredField(OPERATION_FIELD.to_string()))?;
        if operation != COMMAND_SYNC && operation != COMMAND_ASYNC {
            return Err(FrameError::InvalidCommand(format!(
                "'{operation}' is not a command operation"
            )));
        }
        let command = document
            .get(COMMAND_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| FrameError::MissingRequiredField(COMMAND_FIELD.to_string()))?;
        Ok(Self {
            operation: operation.to_string(),
            command: command.to_string(),
        })
    }

    /// Whether the requester wants to wait for the exit status.
    #[must_use]
    pub fn is_sync(&self) -> bool {
        self.operation == COMMAND_SYNC
    }

    /// The command line split on whitespace, ready for [`run_command`].
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        self.command.split_whitespace().map(str::to_string).collect()
    }
}

/// Runs a command synchronously or asynchronously.
///
/// Sync waits for the process and returns its exit status; async spawns and
/// returns the pid, leaving the process running. With `log_file`, both output
/// streams append to that file; otherwise sync output is captured and logged
/// (stdout at debug, stderr at warn) and async output is discarded.
pub async fn run_command(
    command_args: &[String],
    sync: bool,
    log_file: Option<&Path>,
    cwd: Option<&Path>,
) -> std::io::Result<CommandOutcome> {
    let (program, args) = command_args.split_first().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line")
    })?;
    info!(command = %command_args.join(" "), "running command");

    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    if let Some(path) = log_file {
        info!(log = %path.display(), "command output logging to file");
        let out = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let err = out.try_clone()?;
        command.stdout(Stdio::from(out)).stderr(Stdio::from(err));
        if sync {
            let status = command.spawn()?.wait().await?;
            info!(status = ?status.code(), "command_sync process exited");
            return Ok(CommandOutcome::Completed {
                status: status.code(),
            });
        }
        let child = command.spawn()?;
        let pid = child.id();
        info!(pid, "command_async process is running");
        return Ok(CommandOutcome::Spawned { pid });
    }

    if sync {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        let output = command.spawn()?.wait_with_output().await?;
        if !output.stdout.is_empty() {
            debug!(stdout = %String::from_utf8_lossy(&output.stdout), "command output");
        }
        if !output.stderr.is_empty() {
            warn!(stderr = %String::from_utf8_lossy(&output.stderr), "command error output");
        }
        info!(status = ?output.status.code(), "command_sync process exited");
        Ok(CommandOutcome::Completed {
            status: output.status.code(),
        })
    } else {
        command.stdout(Stdio::null()).stderr(Stdio::null());
        let child = command.spawn()?;
        let pid = child.id();
        info!(pid, "command_async process is running");
        Ok(CommandOutcome::Spawned { pid })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_command_request_extraction() {
        let document = json!({ "operation": "command_sync", "command": "uptime -p" });
        let request = CommandRequest::from_body(&document).unwrap();
        assert!(request.is_sync());
        assert_eq!(request.args(), vec!["uptime", "-p"]);
    }

    #[test]
    fn test_command_request_rejects_other_operations() {
        let document = json!({ "operation": "observe", "command": "uptime" });
        assert!(matches!(
            CommandRequest::from_body(&document),
            Err(FrameError::InvalidCommand(_))
        ));
        let document = json!({ "command": "uptime" });
        assert!(matches!(
            CommandRequest::from_body(&document),
            Err(FrameError::MissingRequiredField(_))
        ));
    }

    #[tokio::test]
    async fn test_sync_command_reports_exit_status() {
        let outcome = run_command(&["true".to_string()], true, None, None)
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Completed { status: Some(0) });

        let outcome = run_command(&["false".to_string()], true, None, None)
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Completed { status: Some(1) });
    }

    #[tokio::test]
    async fn test_async_command_returns_promptly() {
        let args = vec!["sleep".to_string(), "5".to_string()];
        let started = std::time::Instant::now();
        let outcome = run_command(&args, false, None, None).await.unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert!(matches!(outcome, CommandOutcome::Spawned { pid: Some(_) }));
    }

    #[tokio::test]
    async fn test_log_file_collects_output() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("command.log");
        let args = vec!["echo".to_string(), "hello".to_string()];
        run_command(&args, true, Some(&log), None).await.unwrap();

        let logged = std::fs::read_to_string(&log).unwrap();
        assert!(logged.contains("hello"));
    }

    #[tokio::test]
    async fn test_empty_command_is_an_input_error() {
        let result = run_command(&[], true, None, None).await;
        assert!(result.is_err());
    }
}
