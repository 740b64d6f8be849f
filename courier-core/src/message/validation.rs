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

//! Base frame verification.
//!
//! Every inbound frame passes this check before dispatch. Behaviors may layer
//! additional required-field checks on top via
//! [`WorkerBehavior::verify`](crate::traits::WorkerBehavior::verify); the base
//! check always runs first and its failure short-circuits the rest.

use serde_json::Value;

use crate::message::{Frame, FrameError};

/// Reserved body field naming the requested operation.
pub const OPERATION_FIELD: &str = "operation";

/// Reserved body field carrying the command line for command operations.
pub const COMMAND_FIELD: &str = "command";

/// Operation that runs a command and waits for its exit status.
pub const COMMAND_SYNC: &str = "command_sync";

/// Operation that spawns a command without waiting.
pub const COMMAND_ASYNC: &str = "command_async";

/// Verifies a frame body and returns the parsed document.
///
/// The body must parse as JSON. If the document declares an `operation` in
/// the command family, a `command` field must be present and the operation
/// must be one of the recognized command kinds.
pub fn validate(frame: &Frame) -> Result<Value, FrameError> {
    let document = frame.body_json()?;
    if let Some(operation) = document.get(OPERATION_FIELD).and_then(Value::as_str) {
        if operation.starts_with("command") {
            if document.get(COMMAND_FIELD).is_none() {
                return Err(FrameError::InvalidCommand(format!(
                    "received a '{operation}' operation without a '{COMMAND_FIELD}' field"
                )));
            }
            if operation != COMMAND_SYNC && operation != COMMAND_ASYNC {
                return Err(FrameError::InvalidCommand(format!(
                    "received an unknown command operation '{operation}'"
                )));
            }
        }
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_malformed_body() {
        let frame = Frame::new("/queue/in", b"not-json".to_vec());
        assert!(matches!(
            validate(&frame),
            Err(FrameError::MalformedBody(_))
        ));
    }

    #[test]
    fn test_command_without_command_field() {
        let frame = Frame::json("/queue/in", &json!({ "operation": "command_sync" }));
        assert!(matches!(
            validate(&frame),
            Err(FrameError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_unknown_command_operation() {
        let frame = Frame::json(
            "/queue/in",
            &json!({ "operation": "command_backwards", "command": "ls" }),
        );
        assert!(matches!(
            validate(&frame),
            Err(FrameError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_recognized_commands_pass() {
        for operation in [COMMAND_SYNC, COMMAND_ASYNC] {
            let frame = Frame::json(
                "/queue/in",
                &json!({ "operation": operation, "command": "uptime" }),
            );
            let document = validate(&frame).unwrap();
            assert_eq!(document[OPERATION_FIELD], operation);
        }
    }

    #[test]
    fn test_non_command_operations_are_not_inspected() {
        let frame = Frame::json("/queue/in", &json!({ "operation": "observe" }));
        assert!(validate(&frame).is_ok());
    }

    #[test]
    fn test_documents_without_operation_pass() {
        let frame = Frame::json("/queue/in", &json!({ "statements": ["Foo is bar."] }));
        assert!(validate(&frame).is_ok());
    }
}
