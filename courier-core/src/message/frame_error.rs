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

/// Represents the ways an inbound frame can fail verification.
///
/// Frame errors are recoverable: the offending frame is skipped, an error
/// reply is sent when the sender asked for one, and the dispatch loop
/// continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The body did not parse as a structured document.
    MalformedBody(String),
    /// A command-family operation was malformed or unrecognized.
    InvalidCommand(String),
    /// A behavior-required field was absent from the document.
    MissingRequiredField(String),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FrameError::MalformedBody(detail) => {
                write!(f, "received an invalid JSON object in message: {detail}")
            }
            FrameError::InvalidCommand(detail) => write!(f, "invalid command operation: {detail}"),
            FrameError::MissingRequiredField(field) => {
                write!(f, "message is missing required field '{field}'")
            }
        }
    }
}

impl std::error::Error for FrameError {}
