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

use crate::message::FrameError;
use crate::traits::TransportError;

/// Represents errors that can occur while running a worker.
///
/// The dispatch loop decides continue-vs-abort from
/// [`is_recoverable`](WorkerError::is_recoverable): a recoverable error costs
/// one frame or one operation, a fatal one ends [`run`](crate::common::Worker::run).
#[derive(Debug)]
pub enum WorkerError {
    /// A required destination or output setting was missing at the point of
    /// use. Fatal for the operation, not for the process.
    Config(String),
    /// An inbound frame failed verification.
    Frame(FrameError),
    /// A reply arrived on an ephemeral destination with no tracked
    /// transaction.
    Correlation {
        /// The stale or unknown destination the reply arrived on.
        destination: String,
    },
    /// The transport session failed.
    Transport(TransportError),
    /// Domain logic failed while handling a message.
    Behavior(String),
}

impl WorkerError {
    /// Whether the dispatch loop may continue after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            WorkerError::Config(_)
            | WorkerError::Frame(_)
            | WorkerError::Correlation { .. }
            | WorkerError::Behavior(_) => true,
            WorkerError::Transport(_) => false,
        }
    }
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            WorkerError::Config(detail) => write!(f, "configuration error: {detail}"),
            WorkerError::Frame(err) => write!(f, "frame failed verification: {err}"),
            WorkerError::Correlation { destination } => write!(
                f,
                "received a reply on '{destination}' for a transaction that is not being tracked"
            ),
            WorkerError::Transport(err) => write!(f, "transport error: {err}"),
            WorkerError::Behavior(detail) => write!(f, "worker behavior error: {detail}"),
        }
    }
}

impl std::error::Error for WorkerError {}

impl From<FrameError> for WorkerError {
    fn from(err: FrameError) -> Self {
        WorkerError::Frame(err)
    }
}

impl From<TransportError> for WorkerError {
    fn from(err: TransportError) -> Self {
        WorkerError::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability_split() {
        assert!(WorkerError::Config("no output destination".into()).is_recoverable());
        assert!(WorkerError::Frame(FrameError::MalformedBody("eof".into())).is_recoverable());
        assert!(WorkerError::Correlation { destination: "/queue/temp.x".into() }.is_recoverable());
        assert!(WorkerError::Behavior("boom".into()).is_recoverable());
        assert!(!WorkerError::Transport(TransportError::ConnectionClosed).is_recoverable());
    }
}
