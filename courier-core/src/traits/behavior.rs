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

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::common::{CorrelationId, WorkerError, WorkerHandle};
use crate::message::{Frame, FrameError};

/// Domain logic invoked by the correlation engine on each inbound
/// application message.
///
/// The engine handles acknowledgment, transaction minting, validation and
/// reply correlation before this trait is consulted; implementations only see
/// fresh application frames, never replies on ephemeral destinations. A
/// behavior may call back into the engine through the supplied
/// [`WorkerHandle`] to publish further requests or answer the original
/// caller.
#[async_trait]
pub trait WorkerBehavior: Send {
    /// Handles one fresh application frame.
    ///
    /// `document` is the already-verified body. When the sender asked for a
    /// reply, `transaction` carries the correlation id the engine minted for
    /// this conversation; thread it through
    /// [`WorkerHandle::request`](crate::common::WorkerHandle::request) so a
    /// chained sub-request stays part of the same conversation, or answer
    /// directly with [`WorkerHandle::reply`](crate::common::WorkerHandle::reply).
    ///
    /// Errors returned here do not stop the dispatch loop: the engine logs
    /// them and, when a reply is owed, answers with
    /// [`fallback_reply`](WorkerBehavior::fallback_reply).
    async fn on_message(
        &mut self,
        handle: &WorkerHandle,
        frame: &Frame,
        document: &Value,
        transaction: Option<CorrelationId>,
    ) -> Result<(), WorkerError>;

    /// Layers required-field checks on top of the base frame verification.
    ///
    /// Runs only after [`validate`](crate::message::validate) has accepted
    /// the frame; a base-check failure short-circuits this hook.
    fn verify(&self, _frame: &Frame, _document: &Value) -> Result<(), FrameError> {
        Ok(())
    }

    /// The reply sent on the behavior's behalf when
    /// [`on_message`](WorkerBehavior::on_message) fails and a reply is owed.
    fn fallback_reply(&self) -> Value {
        json!({ "error": "message handling failed" })
    }
}
