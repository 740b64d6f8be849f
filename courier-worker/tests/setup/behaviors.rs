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

//! Worker behaviors shared by the integration tests.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use courier_worker::prelude::*;

/// Records every fresh application document it is dispatched.
#[derive(Default)]
pub struct RecordingBehavior {
    pub seen: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl WorkerBehavior for RecordingBehavior {
    async fn on_message(
        &mut self,
        _handle: &WorkerHandle,
        _frame: &Frame,
        document: &Value,
        _transaction: Option<CorrelationId>,
    ) -> Result<(), WorkerError> {
        self.seen.lock().unwrap().push(document.clone());
        Ok(())
    }
}

/// Relays inbound statements to an internal update destination and answers
/// the original caller once the store confirms.
///
/// This is the chained-conversation shape: the reply handler for the
/// internal request is what finally answers the external sender.
pub struct RelayBehavior {
    pub updates: String,
}

#[async_trait]
impl WorkerBehavior for RelayBehavior {
    async fn on_message(
        &mut self,
        handle: &WorkerHandle,
        _frame: &Frame,
        document: &Value,
        transaction: Option<CorrelationId>,
    ) -> Result<(), WorkerError> {
        let statements = document.get("statements").cloned().unwrap_or(Value::Null);
        handle
            .request(
                Some(&self.updates),
                &json!({ "statements": statements }),
                Some(reply_handler(confirm_store)),
                transaction,
            )
            .await?;
        Ok(())
    }
}

/// Forwards the store's confirmation to whoever asked for the original work.
async fn confirm_store(
    handle: WorkerHandle,
    frame: Frame,
    reply_to: Option<String>,
) -> Result<(), WorkerError> {
    let document = frame.body_json()?;
    let Some(destination) = reply_to else {
        return Ok(());
    };
    let responses = document.get("responses").cloned().unwrap_or(Value::Null);
    handle.reply(&json!({ "responses": responses }), &destination).await
}

/// Fails on every message, with a recognizable fallback reply.
pub struct FaultyBehavior;

#[async_trait]
impl WorkerBehavior for FaultyBehavior {
    async fn on_message(
        &mut self,
        _handle: &WorkerHandle,
        _frame: &Frame,
        _document: &Value,
        _transaction: Option<CorrelationId>,
    ) -> Result<(), WorkerError> {
        Err(WorkerError::Behavior("faulty by construction".to_string()))
    }

    fn fallback_reply(&self) -> Value {
        json!({ "responses": "I'm terribly sorry, something went wrong handling your message." })
    }
}

/// Requires a `statements` field on top of the base verification, and records
/// which documents reached which hook.
#[derive(Default)]
pub struct StrictBehavior {
    pub verified: Arc<Mutex<Vec<Value>>>,
    pub dispatched: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl WorkerBehavior for StrictBehavior {
    async fn on_message(
        &mut self,
        _handle: &WorkerHandle,
        _frame: &Frame,
        document: &Value,
        _transaction: Option<CorrelationId>,
    ) -> Result<(), WorkerError> {
        self.dispatched.lock().unwrap().push(document.clone());
        Ok(())
    }

    fn verify(&self, _frame: &Frame, document: &Value) -> Result<(), FrameError> {
        self.verified.lock().unwrap().push(document.clone());
        if document.get("statements").is_none() {
            return Err(FrameError::MissingRequiredField("statements".to_string()));
        }
        Ok(())
    }
}
