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
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

use courier_worker::prelude::*;

use crate::setup::behaviors::{RecordingBehavior, RelayBehavior};
use crate::setup::*;

mod setup;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

async fn connected_broker(config: &WorkerConfig) -> anyhow::Result<Arc<LoopbackBroker>> {
    let broker = Arc::new(LoopbackBroker::new());
    broker.connect(&config.broker).await?;
    Ok(broker)
}

#[tokio::test]
async fn test_no_transaction_without_reply_to() -> anyhow::Result<()> {
    initialize_tracing();
    let config = worker_config(Some("/queue/in"), None);
    let broker = connected_broker(&config).await?;
    let mut worker = Worker::new(config, broker, RecordingBehavior::default());
    let handle = worker.handle();

    let frame = Frame::json("/queue/in", &json!({ "statements": [] }));
    worker.handle_inbound(frame).await?;

    assert!(handle.transactions().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_inbound_reply_to_opens_a_transaction() -> anyhow::Result<()> {
    initialize_tracing();
    let config = worker_config(Some("/queue/in"), None);
    let broker = connected_broker(&config).await?;
    let mut worker = Worker::new(config, broker, RecordingBehavior::default());
    let handle = worker.handle();

    let frame = Frame::json("/queue/in", &json!({ "statements": [] })).with_reply_to("/temp/X");
    worker.handle_inbound(frame).await?;

    assert_eq!(handle.transactions().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_request_opens_one_ephemeral_subscription() -> anyhow::Result<()> {
    initialize_tracing();
    let config = worker_config(None, None);
    let broker = connected_broker(&config).await?;
    let mut worker = Worker::new(config, broker.clone(), RecordingBehavior::default());
    let handle = worker.handle();

    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invocations);
    let callback = reply_handler(move |_handle, _frame, _reply_to| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    let id = handle
        .request(Some("/queue/updates"), &json!({ "n": 1 }), Some(callback), None)
        .await?;

    // exactly one subscription, deterministically named from the id
    let reply_destination = temp_destination(&id);
    assert_eq!(broker.subscription_count(), 1);
    assert!(broker.is_subscribed(&reply_destination));
    assert_eq!(temp_correlation(&reply_destination), Some(id.clone()));

    // a frame on that exact destination resolves to the transaction and
    // triggers exactly one callback invocation
    worker
        .handle_inbound(Frame::json(&reply_destination, &json!({ "responses": [true] })))
        .await?;
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert!(!broker.is_subscribed(&reply_destination));
    assert!(handle.transactions().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_stale_destination_is_a_correlation_error() -> anyhow::Result<()> {
    initialize_tracing();
    let config = worker_config(None, None);
    let broker = connected_broker(&config).await?;
    let mut worker = Worker::new(config, broker, RecordingBehavior::default());
    let handle = worker.handle();

    let id = handle
        .request(Some("/queue/updates"), &json!({ "n": 1 }), None, None)
        .await?;
    let reply_destination = temp_destination(&id);

    // first reply completes the conversation (no callback: discarded)
    worker
        .handle_inbound(Frame::json(&reply_destination, &json!({ "ok": true })))
        .await?;
    assert!(handle.transactions().is_empty());

    // a second frame on the now-stale destination must not silently match a
    // new conversation
    let err = worker
        .handle_inbound(Frame::json(&reply_destination, &json!({ "ok": true })))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Correlation { .. }));
    assert!(err.is_recoverable());
    Ok(())
}

#[tokio::test]
async fn test_request_reuses_a_supplied_transaction() -> anyhow::Result<()> {
    initialize_tracing();
    let config = worker_config(None, None);
    let broker = connected_broker(&config).await?;
    let worker = Worker::new(config, broker.clone(), RecordingBehavior::default());
    let handle = worker.handle();

    let id = handle
        .request(Some("/queue/updates"), &json!({ "n": 1 }), None, None)
        .await?;
    let again = handle
        .request(
            Some("/queue/updates"),
            &json!({ "n": 2 }),
            Some(reply_handler(|_handle, _frame, _reply_to| async { Ok(()) })),
            Some(id.clone()),
        )
        .await?;

    assert_eq!(id, again);
    assert_eq!(handle.transactions().len(), 1, "entry refreshed, not duplicated");
    // the displaced subscription was released; one remains for the temp name
    assert_eq!(broker.subscription_count(), 1);
    assert!(broker.is_subscribed(&temp_destination(&id)));
    Ok(())
}

#[tokio::test]
async fn test_acknowledgment_is_idempotent_through_dispatch() -> anyhow::Result<()> {
    initialize_tracing();
    let config = worker_config(Some("/queue/in"), None);
    let broker = connected_broker(&config).await?;
    let mut worker = Worker::new(config, broker.clone(), RecordingBehavior::default());
    let handle = worker.handle();

    let frame = Frame::json("/queue/in", &json!({ "statements": [] }))
        .with_header(MESSAGE_ID_HEADER, "redelivered-1");
    worker.handle_inbound(frame.clone()).await?;
    worker.handle_inbound(frame).await?;

    assert_eq!(broker.acknowledged_count(), 1);
    assert!(handle.transactions().is_empty());
    Ok(())
}

// End-to-end scenario: an external caller asks a question, the worker fans
// out an internal update expecting a confirmation, and the confirmation
// handler finally answers the caller and closes the conversation.
#[tokio::test]
async fn test_chained_conversation_answers_the_original_caller() -> anyhow::Result<()> {
    initialize_tracing();
    let config = worker_config(Some("/queue/in"), Some("/queue/updates"));
    let broker = connected_broker(&config).await?;
    let mut store_end = broker.tap("/queue/updates");
    let mut caller_end = broker.tap("/temp/X");

    let worker = Worker::new(
        config,
        broker.clone(),
        RelayBehavior { updates: "/queue/updates".to_string() },
    );
    let handle = worker.handle();
    let cancellation = worker.cancellation_token();
    let running = tokio::spawn(worker.run());

    // the external caller submits a statement and asks for an answer
    broker
        .send(
            "/queue/in",
            serde_json::to_vec(&json!({ "statements": ["Foo is bar."] }))?,
            &[(REPLY_TO_HEADER.to_string(), "/temp/X".to_string())],
        )
        .await?;

    // the worker relays it to the store, expecting a confirmation on an
    // ephemeral destination derived from the conversation id
    let update = timeout(RECV_TIMEOUT, store_end.recv()).await?.expect("update frame");
    assert_eq!(update.body_json()?["statements"], json!(["Foo is bar."]));
    let reply_destination = update.reply_to().expect("reply-to header").to_string();
    let id = temp_correlation(&reply_destination).expect("temp destination");
    assert!(handle.transactions().contains(&id));

    // the store confirms
    broker
        .send(&reply_destination, serde_json::to_vec(&json!({ "responses": [true] }))?, &[])
        .await?;

    // the confirmation handler answers the original caller
    let answer = timeout(RECV_TIMEOUT, caller_end.recv()).await?.expect("final answer");
    assert_eq!(answer.body_json()?["responses"], json!([true]));

    // and the conversation is closed
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.transactions().is_empty());

    cancellation.cancel();
    running.await??;
    Ok(())
}
