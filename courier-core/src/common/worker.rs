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

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::common::{
    CorrelationId, TransactionTable, WorkerConfig, WorkerError, WorkerHandle,
};
use crate::message::{temp_correlation, validate, Frame};
use crate::traits::{AckMode, BrokerTransport, TransportError, WorkerBehavior};

/// A worker agent: the correlation engine plus caller-supplied domain logic.
///
/// The worker owns the receive/dispatch loop. Frames are processed strictly
/// one at a time, in transport delivery order; publishing a request and the
/// later arrival of its reply are separate loop iterations, possibly far
/// apart in time.
pub struct Worker<B: WorkerBehavior> {
    handle: WorkerHandle,
    behavior: B,
    cancellation: CancellationToken,
}

impl<B: WorkerBehavior> Worker<B> {
    /// Creates a worker with its own transaction table.
    #[must_use]
    pub fn new(config: WorkerConfig, transport: Arc<dyn BrokerTransport>, behavior: B) -> Self {
        Self::with_table(config, transport, Arc::new(TransactionTable::new()), behavior)
    }

    /// Creates a worker around an injected transaction table.
    ///
    /// The table's lifecycle is the caller's: it begins before the worker and
    /// may outlive it, which is useful for inspecting conversation state from
    /// tests or supervisors.
    #[must_use]
    pub fn with_table(
        config: WorkerConfig,
        transport: Arc<dyn BrokerTransport>,
        transactions: Arc<TransactionTable>,
        behavior: B,
    ) -> Self {
        Self {
            handle: WorkerHandle::new(transport, transactions, Arc::new(config)),
            behavior,
            cancellation: CancellationToken::new(),
        }
    }

    /// A handle to this worker's correlation engine.
    #[must_use]
    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// The token that stops [`run`](Worker::run) when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Connects, subscribes the configured input destination and drives the
    /// receive/dispatch loop until cancellation or transport shutdown.
    ///
    /// Without an input destination the worker has nothing to receive: it
    /// logs a warning and returns. Recoverable dispatch errors (bad frames,
    /// unmatched replies, behavior failures) cost one frame each; transport
    /// errors end the loop.
    #[instrument(skip(self))]
    pub async fn run(mut self) -> Result<(), WorkerError> {
        let transport = Arc::clone(self.handle.transport());
        transport.connect(&self.handle.config().broker).await?;
        info!(
            endpoint = %self.handle.config().broker.endpoint(),
            "connected to broker"
        );

        let Some(input) = self.handle.config().destinations.input.clone() else {
            warn!("no input destination was configured, so there is nothing to receive");
            transport.disconnect().await?;
            return Ok(());
        };
        transport.subscribe(&input, AckMode::ClientIndividual).await?;
        info!(destination = %input, "subscribed to input destination");

        let mut sweep = tokio::time::interval(self.handle.config().timeouts.sweep_interval());
        let cancel = self.cancellation.clone();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    trace!("cancellation requested; leaving receive loop");
                    break;
                }
                _ = sweep.tick() => {
                    let evicted = self.handle.evict_expired().await;
                    if evicted > 0 {
                        debug!(evicted, "abandoned transactions evicted");
                    }
                }
                received = transport.receive() => {
                    let frame = match received {
                        Ok(frame) => frame,
                        Err(TransportError::ConnectionClosed) => {
                            debug!("transport closed; leaving receive loop");
                            break;
                        }
                        Err(err) => return Err(err.into()),
                    };
                    info!(frame = %frame.info(), "received message");
                    if let Err(err) = self.handle_inbound(frame).await {
                        if err.is_recoverable() {
                            error!(%err, "skipping frame");
                        } else {
                            return Err(err);
                        }
                    }
                }
            }
        }

        info!("disconnecting from broker");
        transport.disconnect().await?;
        Ok(())
    }

    /// Handles one inbound frame: acknowledge, mint, validate, classify,
    /// dispatch.
    ///
    /// The frame is acknowledged before any processing; a crash between
    /// acknowledgment and completion loses that one unit of work
    /// (at-least-once delivery, accepted trade-off). Errors returned here are
    /// per-frame unless the transport itself failed.
    #[instrument(skip(self, frame), fields(destination = %frame.destination()))]
    pub async fn handle_inbound(&mut self, frame: Frame) -> Result<(), WorkerError> {
        self.handle.transport().acknowledge(&frame).await?;

        // The sender asking for a reply obligates us: record it before
        // anything can go wrong so even a verification failure is answered.
        let transaction = frame
            .reply_to()
            .map(|reply_to| self.handle.transactions().open(reply_to));
        if let Some(id) = &transaction {
            trace!(%id, "opened transaction for inbound request");
        }

        let verified = validate(&frame)
            .and_then(|document| self.behavior.verify(&frame, &document).map(|()| document));
        let document = match verified {
            Ok(document) => document,
            Err(frame_error) => {
                if let Some(reply_to) = frame.reply_to() {
                    // reply() also retires the transaction just opened
                    self.handle.send_error_reply(reply_to, &frame_error).await;
                }
                return Err(frame_error.into());
            }
        };

        if let Some(correlation) = temp_correlation(frame.destination()) {
            return self.complete_reply(correlation, frame).await;
        }

        if let Err(err) = self
            .behavior
            .on_message(&self.handle, &frame, &document, transaction)
            .await
        {
            if let Some(reply_to) = frame.reply_to() {
                debug!(reply_to, "answering failed dispatch with fallback reply");
                let fallback = self.behavior.fallback_reply();
                if let Err(send_err) = self.handle.reply(&fallback, reply_to).await {
                    warn!(%send_err, "could not deliver fallback reply");
                }
            }
            return Err(WorkerError::Behavior(err.to_string()));
        }
        Ok(())
    }

    /// Completes a reply that arrived on an ephemeral destination.
    async fn complete_reply(
        &self,
        correlation: CorrelationId,
        frame: Frame,
    ) -> Result<(), WorkerError> {
        let table = self.handle.transactions();
        if !table.contains(&correlation) {
            // A reply for an id we are not tracking is a consistency error;
            // there is no safe recovery to guess at.
            return Err(WorkerError::Correlation {
                destination: frame.destination().to_string(),
            });
        }

        if let Some(subscription) = table.take_subscription(&correlation) {
            trace!(%correlation, "releasing ephemeral subscription");
            if let Err(err) = self.handle.transport().unsubscribe(subscription).await {
                warn!(%err, "could not release ephemeral subscription");
            }
        }

        match table.callback(&correlation) {
            Some(callback) => {
                let reply_to = table.reply_target(&correlation);
                debug!(%correlation, "running stored reply handler");
                let outcome = callback(self.handle.clone(), frame, reply_to).await;
                // A handler that neither chained a sub-request nor owes a
                // final answer leaves nothing to wait for.
                self.handle.transactions().retire_if_settled(&correlation);
                outcome
            }
            None => {
                table.remove(&correlation);
                trace!(%correlation, "no reply handler stored; reply discarded");
                Ok(())
            }
        }
    }
}
