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

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, instrument, trace, warn};

use crate::common::{
    CorrelationId, ReplyHandler, TransactionTable, WorkerConfig, WorkerError,
};
use crate::message::{temp_destination, FrameError, REPLY_TO_HEADER};
use crate::traits::{AckMode, BrokerTransport};

/// Cloneable handle to a worker's correlation engine.
///
/// The handle is how domain logic talks back to the engine: behaviors receive
/// one in [`on_message`](crate::traits::WorkerBehavior::on_message), stored
/// reply handlers receive a clone when their reply arrives, and either may
/// keep clones around to publish from elsewhere. All clones share the same
/// transport, transaction table and configuration.
#[derive(Clone)]
pub struct WorkerHandle {
    transport: Arc<dyn BrokerTransport>,
    transactions: Arc<TransactionTable>,
    config: Arc<WorkerConfig>,
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("open_transactions", &self.transactions.len())
            .finish()
    }
}

impl WorkerHandle {
    pub(crate) fn new(
        transport: Arc<dyn BrokerTransport>,
        transactions: Arc<TransactionTable>,
        config: Arc<WorkerConfig>,
    ) -> Self {
        Self {
            transport,
            transactions,
            config,
        }
    }

    /// The transaction table backing this worker.
    #[must_use]
    pub fn transactions(&self) -> &TransactionTable {
        &self.transactions
    }

    /// The worker configuration.
    #[must_use]
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub(crate) fn transport(&self) -> &Arc<dyn BrokerTransport> {
        &self.transport
    }

    fn resolve_destination<'a>(
        &'a self,
        destination: Option<&'a str>,
    ) -> Result<&'a str, WorkerError> {
        destination
            .or(self.config.destinations.output.as_deref())
            .ok_or_else(|| {
                WorkerError::Config(
                    "tried to publish a message but no destination was supplied and no output \
                     destination is configured"
                        .to_string(),
                )
            })
    }

    async fn send_document<T: Serialize + ?Sized>(
        &self,
        destination: &str,
        message: &T,
        headers: &[(String, String)],
    ) -> Result<(), WorkerError> {
        let body = serde_json::to_vec(message).map_err(|err| {
            WorkerError::Behavior(format!("could not serialize outbound message: {err}"))
        })?;
        self.transport.send(destination, body, headers).await?;
        Ok(())
    }

    /// Publishes a message to the configured default output destination.
    ///
    /// Fire-and-forget: no transaction is recorded and no reply is expected.
    /// Fails with a configuration error if no output destination is
    /// configured.
    #[instrument(skip(self, message))]
    pub async fn publish<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), WorkerError> {
        let destination = self.resolve_destination(None)?.to_string();
        self.send_document(&destination, message, &[]).await
    }

    /// Publishes a message to an explicit destination, fire-and-forget.
    #[instrument(skip(self, message))]
    pub async fn publish_to<T: Serialize + ?Sized>(
        &self,
        destination: &str,
        message: &T,
    ) -> Result<(), WorkerError> {
        self.send_document(destination, message, &[]).await
    }

    /// Publishes a message and expects a reply.
    ///
    /// Opens a one-shot subscription on the ephemeral destination derived
    /// from the correlation id, records (or refreshes) the transaction with
    /// `callback`, and sends the message with a `reply-to` header pointing at
    /// that destination. Passing the `transaction` of the conversation being
    /// continued keeps a chain of sub-requests under one logical id;
    /// otherwise a fresh id is minted.
    ///
    /// Returns the correlation id immediately. This is the suspension point
    /// of the protocol: the reply, if any, arrives later through the
    /// dispatch loop, which releases the subscription and invokes `callback`.
    #[instrument(skip(self, message, callback))]
    pub async fn request<T: Serialize + ?Sized>(
        &self,
        destination: Option<&str>,
        message: &T,
        callback: Option<ReplyHandler>,
        transaction: Option<CorrelationId>,
    ) -> Result<CorrelationId, WorkerError> {
        let destination = self.resolve_destination(destination)?.to_string();
        let id = match transaction {
            Some(id) => {
                debug!(%id, "continuing an existing conversation");
                id
            }
            None => {
                let id = CorrelationId::mint();
                debug!(%id, "opening a new conversation");
                id
            }
        };
        let reply_destination = temp_destination(&id);
        let subscription = self
            .transport
            .subscribe(&reply_destination, AckMode::ClientIndividual)
            .await?;
        if let Some(stale) = self.transactions.arm(&id, callback, subscription) {
            trace!(%id, "releasing the subscription displaced by a refresh");
            if let Err(err) = self.transport.unsubscribe(stale).await {
                warn!(%err, "could not release displaced subscription");
            }
        }
        self.send_document(
            &destination,
            message,
            &[(REPLY_TO_HEADER.to_string(), reply_destination)],
        )
        .await?;
        Ok(id)
    }

    /// Sends a reply and closes the conversation it answers.
    ///
    /// If `destination` matches an open transaction (by table key, or by
    /// the `reply_to` recorded when the conversation was opened), that
    /// transaction is removed and any subscription it still holds is
    /// released. Replying to a destination with no open transaction is not
    /// an error; the send still happens, but it is logged because it may
    /// indicate a protocol bug upstream.
    ///
    /// Completion is keyed by explicit id, never by arrival order; ordering
    /// across distinct conversations is unspecified.
    #[instrument(skip(self, message))]
    pub async fn reply<T: Serialize + ?Sized>(
        &self,
        message: &T,
        destination: &str,
    ) -> Result<(), WorkerError> {
        self.send_document(destination, message, &[]).await?;
        match self.transactions.complete_for_destination(destination) {
            Some(mut transaction) => {
                if let Some(subscription) = transaction.subscription.take() {
                    if let Err(err) = self.transport.unsubscribe(subscription).await {
                        warn!(%err, "could not release subscription of completed transaction");
                    }
                }
                debug!(id = %transaction.id(), "conversation closed");
            }
            None => {
                warn!(
                    destination,
                    "replied to a destination no one is waiting on; upstream may have a \
                     protocol bug"
                );
            }
        }
        Ok(())
    }

    /// Answers a failed verification with an error-shaped reply.
    ///
    /// Best-effort: delivery problems are logged, not returned, because the
    /// verification failure itself is about to be surfaced.
    pub(crate) async fn send_error_reply(&self, destination: &str, error: &FrameError) {
        debug!(%error, destination, "sending verification error reply");
        let body = json!({ "error": "frame failed verification" });
        if let Err(err) = self.reply(&body, destination).await {
            warn!(%err, "could not deliver verification error reply");
        }
    }

    /// Evicts transactions older than the configured TTL, releasing their
    /// subscriptions. Returns how many were evicted.
    pub(crate) async fn evict_expired(&self) -> usize {
        let ttl = self.config.timeouts.transaction_ttl();
        let expired = self.transactions.sweep_expired(ttl);
        let evicted = expired.len();
        for mut transaction in expired {
            warn!(
                id = %transaction.id(),
                age_ms = transaction.age().as_millis() as u64,
                "evicting abandoned transaction"
            );
            if let Some(subscription) = transaction.subscription.take() {
                if let Err(err) = self.transport.unsubscribe(subscription).await {
                    warn!(%err, "could not release subscription of evicted transaction");
                }
            }
        }
        evicted
    }
}
