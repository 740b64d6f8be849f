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

//! The transaction table: the authoritative state of all outstanding
//! request/reply conversations.
//!
//! One conversation leg is one correlation id is one ephemeral subscription.
//! A transaction lives in the table from the moment it is opened until its
//! reply is delivered and nothing further is owed, until a completing
//! [`reply`](crate::common::WorkerHandle::reply) consumes it, or until the
//! sweep evicts it as abandoned.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use mti::prelude::*;

use crate::common::{WorkerError, WorkerHandle};
use crate::message::Frame;
use crate::traits::SubscriptionHandle;

/// Identifier linking an outbound request to its eventual inbound reply.
///
/// Minted as a time-ordered `txn_<uuid_v7>` id; collision probability is
/// negligible, so ids are process-unique without coordination.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Mints a fresh, process-unique correlation id.
    #[must_use]
    pub fn mint() -> Self {
        Self("txn".create_type_id::<V7>().to_string())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Handler invoked when the reply for a transaction arrives.
///
/// The handler receives a cloned [`WorkerHandle`] so it can continue the
/// conversation (publish further requests under the same transaction) or
/// finally answer the original caller; the third argument is the
/// destination that final answer is owed to, when one is.
pub type ReplyHandler = Arc<
    dyn Fn(WorkerHandle, Frame, Option<String>) -> BoxFuture<'static, Result<(), WorkerError>>
        + Send
        + Sync,
>;

/// Wraps an async closure as a stored [`ReplyHandler`].
pub fn reply_handler<F, Fut>(handler: F) -> ReplyHandler
where
    F: Fn(WorkerHandle, Frame, Option<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
{
    Arc::new(move |handle, frame, reply_to| Box::pin(handler(handle, frame, reply_to)))
}

/// One outstanding request/reply conversation.
pub struct Transaction {
    id: CorrelationId,
    reply_to: Option<String>,
    pub(crate) callback: Option<ReplyHandler>,
    pub(crate) subscription: Option<SubscriptionHandle>,
    opened_at: Instant,
}

impl Transaction {
    /// The correlation id keying this transaction.
    #[must_use]
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    /// The destination the final answer must be sent to, when one is owed.
    #[must_use]
    pub fn reply_to(&self) -> Option<&str> {
        self.reply_to.as_deref()
    }

    /// Whether a reply handler is stored for this transaction.
    #[must_use]
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// How long this transaction has been open.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("reply_to", &self.reply_to)
            .field("has_callback", &self.callback.is_some())
            .field("subscription", &self.subscription)
            .field("age", &self.opened_at.elapsed())
            .finish()
    }
}

/// Process-wide map from correlation id to open transaction record.
///
/// The table is an explicitly owned state object held by (or injected into)
/// the worker; the correlation engine is its sole mutator. It is a concurrent
/// map because [`WorkerHandle`]s are cloneable, even though a single dispatch
/// loop drives all inbound traffic.
#[derive(Debug, Default)]
pub struct TransactionTable {
    entries: DashMap<CorrelationId, Transaction>,
}

impl TransactionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no transactions are open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a transaction is open under `id`.
    #[must_use]
    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.entries.contains_key(id)
    }

    /// Opens a transaction for an inbound message that carried a `reply-to`
    /// header, recording the obligation to eventually answer that sender.
    pub(crate) fn open(&self, reply_to: impl Into<String>) -> CorrelationId {
        let id = CorrelationId::mint();
        self.entries.insert(
            id.clone(),
            Transaction {
                id: id.clone(),
                reply_to: Some(reply_to.into()),
                callback: None,
                subscription: None,
                opened_at: Instant::now(),
            },
        );
        id
    }

    /// Stores (or refreshes) the callback and ephemeral subscription for an
    /// outbound request under `id`.
    ///
    /// An existing entry keeps its `reply_to` obligation; a fresh entry has
    /// none until a reply eventually arrives. Returns the displaced
    /// subscription, if the transaction was already armed, so the caller can
    /// release it.
    pub(crate) fn arm(
        &self,
        id: &CorrelationId,
        callback: Option<ReplyHandler>,
        subscription: SubscriptionHandle,
    ) -> Option<SubscriptionHandle> {
        match self.entries.entry(id.clone()) {
            Entry::Occupied(mut occupied) => {
                let transaction = occupied.get_mut();
                transaction.callback = callback;
                transaction.subscription.replace(subscription)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Transaction {
                    id: id.clone(),
                    reply_to: None,
                    callback,
                    subscription: Some(subscription),
                    opened_at: Instant::now(),
                });
                None
            }
        }
    }

    /// Takes the ephemeral subscription out of a transaction, leaving the
    /// record in place.
    pub(crate) fn take_subscription(&self, id: &CorrelationId) -> Option<SubscriptionHandle> {
        self.entries
            .get_mut(id)
            .and_then(|mut entry| entry.subscription.take())
    }

    /// The stored reply handler for `id`, if any.
    pub(crate) fn callback(&self, id: &CorrelationId) -> Option<ReplyHandler> {
        self.entries.get(id).and_then(|entry| entry.callback.clone())
    }

    /// The destination the final answer for `id` is owed to, if any.
    pub(crate) fn reply_target(&self, id: &CorrelationId) -> Option<String> {
        self.entries.get(id).and_then(|entry| entry.reply_to.clone())
    }

    /// Removes a transaction outright.
    pub(crate) fn remove(&self, id: &CorrelationId) -> Option<Transaction> {
        self.entries.remove(id).map(|(_, transaction)| transaction)
    }

    /// Removes a transaction whose reply has been delivered and that owes
    /// nothing further: no live subscription and no `reply_to` obligation.
    ///
    /// Returns whether the transaction was retired.
    pub(crate) fn retire_if_settled(&self, id: &CorrelationId) -> bool {
        let settled = self
            .entries
            .get(id)
            .is_some_and(|entry| entry.subscription.is_none() && entry.reply_to.is_none());
        if settled {
            self.entries.remove(id);
        }
        settled
    }

    /// Consumes the transaction a completing reply addresses.
    ///
    /// A reply completes the transaction whose table key equals
    /// `destination`, or failing that, the oldest transaction whose
    /// `reply_to` equals it. Correlation is by explicit id; age only breaks
    /// ties between conversations that share a caller.
    pub(crate) fn complete_for_destination(&self, destination: &str) -> Option<Transaction> {
        let key = CorrelationId::from(destination);
        if let Some((_, transaction)) = self.entries.remove(&key) {
            return Some(transaction);
        }
        let mut oldest: Option<(CorrelationId, Instant)> = None;
        for entry in self.entries.iter() {
            if entry.value().reply_to.as_deref() == Some(destination) {
                let opened_at = entry.value().opened_at;
                if oldest
                    .as_ref()
                    .map_or(true, |(_, existing)| opened_at < *existing)
                {
                    oldest = Some((entry.key().clone(), opened_at));
                }
            }
        }
        let (id, _) = oldest?;
        self.remove(&id)
    }

    /// Removes and returns every transaction older than `ttl`.
    pub(crate) fn sweep_expired(&self, ttl: Duration) -> Vec<Transaction> {
        let expired: Vec<CorrelationId> = self
            .entries
            .iter()
            .filter(|entry| entry.value().opened_at.elapsed() >= ttl)
            .map(|entry| entry.key().clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.remove(&id))
            .collect()
    }
}
