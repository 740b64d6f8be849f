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

//! An in-process broker transport.
//!
//! `LoopbackBroker` routes frames between named destinations without a
//! network. It backs the test suite and local development: tests hold a clone
//! of the `Arc` the worker runs on, play the remote party through
//! [`tap`](LoopbackBroker::tap), and inject inbound traffic with plain
//! [`send`](crate::traits::BrokerTransport::send) calls.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::sync::{mpsc, Mutex};
use tracing::{trace, warn};

use crate::common::BrokerConfig;
use crate::message::{Frame, MESSAGE_ID_HEADER};
use crate::traits::{AckMode, BrokerTransport, SubscriptionHandle, TransportError};

/// In-process [`BrokerTransport`] with per-destination routing.
///
/// Frames sent to a subscribed destination land in the worker's inbox, in
/// send order. Frames sent to a tapped destination go to the tap instead,
/// so taps can stand in for remote parties. Anything else is retained and
/// flushed
/// when the destination is first subscribed, mirroring broker queue
/// semantics.
pub struct LoopbackBroker {
    connected: AtomicBool,
    next_subscription: AtomicU64,
    next_message: AtomicU64,
    inbox_tx: mpsc::UnboundedSender<Frame>,
    inbox_rx: Mutex<mpsc::UnboundedReceiver<Frame>>,
    /// token -> destination for every live subscription
    subscriptions: DashMap<u64, String>,
    /// destination -> token of the latest live subscription
    destinations: DashMap<String, u64>,
    taps: DashMap<String, mpsc::UnboundedSender<Frame>>,
    pending: DashMap<String, Vec<Frame>>,
    acknowledged: DashSet<String>,
}

impl Default for LoopbackBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LoopbackBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackBroker")
            .field("connected", &self.is_connected())
            .field("subscriptions", &self.subscriptions.len())
            .field("taps", &self.taps.len())
            .finish()
    }
}

impl LoopbackBroker {
    /// Creates a disconnected loopback broker.
    #[must_use]
    pub fn new() -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            connected: AtomicBool::new(false),
            next_subscription: AtomicU64::new(1),
            next_message: AtomicU64::new(1),
            inbox_tx,
            inbox_rx: Mutex::new(inbox_rx),
            subscriptions: DashMap::new(),
            destinations: DashMap::new(),
            taps: DashMap::new(),
            pending: DashMap::new(),
            acknowledged: DashSet::new(),
        }
    }

    /// Routes frames for `destination` to the returned receiver instead of
    /// the worker inbox, letting a test play the remote party on that
    /// destination.
    pub fn tap(&self, destination: impl Into<String>) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.taps.insert(destination.into(), tx);
        rx
    }

    /// Whether a session is currently established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether a live subscription covers `destination`.
    #[must_use]
    pub fn is_subscribed(&self, destination: &str) -> bool {
        self.destinations.contains_key(destination)
    }

    /// Number of distinct message ids acknowledged so far.
    #[must_use]
    pub fn acknowledged_count(&self) -> usize {
        self.acknowledged.len()
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }

    fn deliver(&self, frame: Frame) {
        let destination = frame.destination().to_string();
        if let Some(tap) = self.taps.get(&destination) {
            if tap.send(frame).is_err() {
                warn!(destination, "tap receiver dropped; frame discarded");
            }
            return;
        }
        if self.destinations.contains_key(&destination) {
            // receiver lives as long as self
            let _ = self.inbox_tx.send(frame);
            return;
        }
        trace!(destination, "no subscriber yet; retaining frame");
        self.pending.entry(destination).or_default().push(frame);
    }
}

#[async_trait]
impl BrokerTransport for LoopbackBroker {
    async fn connect(&self, broker: &BrokerConfig) -> Result<(), TransportError> {
        trace!(endpoint = %broker.endpoint(), "loopback session established");
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(
        &self,
        destination: &str,
        _ack: AckMode,
    ) -> Result<SubscriptionHandle, TransportError> {
        self.ensure_connected()?;
        let token = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.subscriptions.insert(token, destination.to_string());
        self.destinations.insert(destination.to_string(), token);
        if let Some((_, retained)) = self.pending.remove(destination) {
            trace!(destination, count = retained.len(), "flushing retained frames");
            for frame in retained {
                let _ = self.inbox_tx.send(frame);
            }
        }
        Ok(SubscriptionHandle::new(token, destination.to_string()))
    }

    async fn unsubscribe(&self, subscription: SubscriptionHandle) -> Result<(), TransportError> {
        if let Some((_, destination)) = self.subscriptions.remove(&subscription.token()) {
            self.destinations
                .remove_if(&destination, |_, token| *token == subscription.token());
        }
        // unknown handles are ignored
        Ok(())
    }

    async fn send(
        &self,
        destination: &str,
        body: Vec<u8>,
        headers: &[(String, String)],
    ) -> Result<(), TransportError> {
        self.ensure_connected()?;
        let mut frame = Frame::new(destination, body);
        for (name, value) in headers {
            frame = frame.with_header(name, value);
        }
        let id = self.next_message.fetch_add(1, Ordering::SeqCst);
        frame = frame.with_header(MESSAGE_ID_HEADER, format!("loopback-{id}"));
        self.deliver(frame);
        Ok(())
    }

    async fn acknowledge(&self, frame: &Frame) -> Result<(), TransportError> {
        if let Some(id) = frame.message_id() {
            // DashSet::insert is a no-op for ids already settled
            self.acknowledged.insert(id.to_string());
        }
        Ok(())
    }

    async fn receive(&self) -> Result<Frame, TransportError> {
        let mut inbox = self.inbox_rx.lock().await;
        inbox.recv().await.ok_or(TransportError::ConnectionClosed)
    }
}
