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
use derive_new::new;

use crate::common::BrokerConfig;
use crate::message::Frame;

/// Acknowledgment modes a subscription can be opened with.
///
/// The correlation engine always subscribes with [`AckMode::ClientIndividual`]
/// so each frame is committed explicitly and independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// The broker considers a frame settled as soon as it is delivered.
    Auto,
    /// A client acknowledgment settles the frame and everything before it.
    Client,
    /// Each frame must be acknowledged on its own.
    #[default]
    ClientIndividual,
}

/// Handle to one registered subscription.
///
/// Returned by [`BrokerTransport::subscribe`] and surrendered back to
/// [`BrokerTransport::unsubscribe`] when interest ends.
#[derive(new, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    token: u64,
    destination: String,
}

impl SubscriptionHandle {
    /// Transport-assigned token identifying this subscription.
    #[must_use]
    pub fn token(&self) -> u64 {
        self.token
    }

    /// The destination this subscription covers.
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }
}

/// Represents errors raised by a broker transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// An operation was attempted before `connect` established a session.
    NotConnected,
    /// The session ended while an operation was in flight.
    ConnectionClosed,
    /// Socket or I/O failure.
    Io(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TransportError::NotConnected => write!(f, "transport session not established"),
            TransportError::ConnectionClosed => write!(f, "connection closed"),
            TransportError::Io(detail) => write!(f, "I/O error: {detail}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

/// Capability set the correlation engine requires from a broker transport.
///
/// The engine never touches the wire itself; any frame-based transport that
/// can connect, subscribe, send and acknowledge can carry a worker.
/// Implementations are shared behind an `Arc`, so every method takes `&self`
/// and manages its own interior state.
///
/// [`receive`](BrokerTransport::receive) must be cancel-safe and
/// order-preserving per subscription: the engine polls it inside a
/// `tokio::select!` loop and a frame must never be lost when another branch
/// wins the race.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Establishes the session. Must be called before any other operation.
    async fn connect(&self, broker: &BrokerConfig) -> Result<(), TransportError>;

    /// Ends the session. Idempotent.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Registers interest in a destination.
    async fn subscribe(
        &self,
        destination: &str,
        ack: AckMode,
    ) -> Result<SubscriptionHandle, TransportError>;

    /// Removes interest. Idempotent: unknown handles are ignored.
    async fn unsubscribe(&self, subscription: SubscriptionHandle) -> Result<(), TransportError>;

    /// Publishes a body to a destination. Best-effort: no delivery
    /// confirmation is returned.
    async fn send(
        &self,
        destination: &str,
        body: Vec<u8>,
        headers: &[(String, String)],
    ) -> Result<(), TransportError>;

    /// Commits removal of the frame from its source queue. Idempotent.
    async fn acknowledge(&self, frame: &Frame) -> Result<(), TransportError>;

    /// Pulls the next frame, blocking until one arrives.
    async fn receive(&self) -> Result<Frame, TransportError>;
}
