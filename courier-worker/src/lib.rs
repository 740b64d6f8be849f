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

#![forbid(unsafe_code)]
#![forbid(missing_docs)] // Keep this to enforce coverage

//! # Courier Worker
//!
//! This crate provides the foundational components for Courier worker
//! agents: processes that subscribe to a publish/subscribe message broker,
//! do some kind of work, and answer the senders that asked for a reply,
//! even when producing that answer takes a chain of further broker
//! round-trips.
//!
//! ## Key Concepts
//!
//! - **Frames (`Frame`)**: One broker message unit: a destination, string
//!   headers and an opaque JSON body.
//! - **Transport (`BrokerTransport`)**: The capability set the engine needs
//!   from a broker session: connect, subscribe, send, acknowledge, receive.
//!   `LoopbackBroker` is the in-process implementation used by the tests.
//! - **Correlation**: Every request that expects a reply gets a process-unique
//!   `CorrelationId`, an ephemeral reply destination derived from it, and a
//!   one-shot subscription released the moment the reply is observed.
//! - **Transactions (`TransactionTable`)**: The authoritative record of every
//!   open conversation, from first `reply-to` to final answer.
//! - **Behavior (`WorkerBehavior`)**: Caller-supplied domain logic invoked
//!   per application message; it talks back through a `WorkerHandle` to
//!   publish, chain requests or reply.
//! - **Worker (`Worker`)**: The receive/dispatch loop tying it all together.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier_worker::prelude::*;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl WorkerBehavior for Echo {
//!     async fn on_message(
//!         &mut self,
//!         handle: &WorkerHandle,
//!         frame: &Frame,
//!         document: &serde_json::Value,
//!         _transaction: Option<CorrelationId>,
//!     ) -> Result<(), WorkerError> {
//!         if let Some(reply_to) = frame.reply_to() {
//!             handle.reply(document, reply_to).await?;
//!         }
//!         Ok(())
//!     }
//! }
//! ```

/// A prelude module for conveniently importing the most commonly used items.
///
/// Re-exports the Courier core types along with the `async_trait` attribute
/// macro needed to implement [`WorkerBehavior`](courier_core::prelude::WorkerBehavior).
pub mod prelude {
    pub use async_trait::async_trait;

    pub use courier_core::prelude::*;
}
