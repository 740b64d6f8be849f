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
//! Courier Core Library
//!
//! This library provides the core functionality for the Courier worker
//! framework: the correlation engine that turns one-way publish/subscribe
//! delivery into request/reply conversations, the transport and behavior
//! trait seams, and the supporting configuration and command plumbing.

/// Common utilities and structures used throughout the Courier framework.
pub(crate) mod common;

pub(crate) mod message;
/// Trait definitions used in the Courier framework.
pub(crate) mod traits;

/// Prelude module for convenient imports.
///
/// This module re-exports the commonly used items from the `common`,
/// `message` and `traits` modules, as well as the `async_trait` crate.
pub mod prelude {
    pub use async_trait;

    pub use crate::common::{
        reply_handler, run_command, BrokerConfig, CommandOutcome, CommandRequest, CorrelationId,
        DestinationsConfig, LoopbackBroker, ReplyHandler, TimeoutsConfig, Transaction,
        TransactionTable, Worker, WorkerConfig, WorkerError, WorkerHandle,
    };
    pub use crate::message::{
        temp_correlation, temp_destination, validate, Frame, FrameError, COMMAND_ASYNC,
        COMMAND_FIELD, COMMAND_SYNC, DESTINATION_HEADER, MESSAGE_ID_HEADER, OPERATION_FIELD,
        REPLY_TO_HEADER, TEMP_DESTINATION_PREFIX,
    };
    pub use crate::traits::{
        AckMode, BrokerTransport, SubscriptionHandle, TransportError, WorkerBehavior,
    };
}
