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

pub use command::{run_command, CommandOutcome, CommandRequest};
pub use config::{BrokerConfig, DestinationsConfig, TimeoutsConfig, WorkerConfig};
pub use handle::WorkerHandle;
pub use loopback::LoopbackBroker;
pub use transactions::{
    reply_handler, CorrelationId, ReplyHandler, Transaction, TransactionTable,
};
pub use worker::Worker;
pub use worker_error::WorkerError;

mod command;
mod config;
mod handle;
mod loopback;
mod transactions;
mod worker;
mod worker_error;
