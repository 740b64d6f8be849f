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
use std::sync::Once;

use tracing_subscriber::EnvFilter;

use courier_worker::prelude::*;

// Declare the submodules.
pub mod behaviors;

// Ensures tracing initialization happens only once across all tests.
static INIT: Once = Once::new();

/// Initializes the global tracing subscriber for tests.
///
/// Controlled through `RUST_LOG`; defaults to `info` so test output stays
/// readable while still recording every dispatched frame.
pub fn initialize_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .compact()
            .init();
    });
}

/// A worker configuration pointing at the given destinations, with timeouts
/// left at their defaults.
#[allow(dead_code)]
pub fn worker_config(input: Option<&str>, output: Option<&str>) -> WorkerConfig {
    let mut config = WorkerConfig::default();
    config.destinations.input = input.map(str::to_string);
    config.destinations.output = output.map(str::to_string);
    config
}
