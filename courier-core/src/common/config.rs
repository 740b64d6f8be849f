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

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for a Courier worker.
///
/// Loaded from a TOML file; every table and value has a default, so a partial
/// file (or none at all) is valid.
///
/// # Example Configuration File
///
/// ```toml
/// [broker]
/// host = "10.0.0.5"
/// port = 61613
/// login = "worker"
/// passcode = "secret"
///
/// [destinations]
/// input = "/queue/in"
/// output = "/topic/out"
///
/// [timeouts]
/// transaction_ttl_ms = 300000
/// sweep_interval_ms = 30000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Broker session settings.
    pub broker: BrokerConfig,
    /// Input and output destinations.
    pub destinations: DestinationsConfig,
    /// Transaction lifetime settings.
    pub timeouts: TimeoutsConfig,
}

/// Broker endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker hostname or IP.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Session login.
    pub login: String,
    /// Session passcode.
    pub passcode: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 61613,
            login: "admin".to_string(),
            passcode: "password".to_string(),
        }
    }
}

impl BrokerConfig {
    /// The TCP endpoint string for this broker.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

/// Destinations the worker consumes from and publishes to.
///
/// Both are optional: a worker without an `input` receives nothing (and
/// [`run`](crate::common::Worker::run) says so), and a worker without an
/// `output` must name a destination on every publish.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationsConfig {
    /// Destination to subscribe to for inbound work.
    pub input: Option<String>,
    /// Default destination for outbound publishes.
    pub output: Option<String>,
}

/// Transaction lifetime configuration.
///
/// All values are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Age at which an unanswered transaction is considered abandoned.
    pub transaction_ttl_ms: u64,
    /// How often the receive loop sweeps for abandoned transactions.
    pub sweep_interval_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            transaction_ttl_ms: 300_000,
            sweep_interval_ms: 30_000,
        }
    }
}

impl TimeoutsConfig {
    /// The transaction time-to-live as a `Duration`.
    #[must_use]
    pub fn transaction_ttl(&self) -> Duration {
        Duration::from_millis(self.transaction_ttl_ms)
    }

    /// The sweep interval as a `Duration`.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl WorkerConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("could not parse config file {}", path.display()))?;
        debug!(path = %path.display(), "worker configuration loaded");
        Ok(config)
    }
}
