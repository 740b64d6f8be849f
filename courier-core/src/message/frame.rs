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

use std::collections::HashMap;

use crate::common::CorrelationId;
use crate::message::FrameError;

/// Header carrying the destination a frame was delivered on.
pub const DESTINATION_HEADER: &str = "destination";

/// Header naming the destination the sender wants its answer on.
///
/// Presence of this header is the signal that the sender expects a reply.
pub const REPLY_TO_HEADER: &str = "reply-to";

/// Broker-assigned identifier, used only for acknowledgment.
pub const MESSAGE_ID_HEADER: &str = "message-id";

/// Reserved namespace for ephemeral reply destinations.
///
/// Ephemeral destinations are named `<prefix>.<correlation-id>` so an inbound
/// frame's destination can be parsed back into a correlation id without any
/// side channel. Remote parties echo this value back verbatim, so the format
/// is a wire contract and must stay bit-exact.
pub const TEMP_DESTINATION_PREFIX: &str = "/queue/temp";

/// One broker message unit: a destination, optional headers and an opaque body.
///
/// Frames are immutable once received; the engine only reads them for the
/// scope of one dispatch. Bodies are JSON documents by convention but the
/// frame itself treats them as bytes.
#[derive(Clone, Debug)]
pub struct Frame {
    destination: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl Frame {
    /// Creates a frame addressed to `destination` with a raw body.
    #[must_use]
    pub fn new(destination: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            destination: destination.into(),
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Creates a frame whose body is the given JSON document.
    #[must_use]
    pub fn json(destination: impl Into<String>, document: &serde_json::Value) -> Self {
        // Serializing a serde_json::Value cannot fail: numbers are finite and
        // map keys are strings by construction.
        let body = serde_json::to_vec(document).expect("serializing a JSON value is infallible");
        Self::new(destination, body)
    }

    /// Adds a header, replacing any previous value.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds a `reply-to` header, marking the frame as expecting a reply.
    #[must_use]
    pub fn with_reply_to(self, destination: impl Into<String>) -> Self {
        self.with_header(REPLY_TO_HEADER, destination)
    }

    /// The destination this frame was sent to or delivered on.
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Looks up an optional header by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// The destination the sender wants its answer on, if any.
    #[must_use]
    pub fn reply_to(&self) -> Option<&str> {
        self.header(REPLY_TO_HEADER)
    }

    /// The broker-assigned message identifier, if the transport set one.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.header(MESSAGE_ID_HEADER)
    }

    /// The raw frame body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Parses the body as a JSON document.
    pub fn body_json(&self) -> Result<serde_json::Value, FrameError> {
        serde_json::from_slice(&self.body).map_err(|err| FrameError::MalformedBody(err.to_string()))
    }

    /// One-line summary of the frame for log output.
    #[must_use]
    pub fn info(&self) -> String {
        let mut info = format!("destination={}", self.destination);
        if let Some(id) = self.message_id() {
            info.push_str(&format!(" message-id={id}"));
        }
        if let Some(reply_to) = self.reply_to() {
            info.push_str(&format!(" reply-to={reply_to}"));
        }
        info
    }
}

/// Names the ephemeral destination a reply for `id` must arrive on.
#[must_use]
pub fn temp_destination(id: &CorrelationId) -> String {
    format!("{TEMP_DESTINATION_PREFIX}.{id}")
}

/// Parses an ephemeral destination back into its correlation id.
///
/// Returns `None` for destinations outside the reserved temp namespace.
#[must_use]
pub fn temp_correlation(destination: &str) -> Option<CorrelationId> {
    let id = destination
        .strip_prefix(TEMP_DESTINATION_PREFIX)?
        .strip_prefix('.')?;
    if id.is_empty() {
        return None;
    }
    Some(CorrelationId::from(id))
}
