/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! Frame types, frame errors and frame validation.

pub use frame::{
    temp_correlation, temp_destination, Frame, DESTINATION_HEADER, MESSAGE_ID_HEADER,
    REPLY_TO_HEADER, TEMP_DESTINATION_PREFIX,
};
pub use frame_error::FrameError;
pub use validation::{validate, COMMAND_ASYNC, COMMAND_FIELD, COMMAND_SYNC, OPERATION_FIELD};

mod frame;
mod frame_error;
mod validation;
