// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with saving and restoring convolution functions.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Can't save the convolution function: {0}")]
    Serialization(String),

    #[error("Couldn't restore '{field}' from the record: {reason}")]
    Deserialization { field: String, reason: String },

    /// An IO error, e.g. when reading or writing a record file.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// An error associated with the serde_json crate.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
