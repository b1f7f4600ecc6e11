// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for reading and writing documents

use som_lite_model::ModelError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Errors that can occur while reading or writing a document
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Document file does not exist
    #[error("Document not found: {}", .0.display())]
    NotFound(PathBuf),

    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document is not valid JSON or does not match the record layout
    #[error("Malformed document: {0}")]
    Json(#[from] serde_json::Error),

    /// Document content violates a model invariant (e.g. a reused identifier)
    #[error("Invalid document content: {0}")]
    Model(#[from] ModelError),
}
