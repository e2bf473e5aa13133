//! Profile persistence.
//!
//! # Document layout
//!
//! All durable state lives in one JSON document:
//!
//! ```json
//! {
//!   "user_profiles": {
//!     "<pin>": { "childName": "Maya", "pronouns": "she/her", "...": "..." }
//!   }
//! }
//! ```
//!
//! Other top-level keys are preserved when the document is rewritten.
//!
//! # Consistency
//!
//! - Every write is a full read-modify-write of the document, serialised by a
//!   single-writer lock owned by [`ProfileStore`] and by an exclusive advisory
//!   lock on `.{name}.lock`, which also excludes writers in other processes.
//! - The new document is written to a sibling temp file, fsynced and renamed
//!   over the original, so readers never observe a partial document.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub mod profiles;

pub use profiles::ProfileStore;

/// Errors that can occur during profile store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document could not be read (missing file, permissions).
    #[error("failed to read profile document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The document could not be written (permissions, disk full).
    #[error("failed to write profile document {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The document is not valid JSON or does not have the expected shape.
    #[error("profile document {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Requested profile was not found.
    #[error("profile not found: {0}")]
    NotFound(String),
}
