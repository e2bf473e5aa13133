//! Core types for Storynest.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod profile;

pub use email::{Email, EmailError};
pub use profile::{ProfileId, ProfileIdError, ProfileRecord};
