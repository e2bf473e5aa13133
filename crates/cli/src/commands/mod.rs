//! Subcommand implementations.

pub mod email;
pub mod profiles;
