//! Storynest Core - Shared domain types.
//!
//! This crate provides the types used across all Storynest components:
//! - `server` - Profile persistence and email verification HTTP backend
//! - `cli` - Command-line tools for inspecting profiles and sending test codes
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no file access, no HTTP
//! clients. Verification state transitions and onboarding flow rules live here
//! so they can be tested without a running server.
//!
//! # Modules
//!
//! - [`types`] - Validated wrappers for emails, profile ids and records
//! - [`verification`] - One-time codes and the verification handshake
//! - [`onboarding`] - Onboarding step controller and story personalisation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod onboarding;
pub mod types;
pub mod verification;

pub use onboarding::{
    OnboardingContext, OnboardingEvent, OnboardingFlow, OnboardingStep, Pronouns, TransitionError,
    personalize,
};
pub use types::*;
pub use verification::{
    CodeError, VerificationCode, VerificationSession, VerificationStatus, VerifyOutcome,
};
