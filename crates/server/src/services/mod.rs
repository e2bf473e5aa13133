//! Business logic services for the backend.
//!
//! # Services
//!
//! - `email` - The [`EmailSender`] seam, the development [`LogSender`] and
//!   verification email rendering
//! - `postmark` - Transactional email over the Postmark HTTPS API
//! - `verification` - Issuing one-time codes and checking them

pub mod email;
pub mod postmark;
pub mod verification;

pub use email::{DeliveryError, EmailSender, LogSender, RenderedEmail, render_verification_email};
pub use postmark::PostmarkClient;
pub use verification::{VerificationError, VerificationService};
