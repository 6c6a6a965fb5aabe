//! Error types for trustline.
//!
//! Provides a unified error handling system using thiserror. Every error maps
//! to exactly one protocol response code via [`TrustError::response_code`].

mod types;

pub use types::*;
