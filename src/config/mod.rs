//! Configuration module for trustline.
//!
//! Handles loading and validating token policy, replay and logging settings
//! from TOML files.

mod settings;

pub use settings::*;
