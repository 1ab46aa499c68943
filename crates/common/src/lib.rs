//! framecast Common Utilities
//!
//! Shared infrastructure for all framecast crates:
//! - Error types and result aliases
//! - Monotonic and manual clocks for export timing
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
