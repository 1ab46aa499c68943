//! framecast Export Model
//!
//! Defines the data contracts an export is configured with:
//! - **Range:** The inclusive frame interval to render
//! - **Settings:** Video/audio encoder parameters and export type
//! - **Output:** Resolution of the final output file path
//! - **Snapshot:** Ordered `{name, kind, value}` records of the last used settings
//!
//! Frame numbers are 1-based, matching timeline positions.

pub mod output;
pub mod range;
pub mod settings;
pub mod snapshot;

pub use output::*;
pub use range::*;
pub use settings::*;
pub use snapshot::*;

/// Errors that can occur when building export model values.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid frame range {start}..={end}: start must be at least 1 and below end")]
    InvalidRange { start: u64, end: u64 },

    #[error("Malformed settings snapshot: {source}")]
    Snapshot {
        #[source]
        source: serde_json::Error,
    },

    #[error("Setting '{name}' expected a {expected} value")]
    SettingKind { name: String, expected: &'static str },
}
