//! Analysis service integration.
//!
//! - **Client**: [`SoosClient`], the HTTP implementation of
//!   [`crate::traits::AnalysisService`]
//! - **Discovery**: local manifest and hashable-file enumeration via
//!   [`discovery::discover_files`]

pub mod client;
pub mod discovery;

// Re-export commonly used types
pub use client::{format_final_status_message, SoosClient, API_KEY_HEADER};
pub use discovery::discover_files;
