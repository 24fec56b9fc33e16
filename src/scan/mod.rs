//! Scan workflow core.
//!
//! - **Orchestrator**: [`ScanOrchestrator`] drives Setup → Discovery →
//!   Upload → Start → Poll against an [`crate::traits::AnalysisService`]
//! - **Policy**: [`empty_discovery_error`] and the workflow abort messages

pub mod orchestrator;

// Re-export commonly used types
pub use orchestrator::{
    empty_discovery_error, ScanError, ScanOrchestrator, NO_FILES_AT_ALL_MESSAGE,
    NO_HASHABLE_FILES_MESSAGE, NO_MANIFESTS_MESSAGE, UPLOAD_ERROR_MESSAGE,
};
