pub mod api;
pub mod commands;
pub mod config;
pub mod git;
pub mod markdown;
pub mod model;
pub mod progress;
pub mod scan;
pub mod traits;

// Re-export common types for convenience
pub use api::*;
pub use model::*;
pub use progress::*;
pub use scan::*;
pub use traits::*;
