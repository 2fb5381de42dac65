// Re-export all model types for ease of use across the crate

pub mod audit;
pub mod document;
pub mod tenant;

pub use audit::*;
pub use document::*;
pub use tenant::*;
