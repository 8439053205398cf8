#[macro_use]
pub mod macros;

pub mod config;
pub mod decl;
pub mod diagnostics;
pub mod error;
pub mod mir;
pub mod pretty;
pub mod span;

// Re-export commonly used items for convenience
pub use tracing;

// Alias for error types
pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
