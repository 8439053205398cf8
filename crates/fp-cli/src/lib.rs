//! FerroPhase destructor-lowering CLI library
//!
//! Loads nominal type declarations from JSON, lowers their destructors to
//! MIR and renders the result.

pub mod commands;
pub mod config;
pub mod diagnostics;

// CLI-specific error handling
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum CliError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Lowering error: {0}")]
        Lowering(#[from] fp_core::error::Error),

        #[error("Invalid input: {0}")]
        InvalidInput(String),
    }

    pub type Result<T> = std::result::Result<T, CliError>;
}

pub use error::{CliError, Result};
