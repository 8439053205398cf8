//! Diagnostic and error reporting utilities

use crate::{CliError, Result};
use fp_core::diagnostics::{Diagnostic as LoweringNote, DiagnosticLevel};
use fp_core::error::{Error as CoreError, LoweringError};
use miette::Diagnostic;
use thiserror::Error;
use tracing::{info, warn};

/// Set up enhanced error reporting with miette
pub fn setup_error_reporting() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .map_err(|e| CliError::Config(format!("Failed to setup error reporting: {}", e)))?;

    Ok(())
}

/// User-facing rendering of a failed lowering.
#[derive(Error, Debug, Diagnostic)]
pub enum DeinitError {
    #[error("cannot lower destructors of `{class}`")]
    #[diagnostic(
        code(ferrophase::deinit::missing_superclass),
        help("declare `{superclass}` in the same declaration file")
    )]
    MissingSuperclass { class: String, superclass: String },

    #[error("unknown type `{name}`")]
    #[diagnostic(
        code(ferrophase::deinit::unknown_type),
        help("check the `--type` argument against the declaration file")
    )]
    UnknownType { name: String },

    #[error("{message}")]
    #[diagnostic(
        code(ferrophase::deinit::internal),
        help("this is a lowering bug; rerun with -vv for the emission trace")
    )]
    Internal { message: String },

    #[error("{message}")]
    #[diagnostic(code(ferrophase::deinit::input))]
    Input { message: String },
}

impl From<&CliError> for DeinitError {
    fn from(err: &CliError) -> Self {
        match err {
            CliError::Lowering(CoreError::Lowering(_, lowering)) => match lowering {
                LoweringError::MissingSuperclassDestructor { class, superclass } => {
                    DeinitError::MissingSuperclass {
                        class: class.clone(),
                        superclass: superclass.clone(),
                    }
                }
                LoweringError::UnknownType(name) => DeinitError::UnknownType { name: name.clone() },
                other => DeinitError::Internal {
                    message: other.to_string(),
                },
            },
            other => DeinitError::Input {
                message: other.to_string(),
            },
        }
    }
}

/// Renders lowering and input errors through the installed miette handler.
/// Returns false for errors the caller should log as plain text instead.
pub fn render_cli_error(err: &CliError) -> bool {
    match err {
        CliError::Lowering(_) | CliError::InvalidInput(_) => {
            let report = miette::Report::new(DeinitError::from(err));
            eprintln!("{:?}", report);
            true
        }
        CliError::Io(_) | CliError::Config(_) => false,
    }
}

/// Forwards notes collected during lowering to the log.
pub fn emit_lowering_notes(notes: &[LoweringNote]) {
    for note in notes {
        match note.level {
            DiagnosticLevel::Info => info!("{}", note),
            DiagnosticLevel::Warning | DiagnosticLevel::Error => warn!("{}", note),
        }
    }
}
