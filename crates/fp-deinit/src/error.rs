use fp_core::error::{Error, LoweringError};
use fp_core::span::Span;

/// Wrap an emitter invariant violation with the span being lowered
pub fn lowering_error(err: LoweringError, span: Span) -> Error {
    Error::Lowering(span, err)
}

/// Attach `span` to a lowering error that was raised without one
pub fn with_span(err: Error, span: Span) -> Error {
    match err {
        Error::Lowering(existing, inner) if existing == Span::default() => {
            Error::Lowering(span, inner)
        }
        other => other,
    }
}

/// Macro to return early with a lowering error at a span
#[macro_export]
macro_rules! deinit_bail {
    ($err:expr) => {
        return Err(fp_core::error::Error::lowering($err))
    };
    ($err:expr, $span:expr) => {
        return Err($crate::error::lowering_error($err, $span))
    };
}

/// Macro to ensure a condition is true, or return a lowering error
#[macro_export]
macro_rules! deinit_ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            $crate::deinit_bail!($err);
        }
    };
    ($cond:expr, $err:expr, $span:expr) => {
        if !($cond) {
            $crate::deinit_bail!($err, $span);
        }
    };
}
