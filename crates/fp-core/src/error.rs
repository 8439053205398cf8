use crate::span::Span;
use std::result;
use thiserror::Error;

/// An internal invariant the lowering itself violated.
///
/// These are emitter bugs, never user-facing diagnostics: the graph under
/// construction is unusable once one of them fires.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoweringError {
    #[error("missing destructor for superclass `{superclass}` of `{class}`")]
    MissingSuperclassDestructor { class: String, superclass: String },
    #[error("`{class}` has no superclass to forward the foreign deallocator to")]
    MissingForeignSuperclass { class: String },
    #[error("unknown nominal type `{0}`")]
    UnknownType(String),
    #[error("ownership mismatch in {context}: expected {expected}, found {found}")]
    OwnershipMismatch {
        context: String,
        expected: String,
        found: String,
    },
    #[error("illegal ownership conversion from {from} to {to}")]
    IllegalConversion { from: String, to: String },
    #[error("block bb{0} is already terminated")]
    AlreadyTerminated(u32),
    #[error("block bb{block} ({label}) was never terminated")]
    Unterminated { block: u32, label: String },
    #[error("`{0}` needs an open cleanup scope")]
    NoCleanupScope(String),
    #[error("no insertion point for `{0}`")]
    NoInsertionPoint(String),
    #[error("cannot discard block bb{0}: it is referenced or non-empty")]
    DiscardLiveBlock(u32),
    #[error("{0} cleanup scope(s) still open")]
    OpenCleanupScopes(usize),
    #[error("{kind} destructor cannot be emitted for `{ty}`")]
    UnsupportedKind { kind: String, ty: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Lowering error at {0}: {1}")]
    Lowering(Span, LoweringError),
    #[error("Generic error: {0}")]
    Generic(String),
}

impl Error {
    pub fn lowering(err: LoweringError) -> Self {
        Error::Lowering(Span::default(), err)
    }

    pub fn as_lowering(&self) -> Option<&LoweringError> {
        match self {
            Error::Lowering(_, err) => Some(err),
            Error::Generic(_) => None,
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

impl From<LoweringError> for Error {
    fn from(err: LoweringError) -> Self {
        Error::lowering(err)
    }
}
