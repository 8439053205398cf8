use serde::{Deserialize, Serialize};

pub type FileId = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub file: FileId,
    pub lo: u32,
    pub hi: u32,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Span({}:{}-{})", self.file, self.lo, self.hi)
    }
}

impl Span {
    pub fn new(file: FileId, lo: u32, hi: u32) -> Span {
        Span { file, lo, hi }
    }
}

/// Where an instruction came from, as far as later passes care.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub span: Span,
    /// Compiler-synthesized code with no user-visible source.
    pub auto_generated: bool,
    /// Emitted while running cleanups rather than user statements.
    pub cleanup: bool,
}

impl Location {
    pub fn regular(span: Span) -> Self {
        Self {
            span,
            auto_generated: false,
            cleanup: false,
        }
    }

    pub fn mark_auto_generated(mut self) -> Self {
        self.auto_generated = true;
        self
    }

    pub fn as_cleanup(mut self) -> Self {
        self.cleanup = true;
        self
    }
}
