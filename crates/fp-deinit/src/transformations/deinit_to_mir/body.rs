use super::*;

/// How control left a lowered user body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyExit {
    /// The insertion point is still live after the body.
    FallsThrough,
    /// The body ended every path itself (a trap or an early branch to the epilog).
    Diverges,
}

/// Lowers a user-written deinit body into the destructor being built.
///
/// Statement lowering lives outside this crate; implementors get the builder
/// positioned at the body's entry. Early exits must branch to `epilog`.
/// Falling through is left to the caller, which decides whether the epilog
/// block is needed at all.
pub trait BodyEmitter {
    fn emit_body(
        &mut self,
        builder: &mut FunctionBuilder,
        body: &DeinitBody,
        epilog: BasicBlockId,
    ) -> Result<BodyExit>;
}

/// Emits each body as a single opaque `user_body` instruction.
#[derive(Debug, Clone, Default)]
pub struct OpaqueBodyEmitter;

impl BodyEmitter for OpaqueBodyEmitter {
    fn emit_body(
        &mut self,
        builder: &mut FunctionBuilder,
        body: &DeinitBody,
        _epilog: BasicBlockId,
    ) -> Result<BodyExit> {
        builder.user_body(body.name.clone())?;
        if body.diverges {
            builder.unreachable()?;
            return Ok(BodyExit::Diverges);
        }
        Ok(BodyExit::FallsThrough)
    }
}
