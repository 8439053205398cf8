use fp_core::config::LoweringOptions;
use fp_core::decl::{
    ActorIsolation, DeclTable, DeinitBody, DestructorDecl, MemberIsolation, NominalDecl,
    NominalKind, StoredMember, SubstitutionMap,
};
use fp_core::diagnostics::Diagnostic;
use fp_core::error::{LoweringError, Result};
use fp_core::mir::{
    AccessKind, BasicBlockId, BuiltinKind, Callee, Cleanup, DeclRef, DeclRefKind, FnSig, Function,
    FunctionBuilder, LoadQualifier, LoweredTy, Module, Ownership, ParamConvention,
    RuntimeFunction, StatementKind, StoreQualifier, SwitchCase, Symbol, Ty, ValueHandle, ValueId,
};
use fp_core::span::Location;
use fp_core::{debug, info, trace};

use super::IrTransform;
use crate::deinit_ensure;
use crate::error::with_span;

mod body;
mod class_members;
mod context;
mod distributed;
mod driver;
mod isolated;
mod move_only;

#[cfg(test)]
mod tests;

pub use body::{BodyEmitter, BodyExit, OpaqueBodyEmitter};
pub use class_members::find_recursive_links;
pub use context::{LoweringCtx, DEINIT_FN_NAME};
pub use isolated::DeinitFlags;

use context::DeinitEmitter;

/// Which end-of-life entry point of a type is being produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestructorKind {
    /// Runs the user body and member teardown; returns self as an owned
    /// native object without freeing it.
    Destroying,
    /// Destroys and frees. `isolated` marks the entry point the executor
    /// scheduler hops to for an isolated deinit.
    Deallocating { isolated: bool },
    /// Public deallocator of an isolated deinit; schedules the isolated
    /// deallocator on the actor's executor.
    IsolatingDeallocator,
    /// Member teardown for partially initialized instances.
    IVarDestroyer,
    /// Consumes a non-copyable struct or enum value.
    MoveOnlyDeallocator,
    /// Deallocator called by the foreign object runtime.
    Foreign,
}

impl DestructorKind {
    pub fn decl_ref(&self, owner: &Symbol) -> DeclRef {
        match self {
            DestructorKind::Destroying => DeclRef::new(owner.clone(), DeclRefKind::Destroyer),
            DestructorKind::Deallocating { isolated: true } => {
                DeclRef::new(owner.clone(), DeclRefKind::IsolatedDeallocator)
            }
            DestructorKind::Deallocating { isolated: false }
            | DestructorKind::IsolatingDeallocator
            | DestructorKind::MoveOnlyDeallocator => {
                DeclRef::new(owner.clone(), DeclRefKind::Deallocator)
            }
            DestructorKind::IVarDestroyer => {
                DeclRef::new(owner.clone(), DeclRefKind::IVarDestroyer)
            }
            DestructorKind::Foreign => {
                DeclRef::new(owner.clone(), DeclRefKind::Deallocator).as_foreign()
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DestructorKind::Destroying => "destroying",
            DestructorKind::Deallocating { isolated: false } => "deallocating",
            DestructorKind::Deallocating { isolated: true } => "isolated-deallocating",
            DestructorKind::IsolatingDeallocator => "isolating",
            DestructorKind::IVarDestroyer => "ivar-destroyer",
            DestructorKind::MoveOnlyDeallocator => "move-only",
            DestructorKind::Foreign => "foreign",
        }
    }

    /// Parses the names printed by [`DestructorKind::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "destroying" => DestructorKind::Destroying,
            "deallocating" => DestructorKind::Deallocating { isolated: false },
            "isolated-deallocating" => DestructorKind::Deallocating { isolated: true },
            "isolating" => DestructorKind::IsolatingDeallocator,
            "ivar-destroyer" => DestructorKind::IVarDestroyer,
            "move-only" => DestructorKind::MoveOnlyDeallocator,
            "foreign" => DestructorKind::Foreign,
            _ => return None,
        })
    }

    fn requires_class(&self) -> bool {
        !matches!(self, DestructorKind::MoveOnlyDeallocator)
    }

    /// Every entry point `decl` needs, in emission order.
    pub fn applicable(decl: &NominalDecl) -> Vec<DestructorKind> {
        let Some(class) = decl.as_class() else {
            return if decl.move_only {
                vec![DestructorKind::MoveOnlyDeallocator]
            } else {
                Vec::new()
            };
        };
        let destructor = decl.destructor();
        let mut kinds = vec![DestructorKind::Destroying];
        if class.foreign {
            kinds.push(DestructorKind::Foreign);
        } else if destructor.isolated && destructor.isolation.has_actor() {
            kinds.push(DestructorKind::IsolatingDeallocator);
            kinds.push(DestructorKind::Deallocating { isolated: true });
        } else {
            kinds.push(DestructorKind::Deallocating { isolated: false });
        }
        if decl.stored_members.iter().any(|member| !member.trivial) {
            kinds.push(DestructorKind::IVarDestroyer);
        }
        kinds
    }
}

/// Lowers destructors of nominal types into MIR functions.
pub struct DeinitLowering {
    options: LoweringOptions,
    body_emitter: Box<dyn BodyEmitter>,
    diagnostics: Vec<Diagnostic>,
}

impl Default for DeinitLowering {
    fn default() -> Self {
        Self::new(LoweringOptions::default())
    }
}

impl DeinitLowering {
    pub fn new(options: LoweringOptions) -> Self {
        Self::with_body_emitter(options, Box::new(OpaqueBodyEmitter::default()))
    }

    /// Uses `body_emitter` to lower user-written deinit bodies.
    pub fn with_body_emitter(options: LoweringOptions, body_emitter: Box<dyn BodyEmitter>) -> Self {
        Self {
            options,
            body_emitter,
            diagnostics: Vec::new(),
        }
    }

    pub fn options(&self) -> &LoweringOptions {
        &self.options
    }

    /// Notes collected while lowering, e.g. skipped chain optimizations.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Lowers one entry point of the type named `ty`.
    pub fn lower(&mut self, table: &DeclTable, ty: &str, kind: DestructorKind) -> Result<Function> {
        let decl = table.lookup(&Symbol::new(ty))?;
        self.lower_decl(table, decl, kind)
    }

    pub fn lower_decl(
        &mut self,
        table: &DeclTable,
        decl: &NominalDecl,
        kind: DestructorKind,
    ) -> Result<Function> {
        let destructor = decl.destructor();
        let span = destructor.span;
        self.lower_with(table, decl, &destructor, kind)
            .map_err(|err| with_span(err, span))
    }

    /// Every applicable entry point of `decl`.
    pub fn lower_type_destructors(&mut self, table: &DeclTable, decl: &NominalDecl) -> Result<Module> {
        let mut module = Module::new();
        for kind in DestructorKind::applicable(decl) {
            module.insert(self.lower_decl(table, decl, kind)?);
        }
        Ok(module)
    }

    /// Every applicable entry point of every type in `table`.
    pub fn lower_table(&mut self, table: &DeclTable) -> Result<Module> {
        let mut module = Module::new();
        for decl in table.iter() {
            module.extend(self.lower_type_destructors(table, decl)?);
        }
        info!(
            types = table.len(),
            functions = module.len(),
            "lowered destructors"
        );
        Ok(module)
    }

    fn lower_with(
        &mut self,
        table: &DeclTable,
        decl: &NominalDecl,
        destructor: &DestructorDecl,
        kind: DestructorKind,
    ) -> Result<Function> {
        let supported = if kind.requires_class() {
            decl.is_class()
        } else {
            !decl.is_class() && decl.move_only
        };
        deinit_ensure!(
            supported,
            LoweringError::UnsupportedKind {
                kind: kind.name().to_string(),
                ty: decl.name.to_string(),
            },
            decl.span
        );
        debug!(ty = %decl.name, kind = kind.name(), "lowering destructor");

        let ctx = LoweringCtx::new(decl, table, &self.options, destructor, kind);
        let mut emitter =
            DeinitEmitter::new(ctx, self.body_emitter.as_mut(), &mut self.diagnostics);
        match kind {
            DestructorKind::Destroying => emitter.emit_destroying_destructor()?,
            DestructorKind::Deallocating { isolated } => {
                emitter.emit_deallocating_class_destructor(isolated)?
            }
            DestructorKind::IsolatingDeallocator => emitter.emit_isolating_destructor()?,
            DestructorKind::IVarDestroyer => emitter.emit_ivar_destroyer()?,
            DestructorKind::MoveOnlyDeallocator => emitter.emit_move_only_deallocator()?,
            DestructorKind::Foreign => emitter.emit_foreign_destructor()?,
        }
        emitter.finish()
    }
}

impl<'t> IrTransform<&'t DeclTable, Module> for DeinitLowering {
    fn transform(&mut self, source: &'t DeclTable) -> Result<Module> {
        self.lower_table(source)
    }
}
