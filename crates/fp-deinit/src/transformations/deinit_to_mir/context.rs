use super::*;

/// Name every destructor entry point is emitted under, whatever its kind.
pub const DEINIT_FN_NAME: &str = "deinit";

/// Read-only facts about the destructor being lowered.
///
/// Emission routines receive this explicitly instead of reaching for
/// process-wide state.
#[derive(Debug, Clone)]
pub struct LoweringCtx<'a> {
    pub fn_name: Symbol,
    pub decl: &'a NominalDecl,
    pub table: &'a DeclTable,
    pub options: &'a LoweringOptions,
    pub destructor: &'a DestructorDecl,
    pub kind: DestructorKind,
    pub location: Location,
}

impl<'a> LoweringCtx<'a> {
    pub fn new(
        decl: &'a NominalDecl,
        table: &'a DeclTable,
        options: &'a LoweringOptions,
        destructor: &'a DestructorDecl,
        kind: DestructorKind,
    ) -> Self {
        let mut location = Location::regular(destructor.span);
        if destructor.implicit {
            location = location.mark_auto_generated();
        }
        Self {
            fn_name: Symbol::new(DEINIT_FN_NAME),
            decl,
            table,
            options,
            destructor,
            kind,
            location,
        }
    }

    pub fn self_ty(&self) -> Ty {
        self.decl.declared_ty()
    }

    pub fn self_object(&self) -> LoweredTy {
        LoweredTy::object(self.self_ty())
    }

    /// Substitutions that map the type's own generic parameters to themselves.
    pub fn forwarding_substitutions(&self) -> SubstitutionMap {
        SubstitutionMap::forwarding(&self.decl.generic_params)
    }

    /// `(self) -> ()` with self passed at `convention`.
    pub fn consuming_sig(&self, convention: ParamConvention) -> FnSig {
        FnSig {
            params: vec![(self.self_ty(), convention)],
            result: Ty::unit(),
            thin: true,
        }
    }

    /// Signature of the entry point named by `kind`.
    pub fn signature(&self) -> FnSig {
        match self.kind {
            DestructorKind::Destroying => destroyer_sig(self.self_ty()),
            DestructorKind::IVarDestroyer => self.consuming_sig(self.ivar_self_convention()),
            DestructorKind::Deallocating { .. }
            | DestructorKind::IsolatingDeallocator
            | DestructorKind::MoveOnlyDeallocator
            | DestructorKind::Foreign => self.consuming_sig(ParamConvention::Owned),
        }
    }

    /// Foreign classes hand the ivar destroyer an unowned self.
    pub fn ivar_self_convention(&self) -> ParamConvention {
        match self.decl.as_class() {
            Some(class) if class.foreign => ParamConvention::Unowned,
            _ => ParamConvention::Guaranteed,
        }
    }
}

/// `(@guaranteed C) -> @owned NativeObject`
pub(super) fn destroyer_sig(class: Ty) -> FnSig {
    FnSig {
        params: vec![(class, ParamConvention::Guaranteed)],
        result: Ty::native_object(),
        thin: true,
    }
}

/// Builder state for one destructor body.
pub(super) struct DeinitEmitter<'a> {
    pub(super) ctx: LoweringCtx<'a>,
    pub(super) b: FunctionBuilder,
    bodies: &'a mut dyn BodyEmitter,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> DeinitEmitter<'a> {
    pub(super) fn new(
        ctx: LoweringCtx<'a>,
        bodies: &'a mut dyn BodyEmitter,
        diagnostics: &'a mut Vec<Diagnostic>,
    ) -> Self {
        let b = FunctionBuilder::new(ctx.fn_name.clone(), ctx.location);
        Self {
            ctx,
            b,
            bodies,
            diagnostics,
        }
    }

    /// Runs `body` inside a cleanup scope of the function being built.
    pub(super) fn scoped<T>(&mut self, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.b.push_scope();
        let value = body(self)?;
        self.b.pop_scope()?;
        Ok(value)
    }

    pub(super) fn note(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Declares the self parameter held at `ownership`.
    pub(super) fn emit_self_decl(&mut self, ownership: Ownership) -> ValueHandle {
        let value = self.b.add_param(self.ctx.self_object(), Some(ownership));
        ValueHandle::assume(value, ownership)
    }

    /// Trap call for destructors that must never run.
    pub(super) fn emit_unavailable_stub(&mut self) -> Result<()> {
        if !self.ctx.destructor.unavailable {
            return Ok(());
        }
        let sig = FnSig {
            params: Vec::new(),
            result: Ty::unit(),
            thin: true,
        };
        let callee = self
            .b
            .function_ref(Callee::Runtime(RuntimeFunction::UnavailableCodeReached), sig)?;
        self.b.apply(callee, SubstitutionMap::empty(), &[])?;
        Ok(())
    }

    /// The actor whose executor the destructor's isolation names, if any.
    pub(super) fn emit_executor_actor(&mut self, self_value: ValueHandle) -> Result<Option<ValueHandle>> {
        match &self.ctx.destructor.isolation {
            ActorIsolation::ActorInstance => Ok(Some(self_value)),
            ActorIsolation::GlobalActor(actor) => {
                Ok(Some(self.b.global_actor_instance(actor.clone())?))
            }
            ActorIsolation::Unspecified | ActorIsolation::Nonisolated => Ok(None),
        }
    }

    /// Traps at run time unless the current executor is `actor`'s.
    pub(super) fn emit_precondition_expected_executor(&mut self, actor: ValueHandle) -> Result<()> {
        let executor = self.b.extract_executor(actor)?;
        let sig = FnSig {
            params: vec![(Ty::executor(), ParamConvention::Unowned)],
            result: Ty::unit(),
            thin: true,
        };
        let check = self.b.function_ref(
            Callee::Runtime(RuntimeFunction::PreconditionExpectedExecutor),
            sig,
        )?;
        self.b.apply(check, SubstitutionMap::empty(), &[executor])?;
        Ok(())
    }

    /// Lowers the user body, if any, at the insertion point. Returns false
    /// when control never reaches `epilog` and emission must stop.
    pub(super) fn emit_user_body(&mut self, epilog: BasicBlockId) -> Result<bool> {
        if let Some(body) = self.ctx.destructor.body.clone() {
            if self.ctx.options.emit_profiler_counters {
                self.b.profiler_increment(body.name.clone())?;
            }
            let exit = self.bodies.emit_body(&mut self.b, &body, epilog)?;
            trace!(body = %body.name, ?exit, "lowered deinit body");
        }
        self.emit_epilog(epilog)
    }

    /// Moves the insertion point into `epilog`.
    ///
    /// An epilog only reached by falling through is dropped and emission
    /// continues in the current block; an epilog nobody reaches is dropped
    /// and reports false.
    fn emit_epilog(&mut self, epilog: BasicBlockId) -> Result<bool> {
        let reached = !self.b.predecessors_of(epilog).is_empty();
        match (self.b.has_insertion_point(), reached) {
            (true, false) => {
                self.b.discard_block(epilog)?;
                Ok(true)
            }
            (true, true) => {
                self.b.branch(epilog)?;
                self.b.emit_block(epilog)?;
                Ok(true)
            }
            (false, true) => {
                self.b.emit_block(epilog)?;
                Ok(true)
            }
            (false, false) => {
                self.b.discard_block(epilog)?;
                debug!(ty = %self.ctx.decl.name, "deinit body never returns");
                Ok(false)
            }
        }
    }

    /// Location for compiler-inserted teardown after the user body.
    pub(super) fn enter_cleanup_location(&mut self) {
        let cleanup = self.ctx.location.mark_auto_generated().as_cleanup();
        self.b.set_location(cleanup);
    }

    pub(super) fn emit_return_unit(&mut self) -> Result<()> {
        let unit = self.b.empty_tuple()?;
        self.b.return_value(unit)
    }

    pub(super) fn finish(self) -> Result<Function> {
        let sig = self.ctx.signature();
        let body = self
            .b
            .finish(sig.result.clone(), self.ctx.options.verify_completeness)?;
        Ok(Function {
            decl_ref: self.ctx.kind.decl_ref(&self.ctx.decl.name),
            sig,
            body,
        })
    }
}
