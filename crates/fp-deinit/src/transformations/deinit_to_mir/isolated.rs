//! Scheduling an isolated deinit onto its actor's executor.

use super::*;

/// Flags word passed to the executor-hop runtime call.
///
/// No bit has a defined meaning yet; the field is carried so the call shape
/// stays stable when one is added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DeinitFlags(u64);

impl DeinitFlags {
    pub const RESERVED: DeinitFlags = DeinitFlags(0);

    pub fn bits(&self) -> u64 {
        self.0
    }
}

impl DeinitEmitter<'_> {
    /// `deinitOnExecutor(self as AnyObject, isolatedDeallocator, executor, flags)`
    ///
    /// Self is handed over at +1; the runtime either runs the isolated
    /// deallocator inline or enqueues it on `executor`.
    pub(super) fn emit_isolated_deallocation_schedule(&mut self, self_value: ValueHandle) -> Result<()> {
        let decl = self.ctx.decl;
        let self_ty = self.ctx.self_ty();

        let isolated = DeclRef::new(decl.name.clone(), DeclRefKind::IsolatedDeallocator);
        let dealloc = self.b.function_ref(
            Callee::Decl(isolated),
            self.ctx.consuming_sig(ParamConvention::Owned),
        )?;

        let executor = self.scoped(|e| {
            let Some(actor) = e.emit_executor_actor(self_value)? else {
                return Err(LoweringError::UnsupportedKind {
                    kind: DestructorKind::IsolatingDeallocator.name().to_string(),
                    ty: decl.name.to_string(),
                }
                .into());
            };
            e.b.extract_executor(actor)
        })?;

        let work_sig = FnSig {
            params: vec![(Ty::any_object(), ParamConvention::Owned)],
            result: Ty::unit(),
            thin: true,
        };
        let schedule_sig = FnSig {
            params: vec![
                (Ty::any_object(), ParamConvention::Owned),
                (Ty::function(work_sig.clone()), ParamConvention::Unowned),
                (Ty::executor(), ParamConvention::Unowned),
                (Ty::word(), ParamConvention::Unowned),
            ],
            result: Ty::unit(),
            thin: true,
        };
        let schedule = self.b.function_ref(
            Callee::Runtime(RuntimeFunction::DeinitOnExecutor),
            schedule_sig,
        )?;

        trace!(ty = %self_ty, "scheduling isolated deallocation");
        let erased_self = self.b.init_existential_ref(self_value, Ty::any_object())?;
        let work = self.b.convert_function(dealloc, work_sig)?;
        let flags = self
            .b
            .integer_literal(Ty::word(), DeinitFlags::RESERVED.bits() as i128)?;

        self.b.apply(
            schedule,
            SubstitutionMap::empty(),
            &[erased_self.value, work, executor, flags],
        )?;
        Ok(())
    }
}
