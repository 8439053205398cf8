//! Entry points for each destructor kind.

use super::context::destroyer_sig;
use super::*;

impl DeinitEmitter<'_> {
    /// `deinit` body, superclass destroyer, member teardown. Hands self back
    /// as an owned native object for the deallocator to free.
    pub(super) fn emit_destroying_destructor(&mut self) -> Result<()> {
        let decl = self.ctx.decl;
        let table = self.ctx.table;

        self.emit_unavailable_stub()?;
        let self_value = self.emit_self_decl(Ownership::Guaranteed);

        if let Some(actor) = self.emit_executor_actor(self_value)? {
            self.emit_precondition_expected_executor(actor)?;
        }

        let epilog = self.b.create_block("epilog");
        if !self.emit_user_body(epilog)? {
            return Ok(());
        }
        self.enter_cleanup_location();

        let class = decl.as_class().cloned().unwrap_or_default();
        let superclass = if class.native_foreign_root_subclass {
            None
        } else {
            table.superclass_of(decl)?
        };

        let result = match superclass {
            Some((super_decl, super_ty)) => {
                if !super_decl.is_class() {
                    return Err(LoweringError::MissingSuperclassDestructor {
                        class: decl.name.to_string(),
                        superclass: super_decl.name.to_string(),
                    }
                    .into());
                }
                let mut subs =
                    SubstitutionMap::new(&super_decl.generic_params, super_ty.nominal_args());
                if subs.all_concrete() {
                    subs = SubstitutionMap::empty();
                }
                let base_self = self.b.upcast(self_value, super_ty.clone())?;
                let destroyer = DeclRef::new(super_decl.name.clone(), DeclRefKind::Destroyer);
                let callee = self
                    .b
                    .function_ref(Callee::Decl(destroyer), destroyer_sig(super_ty))?;
                self.b.apply(callee, subs, &[base_self.value])?
            }
            None => self_value,
        };

        self.scoped(|e| e.emit_member_teardown(result, self_value))?;

        let mut result = result;
        if self.b.value(result.value).ty.ty != Ty::native_object() {
            result = self.b.unchecked_ref_cast(result, Ty::native_object())?;
        }
        if result.ownership != Ownership::Owned {
            self.b
                .expect_ownership(result, Ownership::Guaranteed, "destroyer result")?;
            result = self.b.convert_ownership(result, Ownership::Owned)?;
        }
        self.b.return_value(result.value)
    }

    /// Borrows the destroyer's working value as the concrete class, resigns a
    /// distributed actor's identity, then destroys members.
    fn emit_member_teardown(&mut self, result: ValueHandle, self_value: ValueHandle) -> Result<()> {
        let self_ty = self.ctx.self_ty();
        let borrowed = self.b.borrow_object(result)?;
        let borrowed = if self.b.value(borrowed.value).ty.ty == self_ty {
            borrowed
        } else {
            self.b.unchecked_ref_cast(borrowed, self_ty)?
        };
        if self.ctx.decl.is_distributed_actor() {
            self.emit_distributed_resign_id(self_value)?;
        }
        self.emit_class_member_destruction(borrowed)
    }

    /// Calls the destroyer, then frees the storage.
    pub(super) fn emit_deallocating_class_destructor(&mut self, isolated: bool) -> Result<()> {
        self.ctx.location = self.ctx.location.mark_auto_generated();
        self.b.set_location(self.ctx.location);

        self.emit_unavailable_stub()?;
        let self_value = self.emit_self_decl(Ownership::Owned);

        self.emit_distributed_remote_actor_deinit(self_value, isolated, |e| {
            let class_ty = e.ctx.self_ty();
            let destroyer = DeclRef::new(e.ctx.decl.name.clone(), DeclRefKind::Destroyer);
            let callee = e
                .b
                .function_ref(Callee::Decl(destroyer), destroyer_sig(class_ty.clone()))?;
            let subs = e.ctx.forwarding_substitutions();
            let destroyed = e.b.with_scope(|b| {
                let borrowed = b.begin_borrow(self_value)?;
                b.apply(callee, subs, &[borrowed.value])
            })?;
            e.b.end_lifetime(self_value)?;
            let object = e.b.unchecked_ref_cast(destroyed, class_ty)?;
            e.b.dealloc_ref(object)
        })
    }

    /// Public deallocator of an isolated deinit: hands the instance to the
    /// actor's executor instead of tearing it down in place.
    pub(super) fn emit_isolating_destructor(&mut self) -> Result<()> {
        self.ctx.location = self.ctx.location.mark_auto_generated();
        self.b.set_location(self.ctx.location);

        let self_value = self.emit_self_decl(Ownership::Owned);
        self.emit_distributed_remote_actor_deinit(self_value, false, |e| {
            e.emit_isolated_deallocation_schedule(self_value)
        })
    }

    /// Member teardown only, for instances whose initialization did not finish.
    pub(super) fn emit_ivar_destroyer(&mut self) -> Result<()> {
        self.ctx.location = self.ctx.location.mark_auto_generated();
        self.b.set_location(self.ctx.location);

        let ownership = match self.ctx.ivar_self_convention() {
            ParamConvention::Unowned => Ownership::Unowned,
            _ => Ownership::Guaranteed,
        };
        let self_value = self.emit_self_decl(ownership);

        self.scoped(|e| e.emit_ivar_teardown(self_value))?;
        self.emit_return_unit()
    }

    fn emit_ivar_teardown(&mut self, self_value: ValueHandle) -> Result<()> {
        let self_value = if self_value.ownership == Ownership::Guaranteed {
            self_value
        } else {
            let borrowed = self.b.convert_ownership(self_value, Ownership::Guaranteed)?;
            self.b.push_cleanup(Cleanup::EndBorrow(borrowed.value))?;
            borrowed
        };
        self.emit_class_member_destruction(self_value)
    }

    /// Consumes a non-copyable value: user body, then per-member teardown.
    pub(super) fn emit_move_only_deallocator(&mut self) -> Result<()> {
        self.emit_unavailable_stub()?;
        let param = self.emit_self_decl(Ownership::Owned);

        let temporary = if self.ctx.decl.address_only {
            let slot = self.b.alloc_stack(self.ctx.self_ty())?;
            self.b.store(param.value, slot, StoreQualifier::Init)?;
            Some(slot)
        } else {
            None
        };

        let epilog = self.b.create_block("epilog");
        if !self.emit_user_body(epilog)? {
            return Ok(());
        }
        self.enter_cleanup_location();

        self.emit_move_only_member_destruction(temporary.unwrap_or(param.value))?;
        if let Some(slot) = temporary {
            self.b.dealloc_stack(slot)?;
        }
        self.emit_return_unit()
    }

    /// `-dealloc` for classes that live in the foreign object runtime: the
    /// user body, then a dynamic call to the superclass deallocator.
    pub(super) fn emit_foreign_destructor(&mut self) -> Result<()> {
        let decl = self.ctx.decl;

        self.emit_unavailable_stub()?;
        let self_value = self.emit_self_decl(Ownership::Owned);

        let epilog = self.b.create_block("epilog");
        if !self.emit_user_body(epilog)? {
            return Ok(());
        }
        self.enter_cleanup_location();

        let Some((super_decl, super_ty)) = self.ctx.table.superclass_of(decl)? else {
            return Err(LoweringError::MissingForeignSuperclass {
                class: decl.name.to_string(),
            }
            .into());
        };

        let method = DeclRef::new(super_decl.name.clone(), DeclRefKind::Deallocator).as_foreign();
        let sig = FnSig {
            params: vec![(super_ty.clone(), ParamConvention::Unowned)],
            result: Ty::unit(),
            thin: false,
        };
        let dealloc = self.b.super_method(self_value, method, sig)?;
        let super_self = self.b.upcast(self_value, super_ty.clone())?;
        self.b
            .expect_ownership(super_self, Ownership::Owned, "foreign deallocator self")?;
        let subs = SubstitutionMap::new(&super_decl.generic_params, super_ty.nominal_args());
        self.b.apply(dealloc, subs, &[super_self.value])?;
        self.b.end_lifetime(super_self)?;

        self.emit_return_unit()
    }
}
