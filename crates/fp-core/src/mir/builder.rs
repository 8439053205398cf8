//! Deferred-fill construction of a [`Body`].
//!
//! Blocks are handed out as empty placeholders and filled in whatever order
//! the lowering finds convenient. [`FunctionBuilder::finish`] refuses to
//! produce a body while any block is still open.

use crate::error::{LoweringError, Result};
use crate::span::Location;

use super::{
    AccessKind, BasicBlockData, BasicBlockId, Body, BuiltinKind, Callee, DeclRef, FnSig,
    LoadQualifier, LoweredTy, Ownership, ParamConvention, Statement, StatementKind,
    StoreQualifier, SwitchCase, Symbol, Terminator, TerminatorKind, Ty, TyKind, ValueDecl,
    ValueHandle, ValueId,
};
use crate::decl::SubstitutionMap;


/// Work a cleanup scope runs when it is popped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    EndBorrow(ValueId),
    EndAccess(ValueId),
    DestroyValue(ValueId),
    DeallocStack(ValueId),
}

#[derive(Debug)]
struct BlockSlot {
    data: BasicBlockData,
    discarded: bool,
}

#[derive(Debug)]
pub struct FunctionBuilder {
    name: Symbol,
    location: Location,
    blocks: Vec<BlockSlot>,
    values: Vec<ValueDecl>,
    params: Vec<ValueId>,
    insertion: Option<BasicBlockId>,
    scopes: Vec<Vec<Cleanup>>,
}

impl FunctionBuilder {
    /// Starts a body with an entry block and the insertion point inside it.
    pub fn new(name: impl Into<Symbol>, location: Location) -> Self {
        let mut builder = Self {
            name: name.into(),
            location,
            blocks: Vec::new(),
            values: Vec::new(),
            params: Vec::new(),
            insertion: None,
            scopes: Vec::new(),
        };
        let entry = builder.create_block("entry");
        builder.insertion = Some(entry);
        builder
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Replaces the location stamped on new instructions, returning the old one.
    pub fn set_location(&mut self, location: Location) -> Location {
        std::mem::replace(&mut self.location, location)
    }

    pub fn add_param(&mut self, ty: LoweredTy, ownership: Option<Ownership>) -> ValueId {
        let id = self.new_value(ty, ownership);
        self.params.push(id);
        id
    }

    pub fn value(&self, id: ValueId) -> &ValueDecl {
        &self.values[id.0 as usize]
    }

    pub fn create_block(&mut self, label: &str) -> BasicBlockId {
        let id = self.blocks.len() as BasicBlockId;
        self.blocks.push(BlockSlot {
            data: BasicBlockData::new(Some(label.to_string())),
            discarded: false,
        });
        id
    }

    pub fn block_count(&self) -> usize {
        self.blocks.iter().filter(|slot| !slot.discarded).count()
    }

    /// Moves the insertion point to the end of `block`.
    pub fn emit_block(&mut self, block: BasicBlockId) -> Result<()> {
        if self.is_terminated(block) {
            lowering_bail!(LoweringError::AlreadyTerminated(block));
        }
        self.insertion = Some(block);
        Ok(())
    }

    pub fn insertion_block(&self) -> Option<BasicBlockId> {
        self.insertion
    }

    pub fn has_insertion_point(&self) -> bool {
        self.insertion.is_some()
    }

    /// The instruction that defined `value`, if it was not a parameter.
    pub fn defining_kind(&self, value: ValueId) -> Option<&StatementKind> {
        self.blocks
            .iter()
            .flat_map(|slot| slot.data.statements.iter())
            .find(|stmt| stmt.result == Some(value))
            .map(|stmt| &stmt.kind)
    }

    pub fn is_terminated(&self, block: BasicBlockId) -> bool {
        self.blocks[block as usize].data.terminator.is_some()
    }

    pub fn predecessors_of(&self, block: BasicBlockId) -> Vec<BasicBlockId> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.discarded)
            .filter_map(|(idx, slot)| {
                let term = slot.data.terminator.as_ref()?;
                term.kind
                    .successors()
                    .contains(&block)
                    .then_some(idx as BasicBlockId)
            })
            .collect()
    }

    fn new_value(&mut self, ty: LoweredTy, ownership: Option<Ownership>) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueDecl { ty, ownership });
        id
    }

    fn push(&mut self, kind: StatementKind, result: Option<ValueId>) -> Result<()> {
        let Some(block) = self.insertion else {
            lowering_bail!(LoweringError::NoInsertionPoint(format!("{:?}", kind)));
        };
        self.blocks[block as usize].data.statements.push(Statement {
            location: self.location,
            result,
            kind,
        });
        Ok(())
    }

    fn emit(
        &mut self,
        kind: StatementKind,
        ty: LoweredTy,
        ownership: Option<Ownership>,
    ) -> Result<ValueId> {
        if self.insertion.is_none() {
            lowering_bail!(LoweringError::NoInsertionPoint(format!("{:?}", kind)));
        }
        let id = self.new_value(ty, ownership);
        self.push(kind, Some(id))?;
        Ok(id)
    }

    fn require(&self, handle: ValueHandle, expected: Ownership, context: &str) -> Result<()> {
        if handle.ownership != expected {
            lowering_bail!(LoweringError::OwnershipMismatch {
                context: context.to_string(),
                expected: expected.to_string(),
                found: handle.ownership.to_string(),
            });
        }
        Ok(())
    }

    /// Fails unless `handle` is held at `expected`.
    pub fn expect_ownership(
        &self,
        handle: ValueHandle,
        expected: Ownership,
        context: &str,
    ) -> Result<()> {
        self.require(handle, expected, context)
    }

    // ------------------------------------------------------------------
    // Ownership

    /// The only way to change the tag of a handle without a borrow.
    ///
    /// Guaranteed -> Owned and Unowned -> Guaranteed are the conversions the
    /// destructor entry points need; Owned -> Guaranteed must go through
    /// [`Self::begin_borrow`] so the borrow has an end.
    pub fn convert_ownership(&mut self, handle: ValueHandle, to: Ownership) -> Result<ValueHandle> {
        if handle.ownership == to {
            return Ok(handle);
        }
        match (handle.ownership, to) {
            (Ownership::Guaranteed, Ownership::Owned)
            | (Ownership::Unowned, Ownership::Guaranteed) => {
                let ty = self.value(handle.value).ty.clone();
                let value = self.emit(
                    StatementKind::UncheckedOwnershipConversion {
                        operand: handle.value,
                        to,
                    },
                    ty,
                    Some(to),
                )?;
                Ok(ValueHandle::new(value, to))
            }
            (from, to) => lowering_bail!(LoweringError::IllegalConversion {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    /// Borrows an owned or guaranteed object; the matching `end_borrow` is
    /// registered on the innermost cleanup scope.
    pub fn begin_borrow(&mut self, handle: ValueHandle) -> Result<ValueHandle> {
        if handle.ownership == Ownership::Unowned {
            lowering_bail!(LoweringError::OwnershipMismatch {
                context: "begin_borrow".into(),
                expected: Ownership::Guaranteed.to_string(),
                found: handle.ownership.to_string(),
            });
        }
        if self.scopes.is_empty() {
            lowering_bail!(LoweringError::NoCleanupScope("begin_borrow".into()));
        }
        let ty = self.value(handle.value).ty.clone();
        let value = self.emit(
            StatementKind::BeginBorrow {
                operand: handle.value,
            },
            ty,
            Some(Ownership::Guaranteed),
        )?;
        self.push_cleanup(Cleanup::EndBorrow(value))?;
        Ok(ValueHandle::new(value, Ownership::Guaranteed))
    }

    /// Guaranteed view of an object for the rest of the innermost scope.
    /// Already-guaranteed values are returned untouched.
    pub fn borrow_object(&mut self, handle: ValueHandle) -> Result<ValueHandle> {
        match handle.ownership {
            Ownership::Guaranteed => Ok(handle),
            _ => self.begin_borrow(handle),
        }
    }

    pub fn load_borrow(&mut self, address: ValueId) -> Result<ValueHandle> {
        let ty = self.value(address).ty.object_type();
        let value = self.emit(
            StatementKind::LoadBorrow { address },
            ty,
            Some(Ownership::Guaranteed),
        )?;
        Ok(ValueHandle::new(value, Ownership::Guaranteed))
    }

    pub fn end_borrow(&mut self, handle: ValueHandle) -> Result<()> {
        self.require(handle, Ownership::Guaranteed, "end_borrow")?;
        self.push(
            StatementKind::EndBorrow {
                operand: handle.value,
            },
            None,
        )
    }

    // ------------------------------------------------------------------
    // Calls

    pub fn function_ref(&mut self, callee: Callee, sig: FnSig) -> Result<ValueId> {
        self.emit(
            StatementKind::FunctionRef { callee },
            LoweredTy::object(Ty::function(sig)),
            None,
        )
    }

    /// Dynamic lookup of `method` on the superclass of `operand`.
    pub fn super_method(
        &mut self,
        operand: ValueHandle,
        method: DeclRef,
        sig: FnSig,
    ) -> Result<ValueId> {
        self.emit(
            StatementKind::SuperMethod {
                operand: operand.value,
                method,
            },
            LoweredTy::object(Ty::function(sig)),
            None,
        )
    }

    /// Calls `callee`, checking every argument against the callee's
    /// parameter conventions.
    pub fn apply(
        &mut self,
        callee: ValueId,
        substitutions: SubstitutionMap,
        args: &[ValueId],
    ) -> Result<ValueHandle> {
        let TyKind::Function(sig) = self.value(callee).ty.ty.kind.clone() else {
            lowering_bail!(LoweringError::OwnershipMismatch {
                context: "apply".into(),
                expected: "function".into(),
                found: self.value(callee).ty.to_string(),
            });
        };
        for (arg, (_, convention)) in args.iter().zip(sig.params.iter()) {
            let Some(found) = self.value(*arg).ownership else {
                continue;
            };
            if *convention == ParamConvention::Owned && found != Ownership::Owned {
                lowering_bail!(LoweringError::OwnershipMismatch {
                    context: format!("owned argument {}", arg),
                    expected: Ownership::Owned.to_string(),
                    found: found.to_string(),
                });
            }
        }
        let ownership = if sig.result.is_trivial() {
            None
        } else {
            Some(Ownership::Owned)
        };
        let value = self.emit(
            StatementKind::Apply {
                callee,
                substitutions,
                args: args.to_vec(),
            },
            LoweredTy::object(sig.result.clone()),
            ownership,
        )?;
        Ok(ValueHandle::new(value, ownership.unwrap_or(Ownership::Owned)))
    }

    pub fn builtin(&mut self, builtin: BuiltinKind, args: &[ValueId]) -> Result<()> {
        self.push(
            StatementKind::Builtin {
                builtin,
                args: args.to_vec(),
            },
            None,
        )
    }

    // ------------------------------------------------------------------
    // Casts

    pub fn upcast(&mut self, handle: ValueHandle, to: Ty) -> Result<ValueHandle> {
        let value = self.emit(
            StatementKind::Upcast {
                operand: handle.value,
            },
            LoweredTy::object(to),
            Some(handle.ownership),
        )?;
        Ok(ValueHandle::new(value, handle.ownership))
    }

    pub fn unchecked_ref_cast(&mut self, handle: ValueHandle, to: Ty) -> Result<ValueHandle> {
        let value = self.emit(
            StatementKind::UncheckedRefCast {
                operand: handle.value,
            },
            LoweredTy::object(to),
            Some(handle.ownership),
        )?;
        Ok(ValueHandle::new(value, handle.ownership))
    }

    /// Erases the static class type, keeping the ownership of `handle`.
    pub fn init_existential_ref(&mut self, handle: ValueHandle, to: Ty) -> Result<ValueHandle> {
        let value = self.emit(
            StatementKind::InitExistentialRef {
                operand: handle.value,
            },
            LoweredTy::object(to),
            Some(handle.ownership),
        )?;
        Ok(ValueHandle::new(value, handle.ownership))
    }

    pub fn convert_function(&mut self, function: ValueId, sig: FnSig) -> Result<ValueId> {
        self.emit(
            StatementKind::ConvertFunction { operand: function },
            LoweredTy::object(Ty::function(sig)),
            None,
        )
    }

    // ------------------------------------------------------------------
    // Literals and aggregates

    pub fn integer_literal(&mut self, ty: Ty, value: i128) -> Result<ValueId> {
        self.emit(
            StatementKind::IntegerLiteral { value },
            LoweredTy::object(ty),
            None,
        )
    }

    pub fn empty_tuple(&mut self) -> Result<ValueId> {
        self.emit(
            StatementKind::Tuple {
                elements: Vec::new(),
            },
            LoweredTy::object(Ty::unit()),
            None,
        )
    }

    pub fn optional_none(&mut self, ty: Ty) -> Result<ValueId> {
        self.emit(StatementKind::OptionalNone, LoweredTy::object(ty), None)
    }

    pub fn unchecked_enum_data(
        &mut self,
        handle: ValueHandle,
        case: Symbol,
        payload: Ty,
    ) -> Result<ValueHandle> {
        let value = self.emit(
            StatementKind::UncheckedEnumData {
                operand: handle.value,
                case,
            },
            LoweredTy::object(payload),
            Some(handle.ownership),
        )?;
        Ok(ValueHandle::new(value, handle.ownership))
    }

    pub fn unchecked_take_enum_data_addr(
        &mut self,
        address: ValueId,
        case: Symbol,
        payload: Ty,
    ) -> Result<ValueId> {
        self.emit(
            StatementKind::UncheckedTakeEnumDataAddr { address, case },
            LoweredTy::address(payload),
            None,
        )
    }

    // ------------------------------------------------------------------
    // Memory

    /// Address of a stored property; the object must be borrowed.
    pub fn ref_element_addr(
        &mut self,
        object: ValueHandle,
        field: Symbol,
        ty: Ty,
    ) -> Result<ValueId> {
        self.require(object, Ownership::Guaranteed, "ref_element_addr")?;
        self.emit(
            StatementKind::RefElementAddr {
                operand: object.value,
                field,
            },
            LoweredTy::address(ty),
            None,
        )
    }

    pub fn struct_element_addr(&mut self, address: ValueId, field: Symbol, ty: Ty) -> Result<ValueId> {
        self.emit(
            StatementKind::StructElementAddr {
                operand: address,
                field,
            },
            LoweredTy::address(ty),
            None,
        )
    }

    pub fn begin_access(
        &mut self,
        address: ValueId,
        kind: AccessKind,
        no_nested_conflict: bool,
    ) -> Result<ValueId> {
        let ty = self.value(address).ty.clone();
        self.emit(
            StatementKind::BeginAccess {
                address,
                kind,
                no_nested_conflict,
            },
            ty,
            None,
        )
    }

    pub fn end_access(&mut self, access: ValueId) -> Result<()> {
        self.push(StatementKind::EndAccess { access }, None)
    }

    pub fn destroy_addr(&mut self, address: ValueId) -> Result<()> {
        self.push(StatementKind::DestroyAddr { address }, None)
    }

    pub fn destroy_value(&mut self, handle: ValueHandle) -> Result<()> {
        self.require(handle, Ownership::Owned, "destroy_value")?;
        self.push(
            StatementKind::DestroyValue {
                operand: handle.value,
            },
            None,
        )
    }

    pub fn load(&mut self, address: ValueId, qualifier: LoadQualifier) -> Result<ValueHandle> {
        let ty = self.value(address).ty.object_type();
        let value = self.emit(
            StatementKind::Load { address, qualifier },
            ty,
            Some(Ownership::Owned),
        )?;
        Ok(ValueHandle::new(value, Ownership::Owned))
    }

    /// Stores an owned (or ownership-free) value into `dest`.
    pub fn store(&mut self, value: ValueId, dest: ValueId, qualifier: StoreQualifier) -> Result<()> {
        if let Some(found) = self.value(value).ownership {
            self.require(ValueHandle::new(value, found), Ownership::Owned, "store")?;
        }
        self.push(
            StatementKind::Store {
                value,
                dest,
                qualifier,
            },
            None,
        )
    }

    pub fn is_unique(&mut self, address: ValueId) -> Result<ValueId> {
        self.emit(
            StatementKind::IsUnique { address },
            LoweredTy::object(Ty::int1()),
            None,
        )
    }

    pub fn alloc_stack(&mut self, ty: Ty) -> Result<ValueId> {
        self.emit(StatementKind::AllocStack, LoweredTy::address(ty), None)
    }

    pub fn dealloc_stack(&mut self, address: ValueId) -> Result<()> {
        self.push(StatementKind::DeallocStack { address }, None)
    }

    pub fn dealloc_ref(&mut self, handle: ValueHandle) -> Result<()> {
        self.require(handle, Ownership::Owned, "dealloc_ref")?;
        self.push(
            StatementKind::DeallocRef {
                operand: handle.value,
            },
            None,
        )
    }

    pub fn end_lifetime(&mut self, handle: ValueHandle) -> Result<()> {
        self.require(handle, Ownership::Owned, "end_lifetime")?;
        self.push(
            StatementKind::EndLifetime {
                operand: handle.value,
            },
            None,
        )
    }

    pub fn drop_deinit(&mut self, value: ValueId) -> Result<ValueId> {
        let decl = self.value(value).clone();
        if let Some(found) = decl.ownership {
            self.require(ValueHandle::new(value, found), Ownership::Owned, "drop_deinit")?;
        }
        self.emit(
            StatementKind::DropDeinit { operand: value },
            decl.ty,
            decl.ownership,
        )
    }

    // ------------------------------------------------------------------
    // Concurrency

    pub fn extract_executor(&mut self, actor: ValueHandle) -> Result<ValueId> {
        self.emit(
            StatementKind::ExtractExecutor { actor: actor.value },
            LoweredTy::object(Ty::executor()),
            None,
        )
    }

    pub fn global_actor_instance(&mut self, actor: Ty) -> Result<ValueHandle> {
        let value = self.emit(
            StatementKind::GlobalActorInstance {
                actor: actor.clone(),
            },
            LoweredTy::object(actor),
            Some(Ownership::Guaranteed),
        )?;
        Ok(ValueHandle::new(value, Ownership::Guaranteed))
    }

    // ------------------------------------------------------------------
    // Opaque statements

    pub fn user_body(&mut self, body: Symbol) -> Result<()> {
        self.push(StatementKind::UserBody { body }, None)
    }

    pub fn profiler_increment(&mut self, counter: Symbol) -> Result<()> {
        self.push(StatementKind::ProfilerIncrement { counter }, None)
    }

    // ------------------------------------------------------------------
    // Terminators

    fn terminate(&mut self, kind: TerminatorKind) -> Result<()> {
        let Some(block) = self.insertion.take() else {
            lowering_bail!(LoweringError::NoInsertionPoint(format!("{:?}", kind)));
        };
        let slot = &mut self.blocks[block as usize];
        if slot.data.terminator.is_some() {
            lowering_bail!(LoweringError::AlreadyTerminated(block));
        }
        slot.data.terminator = Some(Terminator {
            location: self.location,
            kind,
        });
        Ok(())
    }

    pub fn branch(&mut self, target: BasicBlockId) -> Result<()> {
        self.terminate(TerminatorKind::Branch { target })
    }

    pub fn cond_branch(
        &mut self,
        cond: ValueId,
        then_target: BasicBlockId,
        else_target: BasicBlockId,
    ) -> Result<()> {
        self.terminate(TerminatorKind::CondBranch {
            cond,
            then_target,
            else_target,
        })
    }

    pub fn switch_enum(&mut self, operand: ValueId, cases: Vec<SwitchCase>) -> Result<()> {
        self.terminate(TerminatorKind::SwitchEnum { operand, cases })
    }

    pub fn return_value(&mut self, value: ValueId) -> Result<()> {
        self.terminate(TerminatorKind::Return { value })
    }

    pub fn unreachable(&mut self) -> Result<()> {
        self.terminate(TerminatorKind::Unreachable)
    }

    // ------------------------------------------------------------------
    // Cleanup scopes

    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn push_cleanup(&mut self, cleanup: Cleanup) -> Result<()> {
        let Some(scope) = self.scopes.last_mut() else {
            lowering_bail!(LoweringError::NoCleanupScope(format!("{:?}", cleanup)));
        };
        scope.push(cleanup);
        Ok(())
    }

    /// Runs the innermost scope's cleanups in reverse order of registration.
    /// Without an insertion point the region is dead and nothing is emitted.
    pub fn pop_scope(&mut self) -> Result<()> {
        let Some(cleanups) = self.scopes.pop() else {
            lowering_bail!(LoweringError::NoCleanupScope("pop_scope".into()));
        };
        if self.insertion.is_none() {
            return Ok(());
        }
        let previous = self.set_location(self.location.as_cleanup());
        for cleanup in cleanups.into_iter().rev() {
            match cleanup {
                Cleanup::EndBorrow(value) => {
                    self.push(StatementKind::EndBorrow { operand: value }, None)?
                }
                Cleanup::EndAccess(access) => self.end_access(access)?,
                Cleanup::DestroyValue(value) => {
                    self.push(StatementKind::DestroyValue { operand: value }, None)?
                }
                Cleanup::DeallocStack(address) => self.dealloc_stack(address)?,
            }
        }
        self.set_location(previous);
        Ok(())
    }

    /// Runs `body` inside a fresh cleanup scope.
    pub fn with_scope<T>(&mut self, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.push_scope();
        let result = body(self);
        match result {
            Ok(value) => {
                self.pop_scope()?;
                Ok(value)
            }
            Err(err) => {
                self.scopes.pop();
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Completion

    /// Drops a block nobody branches to, e.g. an epilog the body never reaches.
    pub fn discard_block(&mut self, block: BasicBlockId) -> Result<()> {
        let slot = &self.blocks[block as usize];
        if slot.data.terminator.is_some()
            || !slot.data.statements.is_empty()
            || !self.predecessors_of(block).is_empty()
        {
            lowering_bail!(LoweringError::DiscardLiveBlock(block));
        }
        self.blocks[block as usize].discarded = true;
        if self.insertion == Some(block) {
            self.insertion = None;
        }
        Ok(())
    }

    /// Hands off the graph. With `verify_completeness` every live block must
    /// carry exactly one terminator.
    pub fn finish(mut self, return_ty: Ty, verify_completeness: bool) -> Result<Body> {
        if !self.scopes.is_empty() {
            lowering_bail!(LoweringError::OpenCleanupScopes(self.scopes.len()));
        }
        if verify_completeness {
            for (idx, slot) in self.blocks.iter().enumerate() {
                if !slot.discarded && slot.data.terminator.is_none() {
                    lowering_bail!(LoweringError::Unterminated {
                        block: idx as BasicBlockId,
                        label: slot.data.label.clone().unwrap_or_default(),
                    });
                }
            }
        }

        let mut remap = vec![None; self.blocks.len()];
        let mut next = 0;
        for (idx, slot) in self.blocks.iter().enumerate() {
            if !slot.discarded {
                remap[idx] = Some(next);
                next += 1;
            }
        }
        let mut basic_blocks = Vec::with_capacity(next as usize);
        for slot in self.blocks.drain(..) {
            if slot.discarded {
                continue;
            }
            let mut data = slot.data;
            if let Some(term) = data.terminator.as_mut() {
                for target in term.kind.successors_mut() {
                    if let Some(mapped) = remap[*target as usize] {
                        *target = mapped;
                    }
                }
            }
            basic_blocks.push(data);
        }

        trace!(
            function = %self.name,
            blocks = basic_blocks.len(),
            values = self.values.len(),
            "finished body"
        );

        Ok(Body {
            name: self.name,
            params: self.params,
            values: self.values,
            basic_blocks,
            return_ty,
            span: self.location.span,
        })
    }
}
