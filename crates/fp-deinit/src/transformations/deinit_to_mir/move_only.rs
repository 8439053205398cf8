use super::*;

impl DeinitEmitter<'_> {
    /// Strips the user deinit from `self_value` and destroys what is left:
    /// the whole value for objects, each stored member for structs, the
    /// active payload for enums.
    pub(super) fn emit_move_only_member_destruction(&mut self, self_value: ValueId) -> Result<()> {
        let decl = self.ctx.decl;
        let dropped = match self.b.defining_kind(self_value) {
            Some(StatementKind::DropDeinit { .. }) => self_value,
            _ => self.b.drop_deinit(self_value)?,
        };

        if self.b.value(dropped).ty.is_object() {
            return self
                .b
                .destroy_value(ValueHandle::assume(dropped, Ownership::Owned));
        }

        match &decl.kind {
            NominalKind::Struct => {
                for member in &decl.stored_members {
                    if member.trivial {
                        continue;
                    }
                    let addr =
                        self.b
                            .struct_element_addr(dropped, member.name.clone(), member.ty.clone())?;
                    let access = self.b.begin_access(addr, AccessKind::Deinit, false)?;
                    self.b.destroy_addr(access)?;
                    self.b.end_access(access)?;
                }
                Ok(())
            }
            NominalKind::Enum(cases) => {
                let origin = self.b.insertion_block().ok_or_else(|| {
                    LoweringError::NoInsertionPoint("move-only enum teardown".into())
                })?;
                let cont = self.b.create_block("enumDestroyContBB");

                let mut targets = Vec::with_capacity(cases.len());
                for case in cases {
                    let case_bb = self.b.create_block(&format!("case.{}", case.name));
                    self.b.emit_block(case_bb)?;
                    if let Some(payload) = &case.payload {
                        let data = self.b.unchecked_take_enum_data_addr(
                            dropped,
                            case.name.clone(),
                            payload.clone(),
                        )?;
                        self.b.destroy_addr(data)?;
                    }
                    self.b.branch(cont)?;
                    targets.push(SwitchCase {
                        case: case.name.clone(),
                        target: case_bb,
                    });
                }

                self.b.emit_block(origin)?;
                self.b.switch_enum(dropped, targets)?;
                self.b.emit_block(cont)
            }
            NominalKind::Class(_) => Err(LoweringError::UnsupportedKind {
                kind: DestructorKind::MoveOnlyDeallocator.name().to_string(),
                ty: decl.name.to_string(),
            }
            .into()),
        }
    }
}
