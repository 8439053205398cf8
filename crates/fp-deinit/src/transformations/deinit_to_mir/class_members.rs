//! Stored-member teardown for classes.

use itertools::Itertools;

use super::*;

/// Stored members typed as an optional of the enclosing class itself.
pub fn find_recursive_links(decl: &NominalDecl) -> Vec<&StoredMember> {
    let self_ty = decl.declared_ty();
    decl.stored_members
        .iter()
        .filter(|member| member.ty.optional_object() == Some(&self_ty))
        .collect()
}

impl DeinitEmitter<'_> {
    /// `destroy_addr` of one stored member under a deinit access scope.
    pub(super) fn destroy_class_member(
        &mut self,
        self_value: ValueHandle,
        member: &StoredMember,
    ) -> Result<()> {
        if member.trivial {
            return Ok(());
        }
        let addr = self
            .b
            .ref_element_addr(self_value, member.name.clone(), member.ty.clone())?;
        let access = self.b.begin_access(addr, AccessKind::Deinit, false)?;
        self.b.destroy_addr(access)?;
        self.b.end_access(access)
    }

    /// The one link that is destroyed iteratively, if the type qualifies.
    fn recursive_link(&mut self) -> Option<Symbol> {
        let decl = self.ctx.decl;
        if !self.ctx.options.recursive_chain_optimization {
            return None;
        }
        let links = find_recursive_links(decl);
        match links.as_slice() {
            [] => None,
            [link] => {
                debug!(ty = %decl.name, link = %link.name, "destroying recursive link iteratively");
                Some(link.name.clone())
            }
            _ => {
                debug!(
                    ty = %decl.name,
                    links = links.len(),
                    "multiple recursive links; destroying members recursively"
                );
                self.note(
                    Diagnostic::info(format!(
                        "`{}` has several self-typed links ({}); chain destruction is not applied",
                        decl.name,
                        links.iter().map(|link| &link.name).join(", ")
                    ))
                    .with_span(decl.span)
                    .with_code("deinit::recursive-chain"),
                );
                None
            }
        }
    }

    /// Destroys every stored member of self in declaration order. A single
    /// recursive link is destroyed last, with a loop instead of recursion.
    pub(super) fn emit_class_member_destruction(&mut self, self_value: ValueHandle) -> Result<()> {
        self.b
            .expect_ownership(self_value, Ownership::Guaranteed, "class member destruction")?;
        let decl = self.ctx.decl;
        let link = self.recursive_link();

        for member in &decl.stored_members {
            if link.as_ref() == Some(&member.name) {
                continue;
            }
            self.destroy_class_member(self_value, member)?;
        }

        if let Some(member) = link.and_then(|name| decl.member(name.as_str())) {
            self.emit_recursive_chain_destruction(self_value, member)?;
        }

        if decl.is_root_default_actor() {
            self.emit_destroy_default_actor(self_value)?;
        }
        Ok(())
    }

    /// Unlinks a singly linked chain one node at a time.
    ///
    /// ```text
    ///   iter = take self.link; self.link = none
    /// loop:      switch_enum iter: some -> some, none -> none
    /// some:      cond_br is_unique(iter), unique, notUnique
    /// unique:    iter = copy iter!.link (old value released); br loop
    /// notUnique: br clean
    /// none:      br clean
    /// clean:     destroy iter
    /// ```
    ///
    /// The shape is fixed: chain length only changes the trip count.
    pub(super) fn emit_recursive_chain_destruction(
        &mut self,
        self_value: ValueHandle,
        link: &StoredMember,
    ) -> Result<()> {
        let self_ty = self.ctx.self_ty();
        let link_ty = link.ty.clone();

        let clean_bb = self.b.create_block("cleanBB");
        let none_bb = self.b.create_block("noneBB");
        let not_unique_bb = self.b.create_block("notUniqueBB");
        let unique_bb = self.b.create_block("uniqueBB");
        let some_bb = self.b.create_block("someBB");
        let loop_bb = self.b.create_block("loopBB");

        // self.link = none, keeping the old chain in `iter`
        let none = self.b.optional_none(link_ty.clone())?;
        let link_addr = self
            .b
            .ref_element_addr(self_value, link.name.clone(), link_ty.clone())?;
        let iter = self.b.alloc_stack(link_ty.clone())?;
        let access = self.b.begin_access(link_addr, AccessKind::Modify, true)?;
        let head = self.b.load(access, LoadQualifier::Take)?;
        self.b.store(none, access, StoreQualifier::Init)?;
        self.b.end_access(access)?;
        self.b.store(head.value, iter, StoreQualifier::Init)?;
        self.b.branch(loop_bb)?;

        self.b.emit_block(loop_bb)?;
        self.b.switch_enum(
            iter,
            vec![
                SwitchCase {
                    case: Symbol::new("some"),
                    target: some_bb,
                },
                SwitchCase {
                    case: Symbol::new("none"),
                    target: none_bb,
                },
            ],
        )?;

        self.b.emit_block(some_bb)?;
        let unique = self.b.is_unique(iter)?;
        self.b.cond_branch(unique, unique_bb, not_unique_bb)?;

        self.b.emit_block(unique_bb)?;
        let current = self.b.load_borrow(iter)?;
        let node = self
            .b
            .unchecked_enum_data(current, Symbol::new("some"), self_ty)?;
        let next_addr = self
            .b
            .ref_element_addr(node, link.name.clone(), link_ty)?;
        let read = self.b.begin_access(next_addr, AccessKind::Read, true)?;
        let next = self.b.load(read, LoadQualifier::Copy)?;
        self.b.end_access(read)?;
        self.b.end_borrow(current)?;
        self.b.store(next.value, iter, StoreQualifier::Assign)?;
        self.b.branch(loop_bb)?;

        self.b.emit_block(not_unique_bb)?;
        self.b.branch(clean_bb)?;

        self.b.emit_block(none_bb)?;
        self.b.branch(clean_bb)?;

        self.b.emit_block(clean_bb)?;
        self.b.destroy_addr(iter)?;
        self.b.dealloc_stack(iter)
    }

    /// Releases the runtime's default-actor state held by self.
    pub(super) fn emit_destroy_default_actor(&mut self, self_value: ValueHandle) -> Result<()> {
        self.b
            .builtin(BuiltinKind::DestroyDefaultActor, &[self_value.value])
    }
}
