//! Remote/local split for distributed actors.
//!
//! A remote proxy never ran the actor's initializer beyond its identity and
//! runtime-system handles, so its deallocation must not run the user body or
//! touch any other stored member.

use super::*;

/// Members a remote proxy actually holds.
const REMOTE_PROXY_MEMBERS: [&str; 2] = ["id", "actorSystem"];

impl DeinitEmitter<'_> {
    /// Emits `emit_local` directly for ordinary classes. For a distributed
    /// actor, branches on whether self is a remote proxy first:
    ///
    /// ```text
    /// entry:  cond_br is_remote(self), remote, local
    /// remote: destroy id/actorSystem; destroy default actor; dealloc_ref; br finish
    /// local:  <emit_local>; br finish
    /// finish: return ()
    /// ```
    ///
    /// `is_isolated` marks the isolated deallocator, which is only ever
    /// scheduled for local instances.
    pub(super) fn emit_distributed_remote_actor_deinit(
        &mut self,
        self_value: ValueHandle,
        is_isolated: bool,
        emit_local: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        if is_isolated || !self.ctx.decl.is_distributed_actor() {
            emit_local(self)?;
            return self.emit_return_unit();
        }

        debug!(ty = %self.ctx.decl.name, "emitting remote/local deinit split");
        let remote = self.b.create_block("remoteActorDeinitBB");
        let finish = self.b.create_block("finishDeinitBB");
        let local = self.b.create_block("localActorDeinitBB");

        self.emit_distributed_if_remote_branch(self_value, remote, local)?;

        self.b.emit_block(remote)?;
        self.emit_distributed_remote_deallocation(self_value)?;
        self.b.branch(finish)?;

        self.b.emit_block(local)?;
        emit_local(self)?;
        self.b.branch(finish)?;

        self.b.emit_block(finish)?;
        self.emit_return_unit()
    }

    fn emit_distributed_if_remote_branch(
        &mut self,
        self_value: ValueHandle,
        remote: BasicBlockId,
        local: BasicBlockId,
    ) -> Result<()> {
        let sig = FnSig {
            params: vec![(self.ctx.self_ty(), ParamConvention::Guaranteed)],
            result: Ty::int1(),
            thin: true,
        };
        let is_remote_fn = self
            .b
            .function_ref(Callee::Runtime(RuntimeFunction::DistributedIsRemote), sig)?;
        let is_remote = self
            .b
            .apply(is_remote_fn, SubstitutionMap::empty(), &[self_value.value])?;
        self.b.cond_branch(is_remote.value, remote, local)
    }

    fn emit_distributed_remote_deallocation(&mut self, self_value: ValueHandle) -> Result<()> {
        let decl = self.ctx.decl;
        let previous = self.b.set_location(self.ctx.location.as_cleanup());

        self.scoped(|e| {
            let borrowed = e.b.begin_borrow(self_value)?;
            for member in &decl.stored_members {
                if member.isolation == MemberIsolation::ActorInstance {
                    continue;
                }
                if REMOTE_PROXY_MEMBERS.contains(&member.name.as_str()) {
                    e.destroy_class_member(borrowed, member)?;
                }
            }
            if decl.is_root_default_actor() {
                e.emit_destroy_default_actor(borrowed)?;
            }
            Ok(())
        })?;

        self.b.dealloc_ref(self_value)?;
        self.b.set_location(previous);
        Ok(())
    }

    /// `actorSystem.resignID(self.id)` for a local instance being destroyed.
    pub(super) fn emit_distributed_resign_id(&mut self, self_value: ValueHandle) -> Result<()> {
        let sig = FnSig {
            params: vec![(self.ctx.self_ty(), ParamConvention::Guaranteed)],
            result: Ty::unit(),
            thin: true,
        };
        let resign = self
            .b
            .function_ref(Callee::Runtime(RuntimeFunction::DistributedResignId), sig)?;
        self.b
            .apply(resign, SubstitutionMap::empty(), &[self_value.value])?;
        Ok(())
    }
}
