use fp_core::decl::DeclTable;
use fp_core::error::Result;
use fp_core::mir::{
    Callee, DeclRef, DeclRefKind, RuntimeFunction, StatementKind, TerminatorKind,
};
use fp_deinit::{DeinitLowering, DestructorKind};

mod support;

use support::decls;
use support::walk::applied_callees;

fn table() -> DeclTable {
    DeclTable::from_decls([decls::distributed_actor("Greeter")])
}

#[test]
fn remote_proxy_only_tears_down_identity() -> Result<()> {
    let body = DeinitLowering::default()
        .lower(&table(), "Greeter", DestructorKind::Deallocating { isolated: false })?
        .body;

    let Some(TerminatorKind::CondBranch { then_target, else_target, .. }) =
        body.basic_blocks[0].terminator.as_ref().map(|t| &t.kind)
    else {
        panic!("entry must branch on is_remote");
    };
    assert_eq!(
        applied_callees(&body).first(),
        Some(&Callee::Runtime(RuntimeFunction::DistributedIsRemote))
    );

    let remote = body.block(*then_target);
    let fields: Vec<_> = remote
        .statements
        .iter()
        .filter_map(|stmt| match &stmt.kind {
            StatementKind::RefElementAddr { field, .. } => Some(field.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(fields, vec!["id", "actorSystem"]);
    assert!(remote.statements.iter().any(|stmt| matches!(
        stmt.kind,
        StatementKind::DeallocRef { .. }
    )));
    assert!(!remote
        .statements
        .iter()
        .any(|stmt| matches!(stmt.kind, StatementKind::Apply { .. } | StatementKind::UserBody { .. })));

    let local = body.block(*else_target);
    assert!(local
        .statements
        .iter()
        .any(|stmt| matches!(stmt.kind, StatementKind::Apply { .. })));
    assert_eq!(
        applied_callees(&body).last(),
        Some(&Callee::Decl(DeclRef::new("Greeter", DeclRefKind::Destroyer)))
    );
    Ok(())
}

#[test]
fn both_paths_join_before_returning() -> Result<()> {
    let body = DeinitLowering::default()
        .lower(&table(), "Greeter", DestructorKind::Deallocating { isolated: false })?
        .body;
    let returns: Vec<_> = body
        .basic_blocks
        .iter()
        .enumerate()
        .filter(|(_, block)| {
            matches!(
                block.terminator.as_ref().map(|t| &t.kind),
                Some(TerminatorKind::Return { .. })
            )
        })
        .map(|(idx, _)| idx)
        .collect();
    assert_eq!(returns.len(), 1);
    assert_eq!(body.predecessors()[returns[0]].len(), 2);
    Ok(())
}

#[test]
fn isolated_deallocator_is_always_local() -> Result<()> {
    let mut actor = decls::distributed_actor("Greeter");
    if let Some(destructor) = actor.destructor.as_mut() {
        destructor.isolated = true;
        destructor.isolation = fp_core::decl::ActorIsolation::ActorInstance;
    }
    let table = DeclTable::from_decls([actor]);
    let body = DeinitLowering::default()
        .lower(&table, "Greeter", DestructorKind::Deallocating { isolated: true })?
        .body;
    assert_eq!(body.basic_blocks.len(), 1);
    assert!(!applied_callees(&body)
        .contains(&Callee::Runtime(RuntimeFunction::DistributedIsRemote)));
    Ok(())
}

#[test]
fn local_destroyer_resigns_identity() -> Result<()> {
    let body = DeinitLowering::default()
        .lower(&table(), "Greeter", DestructorKind::Destroying)?
        .body;
    assert!(applied_callees(&body)
        .contains(&Callee::Runtime(RuntimeFunction::DistributedResignId)));
    let destroyed: Vec<_> = body
        .statements()
        .filter_map(|(_, stmt)| match &stmt.kind {
            StatementKind::RefElementAddr { field, .. } => Some(field.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(destroyed, vec!["id", "actorSystem", "greeting", "inbox"]);
    Ok(())
}
