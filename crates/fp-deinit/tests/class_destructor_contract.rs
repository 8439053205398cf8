use fp_core::decl::DeclTable;
use fp_core::error::{LoweringError, Result};
use fp_core::mir::{Callee, DeclRef, DeclRefKind, RuntimeFunction, StatementKind};
use fp_deinit::transformations::IrTransform;
use fp_deinit::{DeinitLowering, DestructorKind};

mod support;

use support::decls;
use support::walk::{applied_callees, destroyer_invocations};

#[test]
fn deallocation_runs_one_destroyer_per_hierarchy_level() -> Result<()> {
    for depth in 1..=5 {
        let (table, leaf) = decls::hierarchy(depth);
        let module = DeinitLowering::default().transform(&table)?;

        let entry = DeclRef::new(leaf.as_str(), DeclRefKind::Deallocator);
        assert_eq!(destroyer_invocations(&module, &entry), depth, "depth {depth}");
    }
    Ok(())
}

#[test]
fn missing_superclass_destructor_is_fatal() {
    let table = DeclTable::from_decls([decls::subclass("Orphan", "Ghost")]);
    let err = DeinitLowering::default()
        .lower(&table, "Orphan", DestructorKind::Destroying)
        .unwrap_err();
    assert_eq!(
        err.as_lowering(),
        Some(&LoweringError::MissingSuperclassDestructor {
            class: "Orphan".into(),
            superclass: "Ghost".into(),
        })
    );
}

#[test]
fn unavailable_destructors_trap_first() -> Result<()> {
    let mut widget = decls::root_class("Widget");
    let mut destructor = decls::user_body("Widget.deinit.body");
    destructor.unavailable = true;
    widget.destructor = Some(destructor);
    let table = DeclTable::from_decls([widget]);

    let mut lowering = DeinitLowering::default();
    for kind in [
        DestructorKind::Destroying,
        DestructorKind::Deallocating { isolated: false },
    ] {
        let body = lowering.lower(&table, "Widget", kind)?.body;
        assert_eq!(
            applied_callees(&body).first(),
            Some(&Callee::Runtime(RuntimeFunction::UnavailableCodeReached)),
            "{}",
            kind.name()
        );
    }
    Ok(())
}

#[test]
fn lowering_is_deterministic() -> Result<()> {
    let (mut table, _) = decls::hierarchy(3);
    table.insert(decls::linked_node());
    table.insert(decls::distributed_actor("Greeter"));
    table.insert(decls::move_only_enum(3));
    table.insert(decls::isolated_actor("Counter"));

    let first = DeinitLowering::default().lower_table(&table)?;
    let second = DeinitLowering::default().lower_table(&table)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn every_lowered_body_is_complete() -> Result<()> {
    let (mut table, _) = decls::hierarchy(2);
    table.insert(decls::linked_node());
    table.insert(decls::distributed_actor("Greeter"));
    table.insert(decls::move_only_enum(2));
    table.insert(decls::isolated_actor("Counter"));

    let module = DeinitLowering::default().lower_table(&table)?;
    assert!(!module.is_empty());
    for (decl_ref, function) in &module.functions {
        for (idx, block) in function.body.basic_blocks.iter().enumerate() {
            assert!(block.is_terminated(), "{decl_ref} bb{idx} unterminated");
        }
        let borrows = function
            .body
            .statements()
            .filter(|(_, stmt)| {
                matches!(
                    stmt.kind,
                    StatementKind::BeginBorrow { .. } | StatementKind::LoadBorrow { .. }
                )
            })
            .count();
        let ends = function
            .body
            .statements()
            .filter(|(_, stmt)| matches!(stmt.kind, StatementKind::EndBorrow { .. }))
            .count();
        assert_eq!(borrows, ends, "{decl_ref}: unbalanced borrows");
    }
    Ok(())
}
