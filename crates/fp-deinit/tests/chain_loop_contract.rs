use fp_core::decl::{DeclTable, StoredMember};
use fp_core::error::Result;
use fp_core::mir::{Body, StatementKind, Ty};
use fp_deinit::{DeinitLowering, DestructorKind};

mod support;

use support::decls;
use support::walk::{run_chain, ChainRun};

fn node_destroyer() -> Result<Body> {
    let table = DeclTable::from_decls([decls::linked_node()]);
    Ok(DeinitLowering::default()
        .lower(&table, "Node", DestructorKind::Destroying)?
        .body)
}

#[test]
fn chain_loop_has_a_fixed_shape() -> Result<()> {
    let body = node_destroyer()?;
    // entry plus the six loop blocks
    assert_eq!(body.basic_blocks.len(), 7);
    let labels: Vec<_> = body
        .basic_blocks
        .iter()
        .filter_map(|block| block.label.as_deref())
        .collect();
    for label in ["loopBB", "someBB", "uniqueBB", "notUniqueBB", "noneBB", "cleanBB"] {
        assert!(labels.contains(&label), "missing {label}");
    }
    Ok(())
}

#[test]
fn chain_loop_releases_each_node_once() -> Result<()> {
    let body = node_destroyer()?;
    for len in [0, 1, 2, 7, 100, 1000] {
        let run = run_chain(&body, len, None);
        assert_eq!(run.released, len, "len {len}");
        assert_eq!(run.loop_entries, len + 1, "len {len}");
    }
    Ok(())
}

#[test]
fn shared_node_stops_the_loop() -> Result<()> {
    let body = node_destroyer()?;
    let run = run_chain(&body, 10, Some(3));
    assert_eq!(
        run,
        ChainRun {
            loop_entries: 4,
            released: 3,
            steps: run.steps,
        }
    );
    Ok(())
}

#[test]
fn link_member_is_not_destroyed_recursively() -> Result<()> {
    let body = node_destroyer()?;
    let plain_destroys: Vec<_> = body
        .statements()
        .filter_map(|(_, stmt)| match &stmt.kind {
            StatementKind::BeginAccess { address, .. } => body.defining_statement(*address),
            _ => None,
        })
        .filter_map(|stmt| match &stmt.kind {
            StatementKind::RefElementAddr { field, .. } => Some(field.to_string()),
            _ => None,
        })
        .collect();
    // `value` destroyed in place; `next` only read and taken by the loop
    assert_eq!(plain_destroys, vec!["value", "next", "next"]);
    Ok(())
}

#[test]
fn two_self_links_destroy_members_without_a_loop() -> Result<()> {
    let mut node = decls::linked_node();
    node.stored_members
        .push(StoredMember::new("prev", Ty::optional(decls::object("Node"))));
    let table = DeclTable::from_decls([node]);

    let mut lowering = DeinitLowering::default();
    let body = lowering
        .lower(&table, "Node", DestructorKind::Destroying)?
        .body;
    assert_eq!(body.basic_blocks.len(), 1);
    assert!(!body
        .statements()
        .any(|(_, stmt)| matches!(stmt.kind, StatementKind::IsUnique { .. })));
    assert_eq!(lowering.take_diagnostics().len(), 1);
    Ok(())
}
