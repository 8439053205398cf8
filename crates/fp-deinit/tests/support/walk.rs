use std::collections::BTreeSet;

use fp_core::mir::{
    BasicBlockId, Body, Callee, DeclRef, DeclRefKind, Module, StatementKind, StoreQualifier,
    TerminatorKind,
};

/// Callees of every `apply` in `body`, in statement order.
pub fn applied_callees(body: &Body) -> Vec<Callee> {
    body.statements()
        .filter_map(|(_, stmt)| match &stmt.kind {
            StatementKind::Apply { callee, .. } => match &body.defining_statement(*callee)?.kind {
                StatementKind::FunctionRef { callee } => Some(callee.clone()),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// Number of destroyer invocations reached by calling `entry`, following
/// destroyer-to-destroyer calls through `module`.
pub fn destroyer_invocations(module: &Module, entry: &DeclRef) -> usize {
    let Some(function) = module.get(entry) else {
        panic!("{entry} not lowered");
    };
    applied_callees(&function.body)
        .into_iter()
        .filter_map(|callee| match callee {
            Callee::Decl(decl) if decl.kind == DeclRefKind::Destroyer => Some(decl),
            _ => None,
        })
        .map(|destroyer| 1 + destroyer_invocations(module, &destroyer))
        .sum()
}

pub fn reachable_from(body: &Body, start: BasicBlockId) -> BTreeSet<BasicBlockId> {
    let mut seen = BTreeSet::new();
    let mut work = vec![start];
    while let Some(block) = work.pop() {
        if seen.insert(block) {
            work.extend(body.successors(block));
        }
    }
    seen
}

/// What running the chain-destruction loop did to a chain.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ChainRun {
    pub loop_entries: usize,
    pub released: usize,
    pub steps: usize,
}

/// Abstractly executes `body` on a chain of `len` nodes. Every node is
/// uniquely referenced unless `shared_at` names the first shared one.
pub fn run_chain(body: &Body, len: usize, shared_at: Option<usize>) -> ChainRun {
    let mut run = ChainRun::default();
    let mut remaining = len;
    let mut position = 0;
    let mut block: BasicBlockId = 0;
    let loop_header = body
        .basic_blocks
        .iter()
        .position(|data| data.label.as_deref() == Some("loopBB"))
        .map(|idx| idx as BasicBlockId);

    loop {
        run.steps += 1;
        assert!(run.steps < 10 * (len + 10), "chain loop does not terminate");
        if Some(block) == loop_header {
            run.loop_entries += 1;
        }
        let data = body.block(block);
        for stmt in &data.statements {
            if let StatementKind::Store {
                qualifier: StoreQualifier::Assign,
                ..
            } = stmt.kind
            {
                run.released += 1;
                remaining -= 1;
                position += 1;
            }
        }
        let Some(term) = &data.terminator else {
            panic!("bb{block} unterminated");
        };
        block = match &term.kind {
            TerminatorKind::Branch { target } => *target,
            TerminatorKind::CondBranch {
                then_target,
                else_target,
                ..
            } => {
                if shared_at == Some(position) {
                    *else_target
                } else {
                    *then_target
                }
            }
            TerminatorKind::SwitchEnum { cases, .. } => {
                let wanted = if remaining > 0 { "some" } else { "none" };
                cases
                    .iter()
                    .find(|case| case.case == wanted)
                    .map(|case| case.target)
                    .unwrap_or_else(|| panic!("no `{wanted}` case"))
            }
            TerminatorKind::Return { .. } | TerminatorKind::Unreachable => return run,
        };
    }
}
