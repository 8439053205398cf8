use std::fmt::{self, Formatter};

use itertools::Itertools;

use crate::pretty::{PrettyCtx, PrettyPrintable};

use super::{
    AccessKind, BasicBlockData, Body, Function, LoadQualifier, Module, Statement, StatementKind,
    StoreQualifier, Terminator, TerminatorKind, ValueId,
};

impl PrettyPrintable for Module {
    fn fmt_pretty(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
        for (idx, function) in self.functions.values().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            function.fmt_pretty(f, ctx)?;
        }
        Ok(())
    }
}

impl PrettyPrintable for Function {
    fn fmt_pretty(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
        ctx.writeln(
            f,
            format!("fn {} : {} {{", self.decl_ref, crate::mir::Ty::function(self.sig.clone())),
        )?;
        write_body(&self.body, f, ctx)?;
        ctx.writeln(f, "}")
    }
}

impl PrettyPrintable for Body {
    fn fmt_pretty(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
        ctx.writeln(f, format!("body {} -> {} {{", self.name, self.return_ty))?;
        write_body(self, f, ctx)?;
        ctx.writeln(f, "}")
    }
}

fn write_body(body: &Body, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
    for (idx, block) in body.basic_blocks.iter().enumerate() {
        write_block(body, idx, block, f, ctx)?;
    }
    Ok(())
}

fn describe_value(body: &Body, id: ValueId, show_ownership: bool) -> String {
    let decl = body.value(id);
    match decl.ownership {
        Some(ownership) if show_ownership => format!("{} : {} {}", id, ownership, decl.ty),
        _ => format!("{} : {}", id, decl.ty),
    }
}

fn write_block(
    body: &Body,
    idx: usize,
    block: &BasicBlockData,
    f: &mut Formatter<'_>,
    ctx: &mut PrettyCtx<'_>,
) -> fmt::Result {
    let params = if idx == 0 && !body.params.is_empty() {
        format!(
            "({})",
            body.params
                .iter()
                .map(|param| describe_value(body, *param, ctx.options.show_ownership))
                .join(", ")
        )
    } else {
        String::new()
    };
    let label = block
        .label
        .as_deref()
        .map(|label| format!("  // {}", label))
        .unwrap_or_default();
    ctx.writeln(f, format!("bb{}{}:{}", idx, params, label))?;
    ctx.with_indent(|ctx| {
        for stmt in &block.statements {
            write_statement(body, stmt, f, ctx)?;
        }
        match &block.terminator {
            Some(term) => write_terminator(term, f, ctx),
            None => ctx.writeln(f, "<unterminated>"),
        }
    })
}

fn access_kind(kind: AccessKind) -> &'static str {
    match kind {
        AccessKind::Read => "read",
        AccessKind::Modify => "modify",
        AccessKind::Deinit => "deinit",
    }
}

fn format_statement(kind: &StatementKind) -> String {
    use StatementKind::*;
    match kind {
        FunctionRef { callee } => format!("function_ref {}", callee),
        SuperMethod { operand, method } => format!("objc_super_method {}, {}", operand, method),
        Apply {
            callee,
            substitutions,
            args,
        } => {
            let subs = if substitutions.is_empty() {
                String::new()
            } else {
                format!(
                    "<{}>",
                    substitutions
                        .replacements
                        .iter()
                        .map(|(param, ty)| format!("{} := {}", param, ty))
                        .join(", ")
                )
            };
            format!("apply {}{}({})", callee, subs, args.iter().join(", "))
        }
        Builtin { builtin, args } => {
            format!("builtin \"{:?}\"({})", builtin, args.iter().join(", "))
        }
        BeginBorrow { operand } => format!("begin_borrow {}", operand),
        EndBorrow { operand } => format!("end_borrow {}", operand),
        LoadBorrow { address } => format!("load_borrow {}", address),
        Upcast { operand } => format!("upcast {}", operand),
        UncheckedRefCast { operand } => format!("unchecked_ref_cast {}", operand),
        UncheckedOwnershipConversion { operand, to } => {
            format!("unchecked_ownership_conversion {}, {}", operand, to)
        }
        InitExistentialRef { operand } => format!("init_existential_ref {}", operand),
        ConvertFunction { operand } => format!("convert_function {}", operand),
        IntegerLiteral { value } => format!("integer_literal {}", value),
        Tuple { elements } => format!("tuple ({})", elements.iter().join(", ")),
        RefElementAddr { operand, field } => format!("ref_element_addr {}, #{}", operand, field),
        StructElementAddr { operand, field } => {
            format!("struct_element_addr {}, #{}", operand, field)
        }
        BeginAccess {
            address,
            kind,
            no_nested_conflict,
        } => {
            let nested = if *no_nested_conflict {
                " [no_nested_conflict]"
            } else {
                ""
            };
            format!("begin_access [{}] [static]{} {}", access_kind(*kind), nested, address)
        }
        EndAccess { access } => format!("end_access {}", access),
        DestroyAddr { address } => format!("destroy_addr {}", address),
        DestroyValue { operand } => format!("destroy_value {}", operand),
        Load { address, qualifier } => {
            let q = match qualifier {
                LoadQualifier::Take => "take",
                LoadQualifier::Copy => "copy",
            };
            format!("load [{}] {}", q, address)
        }
        Store {
            value,
            dest,
            qualifier,
        } => {
            let q = match qualifier {
                StoreQualifier::Init => "init",
                StoreQualifier::Assign => "assign",
            };
            format!("store {} to [{}] {}", value, q, dest)
        }
        OptionalNone => "enum #Optional.none".to_string(),
        UncheckedEnumData { operand, case } => format!("unchecked_enum_data {}, #{}", operand, case),
        UncheckedTakeEnumDataAddr { address, case } => {
            format!("unchecked_take_enum_data_addr {}, #{}", address, case)
        }
        IsUnique { address } => format!("is_unique {}", address),
        AllocStack => "alloc_stack".to_string(),
        DeallocStack { address } => format!("dealloc_stack {}", address),
        DeallocRef { operand } => format!("dealloc_ref {}", operand),
        EndLifetime { operand } => format!("end_lifetime {}", operand),
        ExtractExecutor { actor } => format!("extract_executor {}", actor),
        GlobalActorInstance { actor } => format!("global_actor_shared {}", actor),
        DropDeinit { operand } => format!("drop_deinit {}", operand),
        UserBody { body } => format!("<user body {}>", body),
        ProfilerIncrement { counter } => format!("increment_profiler_counter \"{}\"", counter),
    }
}

fn write_statement(
    body: &Body,
    stmt: &Statement,
    f: &mut Formatter<'_>,
    ctx: &mut PrettyCtx<'_>,
) -> fmt::Result {
    let text = format_statement(&stmt.kind);
    let mut line = match stmt.result {
        Some(result) => format!(
            "{} = {}  // {}",
            result,
            text,
            describe_value(body, result, ctx.options.show_ownership)
        ),
        None => text,
    };
    if ctx.options.show_locations {
        line.push_str(&format!(
            " // {}{}",
            stmt.location.span,
            if stmt.location.auto_generated { " auto_gen" } else { "" }
        ));
    }
    ctx.writeln(f, line)
}

fn write_terminator(term: &Terminator, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
    let text = match &term.kind {
        TerminatorKind::Branch { target } => format!("br bb{}", target),
        TerminatorKind::CondBranch {
            cond,
            then_target,
            else_target,
        } => format!("cond_br {}, bb{}, bb{}", cond, then_target, else_target),
        TerminatorKind::SwitchEnum { operand, cases } => format!(
            "switch_enum {}, {}",
            operand,
            cases
                .iter()
                .map(|case| format!("case #{}: bb{}", case.case, case.target))
                .join(", ")
        ),
        TerminatorKind::Return { value } => format!("return {}", value),
        TerminatorKind::Unreachable => "unreachable".to_string(),
    };
    ctx.writeln(f, text)
}
