use super::*;
use fp_core::decl::{ActorKind, ClassDecl, EnumCase};
use fp_core::diagnostics::DiagnosticLevel;
use fp_core::mir::{Body, TerminatorKind};
use pretty_assertions::assert_eq;

fn class(name: &str, class: ClassDecl) -> NominalDecl {
    NominalDecl::new(name, NominalKind::Class(class))
}

fn subclass_of(name: &str, superclass: Ty) -> NominalDecl {
    class(
        name,
        ClassDecl {
            superclass: Some(superclass),
            ..ClassDecl::default()
        },
    )
}

fn with_body(mut decl: NominalDecl, body: &str) -> NominalDecl {
    let mut destructor = decl.destructor();
    destructor.implicit = false;
    destructor.body = Some(DeinitBody {
        name: Symbol::new(body),
        diverges: false,
    });
    decl.destructor = Some(destructor);
    decl
}

fn kinds(body: &Body) -> Vec<&StatementKind> {
    body.statements().map(|(_, stmt)| &stmt.kind).collect()
}

fn applied_callees(body: &Body) -> Vec<Callee> {
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

fn destroyed_fields(body: &Body) -> Vec<String> {
    body.statements()
        .filter_map(|(_, stmt)| match &stmt.kind {
            StatementKind::DestroyAddr { address } => {
                let access = body.defining_statement(*address)?;
                let StatementKind::BeginAccess { address, .. } = &access.kind else {
                    return None;
                };
                match &body.defining_statement(*address)?.kind {
                    StatementKind::RefElementAddr { field, .. }
                    | StatementKind::StructElementAddr { field, .. } => Some(field.to_string()),
                    _ => None,
                }
            }
            _ => None,
        })
        .collect()
}

fn lower(table: &DeclTable, ty: &str, kind: DestructorKind) -> Function {
    DeinitLowering::default().lower(table, ty, kind).unwrap()
}

#[test]
fn destroyer_of_root_class_destroys_members_in_order() {
    let mut widget = with_body(class("Widget", ClassDecl::default()), "Widget.deinit.body");
    widget.stored_members = vec![
        StoredMember::new("name", Ty::nominal("String", Vec::new())),
        StoredMember::new("count", Ty::trivial("Int")).trivial(),
        StoredMember::new("delegate", Ty::optional(Ty::any_object())),
    ];
    let table = DeclTable::from_decls([widget]);

    let function = lower(&table, "Widget", DestructorKind::Destroying);
    let body = &function.body;

    assert_eq!(function.sig.result, Ty::native_object());
    assert_eq!(body.basic_blocks.len(), 1);
    assert_eq!(destroyed_fields(body), vec!["name", "delegate"]);
    assert!(kinds(body)
        .iter()
        .any(|kind| matches!(kind, StatementKind::UserBody { body } if body == "Widget.deinit.body")));

    let Some(TerminatorKind::Return { value }) =
        body.basic_blocks[0].terminator.as_ref().map(|t| &t.kind)
    else {
        panic!("destroyer must return");
    };
    assert_eq!(body.value(*value).ownership, Some(Ownership::Owned));
    assert_eq!(body.value(*value).ty, LoweredTy::object(Ty::native_object()));
}

#[test]
fn destroyer_calls_superclass_destroyer() {
    let base = class("Base", ClassDecl::default());
    let derived = subclass_of("Derived", Ty::nominal("Base", Vec::new()));
    let table = DeclTable::from_decls([base, derived]);

    let body = lower(&table, "Derived", DestructorKind::Destroying).body;
    assert_eq!(
        applied_callees(&body),
        vec![Callee::Decl(DeclRef::new("Base", DeclRefKind::Destroyer))]
    );
    assert!(kinds(&body)
        .iter()
        .any(|kind| matches!(kind, StatementKind::Upcast { .. })));
}

#[test]
fn concrete_superclass_substitutions_are_dropped() {
    let mut base = class("Box", ClassDecl::default());
    base.generic_params = vec![Symbol::new("T")];
    let concrete = subclass_of("IntBox", Ty::nominal("Box", vec![Ty::trivial("Int")]));
    let mut generic = subclass_of("Wrapper", Ty::nominal("Box", vec![Ty::param("U")]));
    generic.generic_params = vec![Symbol::new("U")];
    let table = DeclTable::from_decls([base, concrete, generic]);

    let subs_of = |ty: &str| {
        let body = lower(&table, ty, DestructorKind::Destroying).body;
        let subs = body
            .statements()
            .find_map(|(_, stmt)| match &stmt.kind {
                StatementKind::Apply { substitutions, .. } => Some(substitutions.clone()),
                _ => None,
            })
            .unwrap();
        subs
    };

    assert!(subs_of("IntBox").is_empty());
    assert_eq!(
        subs_of("Wrapper"),
        SubstitutionMap::new(&[Symbol::new("T")], &[Ty::param("U")])
    );
}

#[test]
fn native_foreign_root_subclass_skips_superclass_destroyer() {
    let root = class(
        "Bridged",
        ClassDecl {
            superclass: Some(Ty::nominal("ForeignRoot", Vec::new())),
            native_foreign_root_subclass: true,
            ..ClassDecl::default()
        },
    );
    let table = DeclTable::from_decls([root]);

    let body = lower(&table, "Bridged", DestructorKind::Destroying).body;
    assert!(applied_callees(&body).is_empty());
}

#[test]
fn diverging_body_drops_epilog_and_teardown() {
    let mut widget = class("Widget", ClassDecl::default());
    widget.stored_members = vec![StoredMember::new("name", Ty::nominal("String", Vec::new()))];
    widget.destructor = Some(DestructorDecl {
        body: Some(DeinitBody {
            name: Symbol::new("fatal"),
            diverges: true,
        }),
        ..DestructorDecl::default()
    });
    let table = DeclTable::from_decls([widget]);

    let body = lower(&table, "Widget", DestructorKind::Destroying).body;
    assert_eq!(body.basic_blocks.len(), 1);
    assert!(destroyed_fields(&body).is_empty());
    assert!(matches!(
        body.basic_blocks[0].terminator.as_ref().map(|t| &t.kind),
        Some(TerminatorKind::Unreachable)
    ));
}

#[test]
fn global_actor_isolation_checks_executor() {
    let mut view = class("View", ClassDecl::default());
    view.destructor = Some(DestructorDecl {
        isolation: ActorIsolation::GlobalActor(Ty::nominal("MainActor", Vec::new())),
        ..DestructorDecl::default()
    });
    let table = DeclTable::from_decls([view]);

    let body = lower(&table, "View", DestructorKind::Destroying).body;
    assert!(kinds(&body)
        .iter()
        .any(|kind| matches!(kind, StatementKind::GlobalActorInstance { .. })));
    assert_eq!(
        applied_callees(&body),
        vec![Callee::Runtime(RuntimeFunction::PreconditionExpectedExecutor)]
    );
}

#[test]
fn deallocator_destroys_then_frees() {
    let table = DeclTable::from_decls([class("Widget", ClassDecl::default())]);
    let function = lower(&table, "Widget", DestructorKind::Deallocating { isolated: false });
    let body = &function.body;

    assert_eq!(
        function.decl_ref,
        DeclRef::new("Widget", DeclRefKind::Deallocator)
    );
    assert_eq!(
        applied_callees(body),
        vec![Callee::Decl(DeclRef::new("Widget", DeclRefKind::Destroyer))]
    );
    let order: Vec<_> = kinds(body)
        .into_iter()
        .filter(|kind| {
            matches!(
                kind,
                StatementKind::Apply { .. }
                    | StatementKind::EndLifetime { .. }
                    | StatementKind::DeallocRef { .. }
            )
        })
        .collect();
    assert!(matches!(
        order.as_slice(),
        [
            StatementKind::Apply { .. },
            StatementKind::EndLifetime { .. },
            StatementKind::DeallocRef { .. }
        ]
    ));
}

#[test]
fn foreign_ivar_destroyer_converts_unowned_self() {
    let mut view = class(
        "View",
        ClassDecl {
            foreign: true,
            superclass: Some(Ty::nominal("Object", Vec::new())),
            ..ClassDecl::default()
        },
    );
    view.stored_members = vec![StoredMember::new("title", Ty::nominal("String", Vec::new()))];
    let table = DeclTable::from_decls([view, class("Object", ClassDecl::default())]);

    let function = lower(&table, "View", DestructorKind::IVarDestroyer);
    let body = &function.body;
    assert_eq!(function.sig.params[0].1, ParamConvention::Unowned);
    assert!(kinds(body).iter().any(|kind| matches!(
        kind,
        StatementKind::UncheckedOwnershipConversion {
            to: Ownership::Guaranteed,
            ..
        }
    )));
    assert_eq!(destroyed_fields(body), vec!["title"]);
}

#[test]
fn foreign_deallocator_forwards_to_superclass() {
    let view = class(
        "View",
        ClassDecl {
            foreign: true,
            superclass: Some(Ty::nominal("Object", Vec::new())),
            ..ClassDecl::default()
        },
    );
    let table = DeclTable::from_decls([view, class("Object", ClassDecl::default())]);

    let function = lower(&table, "View", DestructorKind::Foreign);
    assert!(function.decl_ref.foreign);
    let body = &function.body;
    assert!(kinds(body).iter().any(|kind| matches!(
        kind,
        StatementKind::SuperMethod { method, .. }
            if *method == DeclRef::new("Object", DeclRefKind::Deallocator).as_foreign()
    )));
    assert!(kinds(body)
        .iter()
        .any(|kind| matches!(kind, StatementKind::EndLifetime { .. })));
}

#[test]
fn foreign_deallocator_without_superclass_is_fatal() {
    let table = DeclTable::from_decls([class(
        "Orphan",
        ClassDecl {
            foreign: true,
            ..ClassDecl::default()
        },
    )]);
    let err = DeinitLowering::default()
        .lower(&table, "Orphan", DestructorKind::Foreign)
        .unwrap_err();
    assert_eq!(
        err.as_lowering(),
        Some(&LoweringError::MissingForeignSuperclass {
            class: "Orphan".into()
        })
    );
}

#[test]
fn several_recursive_links_fall_back_with_a_note() {
    let node_ty = Ty::nominal("Tree", Vec::new());
    let mut tree = class("Tree", ClassDecl::default());
    tree.stored_members = vec![
        StoredMember::new("left", Ty::optional(node_ty.clone())),
        StoredMember::new("right", Ty::optional(node_ty)),
    ];
    let table = DeclTable::from_decls([tree]);

    let mut lowering = DeinitLowering::default();
    let body = lowering
        .lower(&table, "Tree", DestructorKind::Destroying)
        .unwrap()
        .body;

    assert_eq!(body.basic_blocks.len(), 1);
    assert_eq!(destroyed_fields(&body), vec!["left", "right"]);
    let notes = lowering.take_diagnostics();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, DiagnosticLevel::Info);
}

#[test]
fn chain_optimization_can_be_disabled() {
    let mut node = class("Node", ClassDecl::default());
    node.stored_members = vec![StoredMember::new(
        "next",
        Ty::optional(Ty::nominal("Node", Vec::new())),
    )];
    let table = DeclTable::from_decls([node]);

    let options = LoweringOptions {
        recursive_chain_optimization: false,
        ..LoweringOptions::default()
    };
    let body = DeinitLowering::new(options)
        .lower(&table, "Node", DestructorKind::Destroying)
        .unwrap()
        .body;
    assert_eq!(body.basic_blocks.len(), 1);
    assert_eq!(destroyed_fields(&body), vec!["next"]);
}

#[test]
fn profiler_counter_precedes_user_body() {
    let table = DeclTable::from_decls([with_body(class("Widget", ClassDecl::default()), "body")]);
    let options = LoweringOptions {
        emit_profiler_counters: true,
        ..LoweringOptions::default()
    };
    let body = DeinitLowering::new(options)
        .lower(&table, "Widget", DestructorKind::Destroying)
        .unwrap()
        .body;
    let kinds = kinds(&body);
    let counter = kinds
        .iter()
        .position(|kind| matches!(kind, StatementKind::ProfilerIncrement { .. }))
        .unwrap();
    let user = kinds
        .iter()
        .position(|kind| matches!(kind, StatementKind::UserBody { .. }))
        .unwrap();
    assert!(counter < user);
}

#[test]
fn loadable_move_only_value_is_destroyed_whole() {
    let mut handle = NominalDecl::new("FileHandle", NominalKind::Struct);
    handle.move_only = true;
    handle.stored_members = vec![StoredMember::new("fd", Ty::trivial("Int32")).trivial()];
    let table = DeclTable::from_decls([handle]);

    let body = lower(&table, "FileHandle", DestructorKind::MoveOnlyDeallocator).body;
    let kinds = kinds(&body);
    let drop = kinds
        .iter()
        .position(|kind| matches!(kind, StatementKind::DropDeinit { .. }))
        .unwrap();
    let destroy = kinds
        .iter()
        .position(|kind| matches!(kind, StatementKind::DestroyValue { .. }))
        .unwrap();
    assert!(drop < destroy);
    assert!(!kinds
        .iter()
        .any(|kind| matches!(kind, StatementKind::AllocStack)));
}

#[test]
fn address_only_struct_is_torn_down_per_member() {
    let mut pair = NominalDecl::new("Pair", NominalKind::Struct);
    pair.move_only = true;
    pair.address_only = true;
    pair.generic_params = vec![Symbol::new("T")];
    pair.stored_members = vec![
        StoredMember::new("first", Ty::param("T")),
        StoredMember::new("tag", Ty::trivial("Int")).trivial(),
        StoredMember::new("second", Ty::param("T")),
    ];
    let table = DeclTable::from_decls([pair]);

    let body = lower(&table, "Pair", DestructorKind::MoveOnlyDeallocator).body;
    assert_eq!(destroyed_fields(&body), vec!["first", "second"]);
    let kinds = kinds(&body);
    assert!(matches!(kinds.first(), Some(StatementKind::AllocStack)));
    assert!(kinds
        .iter()
        .any(|kind| matches!(kind, StatementKind::DeallocStack { .. })));
}

#[test]
fn move_only_enum_switches_over_cases() {
    let mut token = NominalDecl::new(
        "Token",
        NominalKind::Enum(vec![
            EnumCase {
                name: Symbol::new("empty"),
                payload: None,
            },
            EnumCase {
                name: Symbol::new("owned"),
                payload: Some(Ty::nominal("Buffer", Vec::new())),
            },
        ]),
    );
    token.move_only = true;
    token.address_only = true;
    let table = DeclTable::from_decls([token]);

    let body = lower(&table, "Token", DestructorKind::MoveOnlyDeallocator).body;
    // entry, continuation, one block per case
    assert_eq!(body.basic_blocks.len(), 4);
    let Some(TerminatorKind::SwitchEnum { cases, .. }) =
        body.basic_blocks[0].terminator.as_ref().map(|t| &t.kind)
    else {
        panic!("entry must switch on the enum");
    };
    assert_eq!(cases.len(), 2);
    let takes = kinds(&body)
        .into_iter()
        .filter(|kind| matches!(kind, StatementKind::UncheckedTakeEnumDataAddr { .. }))
        .count();
    assert_eq!(takes, 1);
}

#[test]
fn kinds_are_checked_against_the_type() {
    let table = DeclTable::from_decls([
        class("Widget", ClassDecl::default()),
        NominalDecl::new("Point", NominalKind::Struct),
    ]);
    let mut lowering = DeinitLowering::default();

    let err = lowering
        .lower(&table, "Widget", DestructorKind::MoveOnlyDeallocator)
        .unwrap_err();
    assert!(matches!(
        err.as_lowering(),
        Some(LoweringError::UnsupportedKind { .. })
    ));
    let err = lowering
        .lower(&table, "Point", DestructorKind::MoveOnlyDeallocator)
        .unwrap_err();
    assert!(matches!(
        err.as_lowering(),
        Some(LoweringError::UnsupportedKind { .. })
    ));
}

#[test]
fn applicable_kinds_follow_the_declaration() {
    let plain = class("Widget", ClassDecl::default());
    assert_eq!(
        DestructorKind::applicable(&plain),
        vec![
            DestructorKind::Destroying,
            DestructorKind::Deallocating { isolated: false }
        ]
    );

    let mut isolated = class(
        "Counter",
        ClassDecl {
            actor: ActorKind::Actor,
            default_actor: true,
            ..ClassDecl::default()
        },
    );
    isolated.destructor = Some(DestructorDecl {
        isolated: true,
        isolation: ActorIsolation::ActorInstance,
        ..DestructorDecl::default()
    });
    assert_eq!(
        DestructorKind::applicable(&isolated),
        vec![
            DestructorKind::Destroying,
            DestructorKind::IsolatingDeallocator,
            DestructorKind::Deallocating { isolated: true }
        ]
    );

    for kind in DestructorKind::applicable(&isolated) {
        assert_eq!(DestructorKind::from_name(kind.name()), Some(kind));
    }
}

#[test]
fn root_actor_destroys_default_actor_state() {
    let counter = class(
        "Counter",
        ClassDecl {
            actor: ActorKind::Actor,
            default_actor: true,
            ..ClassDecl::default()
        },
    );
    let table = DeclTable::from_decls([counter]);

    let body = lower(&table, "Counter", DestructorKind::Destroying).body;
    assert!(kinds(&body).iter().any(|kind| matches!(
        kind,
        StatementKind::Builtin {
            builtin: BuiltinKind::DestroyDefaultActor,
            ..
        }
    )));
}
