use fp_core::decl::{
    ActorKind, ClassDecl, DeclTable, DeinitBody, DestructorDecl, EnumCase, NominalDecl,
    NominalKind, StoredMember,
};
use fp_core::mir::{Symbol, Ty};

pub fn object(name: &str) -> Ty {
    Ty::nominal(name, Vec::new())
}

pub fn root_class(name: &str) -> NominalDecl {
    NominalDecl::new(name, NominalKind::Class(ClassDecl::default()))
}

pub fn subclass(name: &str, superclass: &str) -> NominalDecl {
    NominalDecl::new(
        name,
        NominalKind::Class(ClassDecl {
            superclass: Some(object(superclass)),
            ..ClassDecl::default()
        }),
    )
}

pub fn user_body(name: &str) -> DestructorDecl {
    DestructorDecl {
        body: Some(DeinitBody {
            name: Symbol::new(name),
            diverges: false,
        }),
        ..DestructorDecl::default()
    }
}

/// `C0 <- C1 <- ... <- C{depth-1}`; returns the table and the leaf's name.
pub fn hierarchy(depth: usize) -> (DeclTable, String) {
    let mut decls = vec![root_class("C0")];
    for level in 1..depth {
        decls.push(subclass(&format!("C{level}"), &format!("C{}", level - 1)));
    }
    (DeclTable::from_decls(decls), format!("C{}", depth - 1))
}

/// `class Node { var value: Payload; var next: Node? }`
pub fn linked_node() -> NominalDecl {
    let mut node = root_class("Node");
    node.stored_members = vec![
        StoredMember::new("value", object("Payload")),
        StoredMember::new("next", Ty::optional(object("Node"))),
    ];
    node
}

pub fn distributed_actor(name: &str) -> NominalDecl {
    let mut actor = NominalDecl::new(
        name,
        NominalKind::Class(ClassDecl {
            actor: ActorKind::DistributedActor,
            default_actor: true,
            ..ClassDecl::default()
        }),
    );
    actor.stored_members = vec![
        StoredMember::new("id", object("ActorID")),
        StoredMember::new("actorSystem", object("ActorSystem")),
        StoredMember::new("greeting", object("String")),
        StoredMember::new("inbox", object("Mailbox")).isolated(),
    ];
    actor.destructor = Some(user_body("Greeter.deinit.body"));
    actor
}

/// Address-only move-only enum with `cases` cases, every other one carrying a payload.
pub fn move_only_enum(cases: usize) -> NominalDecl {
    let cases = (0..cases)
        .map(|idx| EnumCase {
            name: Symbol::new(format!("case{idx}")),
            payload: (idx % 2 == 1).then(|| object("Resource")),
        })
        .collect();
    let mut decl = NominalDecl::new("Slot", NominalKind::Enum(cases));
    decl.move_only = true;
    decl.address_only = true;
    decl
}

pub fn isolated_actor(name: &str) -> NominalDecl {
    let mut actor = NominalDecl::new(
        name,
        NominalKind::Class(ClassDecl {
            actor: ActorKind::Actor,
            default_actor: true,
            ..ClassDecl::default()
        }),
    );
    actor.destructor = Some(DestructorDecl {
        isolated: true,
        isolation: fp_core::decl::ActorIsolation::ActorInstance,
        ..user_body("Counter.deinit.body")
    });
    actor
}
