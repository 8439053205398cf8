//! Declaration-layer view of nominal types, as far as destructor lowering
//! needs it. Built by the type checker (or deserialized from JSON) and never
//! mutated by lowering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LoweringError, Result};
use crate::mir::{Symbol, Ty, TyKind};
use crate::span::Span;


/// Replacement types for the generic parameters of one declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubstitutionMap {
    pub replacements: Vec<(Symbol, Ty)>,
}

impl SubstitutionMap {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(params: &[Symbol], args: &[Ty]) -> Self {
        Self {
            replacements: params.iter().cloned().zip(args.iter().cloned()).collect(),
        }
    }

    /// Maps every parameter to itself.
    pub fn forwarding(params: &[Symbol]) -> Self {
        Self {
            replacements: params
                .iter()
                .map(|param| (param.clone(), Ty::param(param.clone())))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    pub fn all_concrete(&self) -> bool {
        self.replacements.iter().all(|(_, ty)| ty.is_concrete())
    }

    pub fn apply(&self, ty: &Ty) -> Ty {
        match &ty.kind {
            TyKind::Param(name) => self
                .replacements
                .iter()
                .find(|(param, _)| param == name)
                .map(|(_, replacement)| replacement.clone())
                .unwrap_or_else(|| ty.clone()),
            TyKind::Tuple(elems) => Ty {
                kind: TyKind::Tuple(elems.iter().map(|elem| self.apply(elem)).collect()),
            },
            TyKind::Nominal { name, args } => {
                Ty::nominal(name.clone(), args.iter().map(|arg| self.apply(arg)).collect())
            }
            TyKind::Optional(inner) => Ty::optional(self.apply(inner)),
            _ => ty.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberIsolation {
    #[default]
    Nonisolated,
    /// Bound to the actor instance that owns it.
    ActorInstance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMember {
    pub name: Symbol,
    pub ty: Ty,
    /// Destroying the member is a no-op.
    #[serde(default)]
    pub trivial: bool,
    #[serde(default)]
    pub isolation: MemberIsolation,
}

impl StoredMember {
    pub fn new(name: impl Into<Symbol>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
            trivial: false,
            isolation: MemberIsolation::Nonisolated,
        }
    }

    pub fn trivial(mut self) -> Self {
        self.trivial = true;
        self
    }

    pub fn isolated(mut self) -> Self {
        self.isolation = MemberIsolation::ActorInstance;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ActorIsolation {
    #[default]
    Unspecified,
    Nonisolated,
    ActorInstance,
    GlobalActor(Ty),
}

impl ActorIsolation {
    /// Code under this isolation runs on a specific actor's executor.
    pub fn has_actor(&self) -> bool {
        matches!(self, ActorIsolation::ActorInstance | ActorIsolation::GlobalActor(_))
    }
}

/// Handle to the user-written deinit body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeinitBody {
    pub name: Symbol,
    /// The body never falls through to the epilog.
    #[serde(default)]
    pub diverges: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestructorDecl {
    #[serde(default)]
    pub body: Option<DeinitBody>,
    #[serde(default)]
    pub isolation: ActorIsolation,
    /// `isolated deinit`: deallocation hops to the actor's executor.
    #[serde(default)]
    pub isolated: bool,
    #[serde(default)]
    pub implicit: bool,
    /// Reaching this destructor must trap at run time.
    #[serde(default)]
    pub unavailable: bool,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorKind {
    #[default]
    None,
    Actor,
    DistributedActor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    #[serde(default)]
    pub superclass: Option<Ty>,
    #[serde(default)]
    pub actor: ActorKind,
    /// Serialization is provided by the runtime's built-in executor.
    #[serde(default)]
    pub default_actor: bool,
    /// Implemented by the foreign object runtime; owns a foreign deallocator.
    #[serde(default)]
    pub foreign: bool,
    /// Direct subclass of the foreign root object.
    #[serde(default)]
    pub native_foreign_root_subclass: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumCase {
    pub name: Symbol,
    #[serde(default)]
    pub payload: Option<Ty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NominalKind {
    Class(ClassDecl),
    Struct,
    Enum(Vec<EnumCase>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NominalDecl {
    pub name: Symbol,
    #[serde(default)]
    pub generic_params: Vec<Symbol>,
    pub kind: NominalKind,
    #[serde(default)]
    pub stored_members: Vec<StoredMember>,
    #[serde(default)]
    pub destructor: Option<DestructorDecl>,
    /// Values cannot be implicitly copied.
    #[serde(default)]
    pub move_only: bool,
    /// Layout unknown at lowering time; values are manipulated in memory.
    #[serde(default)]
    pub address_only: bool,
    #[serde(default)]
    pub span: Span,
}

impl NominalDecl {
    pub fn new(name: impl Into<Symbol>, kind: NominalKind) -> Self {
        Self {
            name: name.into(),
            generic_params: Vec::new(),
            kind,
            stored_members: Vec::new(),
            destructor: None,
            move_only: false,
            address_only: false,
            span: Span::default(),
        }
    }

    /// The type as seen from inside its own declaration.
    pub fn declared_ty(&self) -> Ty {
        Ty::nominal(
            self.name.clone(),
            self.generic_params.iter().cloned().map(Ty::param).collect(),
        )
    }

    pub fn as_class(&self) -> Option<&ClassDecl> {
        match &self.kind {
            NominalKind::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn is_class(&self) -> bool {
        self.as_class().is_some()
    }

    pub fn enum_cases(&self) -> Option<&[EnumCase]> {
        match &self.kind {
            NominalKind::Enum(cases) => Some(cases),
            _ => None,
        }
    }

    pub fn is_actor(&self) -> bool {
        self.as_class()
            .is_some_and(|class| class.actor != ActorKind::None)
    }

    pub fn is_distributed_actor(&self) -> bool {
        self.as_class()
            .is_some_and(|class| class.actor == ActorKind::DistributedActor)
    }

    /// A default actor with no actor ancestor owns the runtime's actor state.
    pub fn is_root_default_actor(&self) -> bool {
        self.as_class().is_some_and(|class| {
            class.actor != ActorKind::None
                && class.default_actor
                && (class.superclass.is_none() || class.native_foreign_root_subclass)
        })
    }

    /// The declared destructor, or the implicit one. An `isolated` deinit of
    /// an actor without explicit isolation is bound to the actor instance.
    pub fn destructor(&self) -> DestructorDecl {
        let mut destructor = self.destructor.clone().unwrap_or_else(|| DestructorDecl {
            implicit: true,
            span: self.span,
            ..DestructorDecl::default()
        });
        if destructor.isolated
            && destructor.isolation == ActorIsolation::Unspecified
            && self.is_actor()
        {
            destructor.isolation = ActorIsolation::ActorInstance;
        }
        destructor
    }

    pub fn member(&self, name: &str) -> Option<&StoredMember> {
        self.stored_members.iter().find(|member| member.name == name)
    }
}

/// Every nominal type visible to lowering, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclTable {
    types: BTreeMap<Symbol, NominalDecl>,
}

impl DeclTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_decls(decls: impl IntoIterator<Item = NominalDecl>) -> Self {
        let mut table = Self::new();
        for decl in decls {
            table.insert(decl);
        }
        table
    }

    /// Parses a JSON array of [`NominalDecl`]s.
    pub fn from_json(source: &str) -> Result<Self> {
        let decls: Vec<NominalDecl> = match serde_json::from_str(source) {
            Ok(decls) => decls,
            Err(err) => bail!("invalid declaration file: {}", err),
        };
        Ok(Self::from_decls(decls))
    }

    pub fn insert(&mut self, decl: NominalDecl) {
        self.types.insert(decl.name.clone(), decl);
    }

    pub fn get(&self, name: &str) -> Option<&NominalDecl> {
        self.types.get(&Symbol::new(name))
    }

    pub fn lookup(&self, name: &Symbol) -> Result<&NominalDecl> {
        self.types
            .get(name)
            .ok_or_else(|| LoweringError::UnknownType(name.to_string()).into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &NominalDecl> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Resolves the superclass of `class`, returning its declaration and the
    /// superclass type as written in `class`'s context.
    pub fn superclass_of(&self, class: &NominalDecl) -> Result<Option<(&NominalDecl, Ty)>> {
        let Some(superclass_ty) = class.as_class().and_then(|c| c.superclass.clone()) else {
            return Ok(None);
        };
        let Some(name) = superclass_ty.nominal_name() else {
            return Err(LoweringError::UnknownType(superclass_ty.to_string()).into());
        };
        let decl = self.types.get(name).ok_or_else(|| {
            LoweringError::MissingSuperclassDestructor {
                class: class.name.to_string(),
                superclass: name.to_string(),
            }
        })?;
        Ok(Some((decl, superclass_ty)))
    }
}
