//! Ownership-aware control-flow IR.
//!
//! Every value carries a lowered type and, for objects, an ownership tag.
//! Blocks are created up front as placeholders by [`builder::FunctionBuilder`]
//! and must each be terminated exactly once before a [`Body`] exists.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use derive_more::Display as DeriveDisplay;
use serde::{Deserialize, Serialize};

use crate::decl::SubstitutionMap;
use crate::span::{Location, Span};

pub mod builder;
pub mod ident;
pub mod pretty;
pub mod ty;

pub use builder::{Cleanup, FunctionBuilder};
pub use ident::Symbol;
pub use ty::{FnSig, LoweredTy, ParamConvention, Ty, TyKind, ValueCategory};

pub type BasicBlockId = u32;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, DeriveDisplay,
)]
#[display("%{_0}")]
pub struct ValueId(pub u32);

/// Reference-count obligation attached to an object value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ownership {
    /// The holder must eventually consume or destroy the value.
    Owned,
    /// Valid for a bounded region; no release obligation.
    Guaranteed,
    /// No reference-count obligation at all.
    Unowned,
}

impl Display for Ownership {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Ownership::Owned => write!(f, "@owned"),
            Ownership::Guaranteed => write!(f, "@guaranteed"),
            Ownership::Unowned => write!(f, "@unowned"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDecl {
    pub ty: LoweredTy,
    /// `None` for addresses and trivial values.
    pub ownership: Option<Ownership>,
}

/// An object value together with the ownership it is held at.
///
/// Handles are only produced by the builder; changing the tag goes through
/// [`FunctionBuilder::convert_ownership`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueHandle {
    pub value: ValueId,
    pub ownership: Ownership,
}

impl ValueHandle {
    pub(crate) fn new(value: ValueId, ownership: Ownership) -> Self {
        Self { value, ownership }
    }

    /// Wraps a value that is already held at `ownership` without emitting anything.
    pub fn assume(value: ValueId, ownership: Ownership) -> Self {
        Self { value, ownership }
    }

    pub fn is_owned(&self) -> bool {
        self.ownership == Ownership::Owned
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeclRefKind {
    Destroyer,
    Deallocator,
    IsolatedDeallocator,
    IVarDestroyer,
}

/// Names one lowered entry point of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclRef {
    pub owner: Symbol,
    pub kind: DeclRefKind,
    /// Entry point reached through the foreign object runtime.
    pub foreign: bool,
}

impl DeclRef {
    pub fn new(owner: impl Into<Symbol>, kind: DeclRefKind) -> Self {
        Self {
            owner: owner.into(),
            kind,
            foreign: false,
        }
    }

    pub fn as_foreign(mut self) -> Self {
        self.foreign = true;
        self
    }
}

impl Display for DeclRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DeclRefKind::Destroyer => "destroyer",
            DeclRefKind::Deallocator => "deallocator",
            DeclRefKind::IsolatedDeallocator => "isolateddeallocator",
            DeclRefKind::IVarDestroyer => "ivardestroyer",
        };
        write!(f, "#{}.deinit!{}", self.owner, kind)?;
        if self.foreign {
            write!(f, ".foreign")?;
        }
        Ok(())
    }
}

/// Runtime entry points invoked with a fixed operand shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeFunction {
    /// Traps when an unavailable declaration is reached.
    UnavailableCodeReached,
    /// Traps unless the current executor is the expected one.
    PreconditionExpectedExecutor,
    /// `(self: __owned AnyObject, work, executor, flags: Word) -> ()`.
    DeinitOnExecutor,
    /// `actorSystem.resignID(self.id)`.
    DistributedResignId,
    /// Returns `Int1` true when the instance is a remote proxy.
    DistributedIsRemote,
}

impl RuntimeFunction {
    pub fn symbol(&self) -> &'static str {
        match self {
            RuntimeFunction::UnavailableCodeReached => "fp_rt_unavailable_code_reached",
            RuntimeFunction::PreconditionExpectedExecutor => "fp_rt_check_expected_executor",
            RuntimeFunction::DeinitOnExecutor => "fp_rt_deinit_on_executor",
            RuntimeFunction::DistributedResignId => "fp_rt_distributed_resign_id",
            RuntimeFunction::DistributedIsRemote => "fp_rt_distributed_is_remote",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinKind {
    DestroyDefaultActor,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Callee {
    Decl(DeclRef),
    Runtime(RuntimeFunction),
}

impl Display for Callee {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Decl(decl) => write!(f, "{}", decl),
            Callee::Runtime(runtime) => write!(f, "@{}", runtime.symbol()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    Read,
    Modify,
    Deinit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadQualifier {
    Take,
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreQualifier {
    Init,
    Assign,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub location: Location,
    pub result: Option<ValueId>,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementKind {
    FunctionRef {
        callee: Callee,
    },
    /// Dynamic lookup of a superclass method through the foreign runtime.
    SuperMethod {
        operand: ValueId,
        method: DeclRef,
    },
    Apply {
        callee: ValueId,
        substitutions: SubstitutionMap,
        args: Vec<ValueId>,
    },
    Builtin {
        builtin: BuiltinKind,
        args: Vec<ValueId>,
    },
    BeginBorrow {
        operand: ValueId,
    },
    EndBorrow {
        operand: ValueId,
    },
    LoadBorrow {
        address: ValueId,
    },
    Upcast {
        operand: ValueId,
    },
    UncheckedRefCast {
        operand: ValueId,
    },
    UncheckedOwnershipConversion {
        operand: ValueId,
        to: Ownership,
    },
    InitExistentialRef {
        operand: ValueId,
    },
    ConvertFunction {
        operand: ValueId,
    },
    IntegerLiteral {
        value: i128,
    },
    Tuple {
        elements: Vec<ValueId>,
    },
    RefElementAddr {
        operand: ValueId,
        field: Symbol,
    },
    StructElementAddr {
        operand: ValueId,
        field: Symbol,
    },
    BeginAccess {
        address: ValueId,
        kind: AccessKind,
        no_nested_conflict: bool,
    },
    EndAccess {
        access: ValueId,
    },
    DestroyAddr {
        address: ValueId,
    },
    DestroyValue {
        operand: ValueId,
    },
    Load {
        address: ValueId,
        qualifier: LoadQualifier,
    },
    Store {
        value: ValueId,
        dest: ValueId,
        qualifier: StoreQualifier,
    },
    OptionalNone,
    UncheckedEnumData {
        operand: ValueId,
        case: Symbol,
    },
    UncheckedTakeEnumDataAddr {
        address: ValueId,
        case: Symbol,
    },
    IsUnique {
        address: ValueId,
    },
    AllocStack,
    DeallocStack {
        address: ValueId,
    },
    DeallocRef {
        operand: ValueId,
    },
    /// Ends a lifetime without releasing; balances ownership for verification.
    EndLifetime {
        operand: ValueId,
    },
    ExtractExecutor {
        actor: ValueId,
    },
    GlobalActorInstance {
        actor: Ty,
    },
    /// Suppresses the user-defined deinit so members can be torn down one by one.
    DropDeinit {
        operand: ValueId,
    },
    /// The user-written deinit body, lowered elsewhere.
    UserBody {
        body: Symbol,
    },
    ProfilerIncrement {
        counter: Symbol,
    },
}

impl StatementKind {
    pub fn operands(&self) -> Vec<ValueId> {
        use StatementKind::*;
        match self {
            FunctionRef { .. }
            | IntegerLiteral { .. }
            | OptionalNone
            | AllocStack
            | GlobalActorInstance { .. }
            | UserBody { .. }
            | ProfilerIncrement { .. } => Vec::new(),
            SuperMethod { operand, .. }
            | BeginBorrow { operand }
            | EndBorrow { operand }
            | Upcast { operand }
            | UncheckedRefCast { operand }
            | UncheckedOwnershipConversion { operand, .. }
            | InitExistentialRef { operand }
            | ConvertFunction { operand }
            | RefElementAddr { operand, .. }
            | StructElementAddr { operand, .. }
            | DestroyValue { operand }
            | UncheckedEnumData { operand, .. }
            | DeallocRef { operand }
            | EndLifetime { operand }
            | DropDeinit { operand } => vec![*operand],
            LoadBorrow { address }
            | BeginAccess { address, .. }
            | DestroyAddr { address }
            | Load { address, .. }
            | UncheckedTakeEnumDataAddr { address, .. }
            | IsUnique { address }
            | DeallocStack { address } => vec![*address],
            EndAccess { access } => vec![*access],
            ExtractExecutor { actor } => vec![*actor],
            Store { value, dest, .. } => vec![*value, *dest],
            Apply { callee, args, .. } => std::iter::once(*callee).chain(args.iter().copied()).collect(),
            Builtin { args, .. } => args.clone(),
            Tuple { elements } => elements.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub case: Symbol,
    pub target: BasicBlockId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terminator {
    pub location: Location,
    pub kind: TerminatorKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TerminatorKind {
    Branch {
        target: BasicBlockId,
    },
    CondBranch {
        cond: ValueId,
        then_target: BasicBlockId,
        else_target: BasicBlockId,
    },
    /// Multi-way branch on an enum discriminant, object or address.
    SwitchEnum {
        operand: ValueId,
        cases: Vec<SwitchCase>,
    },
    Return {
        value: ValueId,
    },
    Unreachable,
}

impl TerminatorKind {
    pub fn successors(&self) -> Vec<BasicBlockId> {
        match self {
            TerminatorKind::Branch { target } => vec![*target],
            TerminatorKind::CondBranch {
                then_target,
                else_target,
                ..
            } => vec![*then_target, *else_target],
            TerminatorKind::SwitchEnum { cases, .. } => cases.iter().map(|c| c.target).collect(),
            TerminatorKind::Return { .. } | TerminatorKind::Unreachable => Vec::new(),
        }
    }

    pub(crate) fn successors_mut(&mut self) -> Vec<&mut BasicBlockId> {
        match self {
            TerminatorKind::Branch { target } => vec![target],
            TerminatorKind::CondBranch {
                then_target,
                else_target,
                ..
            } => vec![then_target, else_target],
            TerminatorKind::SwitchEnum { cases, .. } => {
                cases.iter_mut().map(|c| &mut c.target).collect()
            }
            TerminatorKind::Return { .. } | TerminatorKind::Unreachable => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlockData {
    pub label: Option<String>,
    pub statements: Vec<Statement>,
    pub terminator: Option<Terminator>,
}

impl BasicBlockData {
    pub fn new(label: Option<String>) -> Self {
        Self {
            label,
            statements: Vec::new(),
            terminator: None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub name: Symbol,
    pub params: Vec<ValueId>,
    pub values: Vec<ValueDecl>,
    pub basic_blocks: Vec<BasicBlockData>,
    pub return_ty: Ty,
    pub span: Span,
}

impl Body {
    pub fn value(&self, id: ValueId) -> &ValueDecl {
        &self.values[id.0 as usize]
    }

    pub fn block(&self, id: BasicBlockId) -> &BasicBlockData {
        &self.basic_blocks[id as usize]
    }

    pub fn successors(&self, id: BasicBlockId) -> Vec<BasicBlockId> {
        self.block(id)
            .terminator
            .as_ref()
            .map(|term| term.kind.successors())
            .unwrap_or_default()
    }

    /// Predecessor lists indexed by block id; duplicate edges are kept.
    pub fn predecessors(&self) -> Vec<Vec<BasicBlockId>> {
        let mut preds = vec![Vec::new(); self.basic_blocks.len()];
        for (idx, _) in self.basic_blocks.iter().enumerate() {
            for succ in self.successors(idx as BasicBlockId) {
                preds[succ as usize].push(idx as BasicBlockId);
            }
        }
        preds
    }

    pub fn statements(&self) -> impl Iterator<Item = (BasicBlockId, &Statement)> {
        self.basic_blocks
            .iter()
            .enumerate()
            .flat_map(|(idx, block)| block.statements.iter().map(move |s| (idx as BasicBlockId, s)))
    }

    pub fn defining_statement(&self, id: ValueId) -> Option<&Statement> {
        self.statements()
            .map(|(_, stmt)| stmt)
            .find(|stmt| stmt.result == Some(id))
    }

    pub fn edge_count(&self) -> usize {
        (0..self.basic_blocks.len())
            .map(|idx| self.successors(idx as BasicBlockId).len())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub decl_ref: DeclRef,
    pub sig: FnSig,
    pub body: Body,
}

/// The lowered destructor entry points of one or more types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub functions: BTreeMap<DeclRef, Function>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, function: Function) {
        self.functions.insert(function.decl_ref.clone(), function);
    }

    pub fn get(&self, decl_ref: &DeclRef) -> Option<&Function> {
        self.functions.get(decl_ref)
    }

    pub fn extend(&mut self, other: Module) {
        self.functions.extend(other.functions);
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
