use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use super::Symbol;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ty {
    pub kind: TyKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TyKind {
    /// `()` and other tuples.
    Tuple(Vec<Ty>),
    /// A value with no ownership semantics (integers, flags).
    Trivial(Symbol),
    /// Pointer-sized builtin integer.
    Word,
    /// Builtin one-bit integer produced by checks.
    Int1,
    /// A class, struct or enum, possibly generic.
    Nominal { name: Symbol, args: Vec<Ty> },
    Optional(Box<Ty>),
    /// Unsubstituted generic parameter.
    Param(Symbol),
    /// Untyped reference-counted object pointer.
    NativeObject,
    /// Type-erased class existential.
    AnyObject,
    /// Reference to the executor an actor runs on.
    Executor,
    Function(Box<FnSig>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FnSig {
    pub params: Vec<(Ty, ParamConvention)>,
    pub result: Ty,
    pub thin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamConvention {
    Owned,
    Guaranteed,
    Unowned,
}

impl Ty {
    pub fn unit() -> Self {
        Ty {
            kind: TyKind::Tuple(Vec::new()),
        }
    }

    pub fn word() -> Self {
        Ty { kind: TyKind::Word }
    }

    pub fn int1() -> Self {
        Ty { kind: TyKind::Int1 }
    }

    pub fn native_object() -> Self {
        Ty {
            kind: TyKind::NativeObject,
        }
    }

    pub fn any_object() -> Self {
        Ty {
            kind: TyKind::AnyObject,
        }
    }

    pub fn executor() -> Self {
        Ty {
            kind: TyKind::Executor,
        }
    }

    pub fn trivial(name: impl Into<Symbol>) -> Self {
        Ty {
            kind: TyKind::Trivial(name.into()),
        }
    }

    pub fn nominal(name: impl Into<Symbol>, args: Vec<Ty>) -> Self {
        Ty {
            kind: TyKind::Nominal {
                name: name.into(),
                args,
            },
        }
    }

    pub fn param(name: impl Into<Symbol>) -> Self {
        Ty {
            kind: TyKind::Param(name.into()),
        }
    }

    pub fn optional(inner: Ty) -> Self {
        Ty {
            kind: TyKind::Optional(Box::new(inner)),
        }
    }

    pub fn function(sig: FnSig) -> Self {
        Ty {
            kind: TyKind::Function(Box::new(sig)),
        }
    }

    pub fn optional_object(&self) -> Option<&Ty> {
        match &self.kind {
            TyKind::Optional(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn nominal_name(&self) -> Option<&Symbol> {
        match &self.kind {
            TyKind::Nominal { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn nominal_args(&self) -> &[Ty] {
        match &self.kind {
            TyKind::Nominal { args, .. } => args,
            _ => &[],
        }
    }

    /// True when no generic parameter occurs anywhere inside the type.
    pub fn is_concrete(&self) -> bool {
        match &self.kind {
            TyKind::Param(_) => false,
            TyKind::Tuple(elems) => elems.iter().all(Ty::is_concrete),
            TyKind::Nominal { args, .. } => args.iter().all(Ty::is_concrete),
            TyKind::Optional(inner) => inner.is_concrete(),
            TyKind::Function(sig) => {
                sig.result.is_concrete() && sig.params.iter().all(|(ty, _)| ty.is_concrete())
            }
            TyKind::Trivial(_)
            | TyKind::Word
            | TyKind::Int1
            | TyKind::NativeObject
            | TyKind::AnyObject
            | TyKind::Executor => true,
        }
    }

    /// Values of this type carry no reference-count obligation.
    pub fn is_trivial(&self) -> bool {
        match &self.kind {
            TyKind::Tuple(elems) => elems.iter().all(Ty::is_trivial),
            TyKind::Trivial(_) | TyKind::Word | TyKind::Int1 | TyKind::Executor => true,
            TyKind::Function(sig) => sig.thin,
            _ => false,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(&self.kind, TyKind::Tuple(elems) if elems.is_empty())
    }
}

impl Display for Ty {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TyKind::Tuple(elems) => write!(f, "({})", elems.iter().join(", ")),
            TyKind::Trivial(name) => write!(f, "{}", name),
            TyKind::Word => write!(f, "Builtin.Word"),
            TyKind::Int1 => write!(f, "Builtin.Int1"),
            TyKind::Nominal { name, args } if args.is_empty() => write!(f, "{}", name),
            TyKind::Nominal { name, args } => write!(f, "{}<{}>", name, args.iter().join(", ")),
            TyKind::Optional(inner) => write!(f, "Optional<{}>", inner),
            TyKind::Param(name) => write!(f, "{}", name),
            TyKind::NativeObject => write!(f, "Builtin.NativeObject"),
            TyKind::AnyObject => write!(f, "AnyObject"),
            TyKind::Executor => write!(f, "Builtin.Executor"),
            TyKind::Function(sig) => {
                let params = sig
                    .params
                    .iter()
                    .map(|(ty, conv)| match conv {
                        ParamConvention::Owned => format!("__owned {}", ty),
                        ParamConvention::Guaranteed => format!("__guaranteed {}", ty),
                        ParamConvention::Unowned => format!("__unowned {}", ty),
                    })
                    .join(", ");
                let thin = if sig.thin { "@thin " } else { "" };
                write!(f, "{}({}) -> {}", thin, params, sig.result)
            }
        }
    }
}

/// Whether a value is the object itself or the address of storage holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueCategory {
    Object,
    Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoweredTy {
    pub ty: Ty,
    pub category: ValueCategory,
}

impl LoweredTy {
    pub fn object(ty: Ty) -> Self {
        Self {
            ty,
            category: ValueCategory::Object,
        }
    }

    pub fn address(ty: Ty) -> Self {
        Self {
            ty,
            category: ValueCategory::Address,
        }
    }

    pub fn is_object(&self) -> bool {
        self.category == ValueCategory::Object
    }

    pub fn is_address(&self) -> bool {
        self.category == ValueCategory::Address
    }

    pub fn address_type(&self) -> Self {
        Self::address(self.ty.clone())
    }

    pub fn object_type(&self) -> Self {
        Self::object(self.ty.clone())
    }
}

impl Display for LoweredTy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.category {
            ValueCategory::Object => write!(f, "${}", self.ty),
            ValueCategory::Address => write!(f, "$*{}", self.ty),
        }
    }
}
