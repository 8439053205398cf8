//! Destructor lowering: turns a type's end-of-life semantics into explicit
//! MIR control flow.

pub mod error;
pub mod transformations;

pub use transformations::deinit_to_mir::{DeinitLowering, DestructorKind};
pub use transformations::IrTransform;
