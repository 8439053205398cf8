use fp_core::error::Result;

pub mod deinit_to_mir;

pub use deinit_to_mir::*;

/// A pass from one IR (or declaration layer) to another.
pub trait IrTransform<Source, Target> {
    fn transform(&mut self, source: Source) -> Result<Target>;
}
