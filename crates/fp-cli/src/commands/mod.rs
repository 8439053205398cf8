//! Command implementations for the fp-deinit CLI

pub mod lower;

pub use lower::lower_command;
