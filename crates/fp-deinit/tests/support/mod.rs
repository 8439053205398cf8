//! Shared fixtures for fp-deinit contract tests.

#![allow(dead_code)]

pub mod decls;
pub mod walk;
