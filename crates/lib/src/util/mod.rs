//! Shared utilities.
//!
//! Directory hashing and sizing, plus test fixtures.

pub mod hash;

#[cfg(test)]
pub mod testutil;
