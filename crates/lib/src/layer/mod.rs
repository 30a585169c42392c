//! Layer versions: immutable, numbered wrappers around bundled artifacts.
//!
//! Publishing an artifact directory zips it deterministically and records it
//! as the next version of a named layer. Versions are identified as
//! `layer:<name>:<version>` and are never changed after publishing.
//!
//! # Submodules
//!
//! - [`archive`] - Deterministic zip writer
//! - [`store`] - On-disk layer storage

pub mod archive;
pub mod store;
mod types;

pub use store::LayerStore;
pub use types::*;
