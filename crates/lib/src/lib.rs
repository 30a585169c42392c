//! layerpack-lib: dependency layer bundling for serverless functions
//!
//! This crate provides the pieces behind the `layerpack` CLI:
//! - `bundle`: turns an installed dependency tree into a pruned, single-platform artifact
//! - `layer`: publishes artifacts as immutable, numbered layer versions
//! - `descriptor`: the deployment configuration that consumes the layer
//! - `manifest`: the dependency manifest and lockfile the bundler reads
//! - `platform`: target platforms and the tags that tie binaries to them

pub mod bundle;
pub mod config;
pub mod consts;
pub mod descriptor;
pub mod layer;
pub mod lock;
pub mod manifest;
pub mod platform;
pub mod util;
