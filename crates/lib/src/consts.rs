//! Names and limits shared across the crate.

pub const APP_NAME: &str = "layerpack";

/// Environment variable overriding the layer store root.
pub const STORE_ENV: &str = "LAYERPACK_STORE";

/// Environment variable exported to the client generation step.
pub const TARGET_PLATFORM_ENV: &str = "LAYERPACK_TARGET_PLATFORM";

/// Default configuration file looked up in the source directory.
pub const CONFIG_FILENAME: &str = "layerpack.toml";

/// Marker written into every artifact directory produced by `bundle`.
pub const BUNDLE_MARKER: &str = ".layerpack-bundle.json";

/// Unzipped size ceiling for a function layer (250 MiB).
pub const DEFAULT_SIZE_LIMIT_BYTES: u64 = 262_144_000;

/// January 1, 1980 00:00:00 UTC, the earliest timestamp a zip entry can carry.
pub const SOURCE_DATE_EPOCH: &str = "315532800";
