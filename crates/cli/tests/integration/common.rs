//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

pub const LINUX_ENGINE: &str = "libquery_engine-debian-openssl-3.0.x.so.node";
pub const DARWIN_ENGINE: &str = "libquery_engine-darwin-arm64.dylib.node";

const MANIFEST: &str = r#"{
  "name": "prisma-layer",
  "version": "1.0.0",
  "dependencies": { "@prisma/client": "^4.8.0" }
}"#;

const LOCKFILE: &str = r#"{
  "name": "prisma-layer",
  "lockfileVersion": 3,
  "packages": {
    "": { "name": "prisma-layer", "version": "1.0.0" },
    "node_modules/@prisma/client": { "version": "4.8.0" },
    "node_modules/@prisma/engines": { "version": "4.8.0" }
  }
}"#;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding a source tree, an
/// output location and a layer store.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create an empty test environment.
  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Create an environment with an installed Prisma-like source tree under `src/`.
  ///
  /// `@prisma/engines` ships a Linux and a Darwin engine.
  pub fn with_source() -> Self {
    let env = Self::empty();
    env.write_file("src/package.json", MANIFEST);
    env.write_file("src/package-lock.json", LOCKFILE);
    env.write_file("src/client.js", "module.exports = require('@prisma/client');\n");
    env.write_file("src/prisma/schema.prisma", "datasource db {\n  provider = \"postgresql\"\n}\n");
    env.write_file("src/node_modules/@prisma/client/index.js", "module.exports = {};\n");
    env.write_file(&format!("src/node_modules/@prisma/engines/{}", LINUX_ENGINE), "linux");
    env.write_file(&format!("src/node_modules/@prisma/engines/{}", DARWIN_ENGINE), "darwin");
    env.write_file("src/node_modules/.cache/prisma/checksum", "deadbeef");
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Source directory.
  pub fn source_path(&self) -> PathBuf {
    self.temp.path().join("src")
  }

  /// Artifact output directory (not created).
  pub fn output_path(&self) -> PathBuf {
    let p = self.temp.path().to_path_buf();
    dunce::canonicalize(&p).unwrap_or(p).join("dist").join("layer")
  }

  /// Layer store path (isolated per test).
  pub fn store_path(&self) -> PathBuf {
    let p = self.temp.path().join("store");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Command for the layerpack binary with the store isolated to this environment.
  pub fn layerpack_cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("layerpack");
    cmd.env("LAYERPACK_STORE", self.store_path());
    cmd.env_remove("RUST_LOG");
    cmd
  }

  /// Bundle the source tree for `target` without client generation.
  pub fn bundle(&self, target: &str) -> Command {
    let mut cmd = self.layerpack_cmd();
    cmd
      .arg("bundle")
      .arg(self.source_path())
      .arg("--out")
      .arg(self.output_path())
      .args(["--target", target, "--skip-generate"]);
    cmd
  }
}
