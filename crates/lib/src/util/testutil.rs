//! Test fixtures for layerpack-lib.
//!
//! [`SourceFixture`] lays out a source directory shaped like an installed
//! Prisma project: manifest, lockfile, client entry, schema, and a
//! `node_modules` tree carrying engines for three platforms.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::bundle::BundleOptions;
use crate::config::BundleConfig;

pub const MANIFEST: &str = r#"{
  "name": "prisma-layer",
  "version": "1.0.0",
  "dependencies": {
    "@prisma/client": "^4.8.0",
    "is-windows": "^1.0.2"
  },
  "devDependencies": {
    "prisma": "^4.8.0"
  }
}"#;

pub const LOCKFILE: &str = r#"{
  "name": "prisma-layer",
  "lockfileVersion": 3,
  "requires": true,
  "packages": {
    "": { "name": "prisma-layer", "version": "1.0.0" },
    "node_modules/@prisma/client": { "version": "4.8.0" },
    "node_modules/@prisma/engines": { "version": "4.8.0" },
    "node_modules/prisma": { "version": "4.8.0", "dev": true },
    "node_modules/is-windows": { "version": "1.0.2" },
    "node_modules/@esbuild/darwin-arm64": { "version": "0.17.0", "os": ["darwin"], "cpu": ["arm64"], "optional": true },
    "node_modules/@esbuild/linux-x64": { "version": "0.17.0", "os": ["linux"], "cpu": ["x64"], "optional": true },
    "node_modules/@esbuild/win32-x64": { "version": "0.17.0", "os": ["win32"], "cpu": ["x64"], "optional": true }
  }
}"#;

/// Engine files shipped per platform, relative to an engines-bearing package.
pub const LINUX_ENGINE: &str = "libquery_engine-debian-openssl-3.0.x.so.node";
pub const DARWIN_ENGINE: &str = "libquery_engine-darwin-arm64.dylib.node";
pub const WINDOWS_ENGINE: &str = "query_engine-windows.dll.node";

/// Packages that carry a copy of every engine.
pub const ENGINE_PACKAGES: &[&str] = &["node_modules/@prisma/engines", "node_modules/prisma", "node_modules/.prisma/client"];

pub struct SourceFixture {
  pub temp: TempDir,
  pub source: PathBuf,
  pub output: PathBuf,
}

impl SourceFixture {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let output = temp.path().join("dist").join("layer");

    let fixture = Self { temp, source, output };
    fixture.write("package.json", MANIFEST);
    fixture.write("package-lock.json", LOCKFILE);
    fixture.write("client.js", "module.exports = require('@prisma/client');\n");
    fixture.write("prisma/schema.prisma", "generator client {\n  provider = \"prisma-client-js\"\n}\n");

    fixture.write("node_modules/@prisma/client/index.js", "module.exports = require('.prisma/client');\n");
    fixture.write("node_modules/@prisma/client/package.json", r#"{ "name": "@prisma/client" }"#);
    for package in ENGINE_PACKAGES {
      for engine in [LINUX_ENGINE, DARWIN_ENGINE, WINDOWS_ENGINE] {
        fixture.write(&format!("{}/{}", package, engine), engine);
      }
    }
    fixture.write("node_modules/.prisma/client/index.js", "// generated client\n");
    fixture.write("node_modules/@prisma/engines/node_modules/@prisma/engines-version/index.js", "");
    fixture.write("node_modules/.cache/prisma/4.8.0/master/checksum", "deadbeef");
    fixture.write("node_modules/is-windows/index.js", "module.exports = () => process.platform === 'win32';\n");
    fixture.write("node_modules/@esbuild/darwin-arm64/bin/esbuild", "darwin");
    fixture.write("node_modules/@esbuild/linux-x64/bin/esbuild", "linux");
    fixture.write("node_modules/@esbuild/win32-x64/esbuild.exe", "windows");
    fixture.write("node_modules/prisma/build/index.js", "#!/usr/bin/env node\n");

    #[cfg(unix)]
    {
      fs::create_dir_all(fixture.source.join("node_modules/.bin")).unwrap();
      std::os::unix::fs::symlink("../prisma/build/index.js", fixture.source.join("node_modules/.bin/prisma")).unwrap();
    }

    fixture
  }

  pub fn write(&self, rel: &str, content: &str) {
    let path = self.source.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  }

  /// Options writing to the fixture's output, with generation disabled.
  pub fn options(&self) -> BundleOptions {
    self.options_with(BundleConfig {
      generate: String::new(),
      ..Default::default()
    })
  }

  pub fn options_with(&self, config: BundleConfig) -> BundleOptions {
    BundleOptions::new(config, &self.output)
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }
}

/// Every file path under `dir`, relative and `/`-separated, sorted.
pub fn list_files(dir: &Path) -> Vec<String> {
  let mut files: Vec<String> = walkdir::WalkDir::new(dir)
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| !e.file_type().is_dir())
    .map(|e| {
      e.path()
        .strip_prefix(dir)
        .unwrap()
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
    })
    .collect();
  files.sort();
  files
}
