use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ManifestError;

/// The declared dependencies of the layer (`package.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyManifest {
  #[serde(default)]
  pub name: Option<String>,

  #[serde(default)]
  pub version: Option<String>,

  /// Package name to version constraint.
  #[serde(default)]
  pub dependencies: BTreeMap<String, String>,

  #[serde(default)]
  pub dev_dependencies: BTreeMap<String, String>,
}

impl DependencyManifest {
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn parses_package_json() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("package.json");
    std::fs::write(
      &path,
      r#"{
        "name": "prisma-layer",
        "version": "1.0.0",
        "dependencies": { "@prisma/client": "^4.8.0" },
        "devDependencies": { "prisma": "^4.8.0" },
        "scripts": { "build": "tsc" }
      }"#,
    )
    .unwrap();

    let manifest = DependencyManifest::load(&path).unwrap();
    assert_eq!(manifest.name.as_deref(), Some("prisma-layer"));
    assert_eq!(manifest.dependencies["@prisma/client"], "^4.8.0");
    assert_eq!(manifest.dev_dependencies["prisma"], "^4.8.0");
    assert_eq!(manifest.dependencies.len(), 1);
  }

  #[test]
  fn missing_sections_default_to_empty() {
    let manifest: DependencyManifest = serde_json::from_str("{}").unwrap();
    assert!(manifest.dependencies.is_empty());
    assert!(manifest.name.is_none());
  }

  #[test]
  fn invalid_json_is_a_parse_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("package.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(DependencyManifest::load(&path), Err(ManifestError::Parse { .. })));
  }
}
