//! End-to-end tests for `layerpack bundle`.

use predicates::prelude::*;
use serial_test::serial;

use crate::common::{DARWIN_ENGINE, LINUX_ENGINE, TestEnv, fixture_content};

#[test]
#[serial]
fn bundle_prunes_foreign_engines() {
  let env = TestEnv::with_source();

  env
    .bundle("linux-x64")
    .assert()
    .success()
    .stdout(predicate::str::contains("Bundled"))
    .stdout(predicate::str::contains("linux-x64"));

  let out = env.output_path();
  assert!(out.join("package.json").exists());
  assert!(out.join("package-lock.json").exists());
  assert!(out.join("client.js").exists());
  assert!(out.join("prisma/schema.prisma").exists());
  assert!(out.join("node_modules/@prisma/engines").join(LINUX_ENGINE).exists());
  assert!(!out.join("node_modules/@prisma/engines").join(DARWIN_ENGINE).exists());
  assert!(!out.join("node_modules/.cache").exists());
  assert!(out.join(".layerpack-bundle.json").exists());

  // The source tree is never modified.
  assert!(env.source_path().join("node_modules/@prisma/engines").join(DARWIN_ENGINE).exists());
  assert!(env.source_path().join("node_modules/.cache").exists());
}

#[test]
#[serial]
fn bundle_json_reports_removed_binaries() {
  let env = TestEnv::with_source();

  let output = env.bundle("darwin-arm64").arg("--output").arg("json").output().unwrap();
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["platform"], "darwin-arm64");
  assert_eq!(json["content_hash"].as_str().unwrap().len(), 64);
  let removed_paths = json["report"]["removed_paths"].as_array().unwrap();
  assert!(removed_paths.iter().any(|p| p == "node_modules/.cache"));

  let engines = json["report"]["packages"]
    .as_array()
    .unwrap()
    .iter()
    .find(|p| p["install_path"] == "node_modules/@prisma/engines")
    .unwrap();
  assert!(
    engines["removed"]
      .as_array()
      .unwrap()
      .iter()
      .any(|p| p.as_str().unwrap().ends_with(LINUX_ENGINE))
  );
  assert!(
    engines["kept"]
      .as_array()
      .unwrap()
      .iter()
      .any(|p| p.as_str().unwrap().ends_with(DARWIN_ENGINE))
  );
}

#[test]
#[serial]
fn bundle_twice_gives_same_hash() {
  let env = TestEnv::with_source();

  let hash = |env: &TestEnv| {
    let output = env.bundle("linux-x64").args(["--output", "json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    json["content_hash"].as_str().unwrap().to_string()
  };

  assert_eq!(hash(&env), hash(&env));
}

#[test]
#[serial]
fn bundle_without_target_binaries_fails() {
  let env = TestEnv::with_source();

  env
    .bundle("windows-x64")
    .assert()
    .failure()
    .stderr(predicate::str::contains("platform prune"))
    .stderr(predicate::str::contains("node_modules/@prisma/engines"));

  assert!(!env.output_path().exists());
}

#[test]
#[serial]
fn bundle_missing_client_file_fails_before_writing() {
  let env = TestEnv::with_source();
  std::fs::remove_file(env.source_path().join("client.js")).unwrap();

  env
    .bundle("linux-x64")
    .assert()
    .failure()
    .stderr(predicate::str::contains("preflight"))
    .stderr(predicate::str::contains("client.js"));

  assert!(!env.output_path().parent().unwrap().exists());
}

#[test]
#[serial]
fn bundle_uses_descriptor_source_and_architecture() {
  let env = TestEnv::with_source();
  let descriptor = fixture_content("deploy.toml").replace("src/layers/prisma", "src");
  env.write_file("deploy.toml", &descriptor);

  let output = env
    .layerpack_cmd()
    .arg("bundle")
    .arg("--descriptor")
    .arg(env.temp.path().join("deploy.toml"))
    .arg("--out")
    .arg(env.output_path())
    .args(["--skip-generate", "--output", "json"])
    .output()
    .unwrap();
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["platform"], "linux-x64");
}

#[test]
#[serial]
fn bundle_reads_config_from_source() {
  let env = TestEnv::with_source();
  env.write_file("src/layerpack.toml", "[bundle]\ntarget = \"darwin-arm64\"\n");

  env
    .layerpack_cmd()
    .arg("bundle")
    .arg(env.source_path())
    .arg("--out")
    .arg(env.output_path())
    .arg("--skip-generate")
    .assert()
    .success()
    .stdout(predicate::str::contains("darwin-arm64"));

  assert!(env.output_path().join("node_modules/@prisma/engines").join(DARWIN_ENGINE).exists());
}

#[cfg(unix)]
#[test]
#[serial]
fn bundle_runs_generate_in_artifact() {
  let env = TestEnv::with_source();
  env.write_file(
    "src/layerpack.toml",
    "[bundle]\ngenerate = \"echo $LAYERPACK_TARGET_PLATFORM > generated.txt\"\n",
  );

  env
    .layerpack_cmd()
    .arg("bundle")
    .arg(env.source_path())
    .arg("--out")
    .arg(env.output_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Client generated"));

  let generated = std::fs::read_to_string(env.output_path().join("generated.txt")).unwrap();
  assert_eq!(generated.trim(), "linux-x64");
}

#[cfg(unix)]
#[test]
#[serial]
fn bundle_reports_generate_failure() {
  let env = TestEnv::with_source();
  env.write_file(
    "src/layerpack.toml",
    "[bundle]\ngenerate = \"echo schema invalid >&2; exit 1\"\n",
  );

  env
    .layerpack_cmd()
    .arg("bundle")
    .arg(env.source_path())
    .arg("--out")
    .arg(env.output_path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("client generation"))
    .stderr(predicate::str::contains("schema invalid"));

  assert!(!env.output_path().exists());
}
