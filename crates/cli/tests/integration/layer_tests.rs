//! End-to-end tests for `layerpack publish` and `layerpack layers`.

use predicates::prelude::*;
use serial_test::serial;

use crate::common::TestEnv;

fn publish(env: &TestEnv) -> serde_json::Value {
  let output = env
    .layerpack_cmd()
    .arg("publish")
    .arg(env.output_path())
    .args(["--name", "prisma-layer", "--runtime", "nodejs16.x", "--output", "json"])
    .output()
    .unwrap();
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
  serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
#[serial]
fn publish_assigns_increasing_versions() {
  let env = TestEnv::with_source();
  env.bundle("linux-x64").assert().success();

  let first = publish(&env);
  let second = publish(&env);

  assert_eq!(first["version"], 1);
  assert_eq!(second["version"], 2);
  assert_eq!(first["identifier"], "layer:prisma-layer:1");
  assert_eq!(first["platform"], "linux-x64");
  assert_eq!(first["content_hash"], second["content_hash"]);
  assert_eq!(first["compatible_runtimes"][0], "nodejs16.x");

  let archive = env.store_path().join("layers/prisma-layer/1/layer.zip");
  assert!(archive.exists());
}

#[test]
#[serial]
fn publish_rejects_plain_directory() {
  let env = TestEnv::empty();
  env.write_file("plain/file.txt", "hello");

  env
    .layerpack_cmd()
    .arg("publish")
    .arg(env.temp.path().join("plain"))
    .args(["--name", "prisma-layer"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to publish"));
}

#[test]
#[serial]
fn publish_rejects_modified_artifact() {
  let env = TestEnv::with_source();
  env.bundle("linux-x64").assert().success();
  std::fs::write(env.output_path().join("client.js"), "tampered").unwrap();

  env
    .layerpack_cmd()
    .arg("publish")
    .arg(env.output_path())
    .args(["--name", "prisma-layer"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("changed after bundling"));
}

#[test]
#[serial]
fn publish_rejects_invalid_name() {
  let env = TestEnv::with_source();
  env.bundle("linux-x64").assert().success();

  env
    .layerpack_cmd()
    .arg("publish")
    .arg(env.output_path())
    .args(["--name", "prisma layer!"])
    .assert()
    .failure();
}

#[test]
#[serial]
fn layers_lists_published_versions() {
  let env = TestEnv::with_source();
  env.bundle("linux-x64").assert().success();
  publish(&env);
  publish(&env);

  env
    .layerpack_cmd()
    .arg("layers")
    .assert()
    .success()
    .stdout(predicate::str::contains("prisma-layer"))
    .stdout(predicate::str::contains("2 version(s), latest layer:prisma-layer:2"));

  env
    .layerpack_cmd()
    .args(["layers", "prisma-layer"])
    .assert()
    .success()
    .stdout(predicate::str::contains("layer:prisma-layer:1"))
    .stdout(predicate::str::contains("layer:prisma-layer:2"));
}

#[test]
#[serial]
fn layers_unknown_name_has_no_versions() {
  let env = TestEnv::empty();

  env
    .layerpack_cmd()
    .args(["layers", "missing"])
    .assert()
    .success()
    .stdout(predicate::str::contains("No versions of 'missing' published"));
}
