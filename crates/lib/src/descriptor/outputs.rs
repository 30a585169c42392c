//! Deployment outputs read back from the provisioning engine.
//!
//! The engine writes a JSON file either flat (`{"VpcId": "..."}`) or keyed
//! by stack name (`{"PrismaStack": {"VpcId": "..."}}`). Output keys are
//! matched case-insensitively against a few known spellings.

use std::path::Path;

use serde_json::{Map, Value};

use super::types::{DeploymentOutputs, DescriptorError};

/// Accepted keys per output, compared after lowercasing and dropping
/// non-alphanumerics.
const NETWORK_ID: &[&str] = &["vpcid", "networkid"];
const SECURITY_GROUP_ID: &[&str] = &["securitygroupid"];
const DATABASE_HOSTNAME: &[&str] = &["clusterhostname", "databasehostname", "dbhostname"];
const LAYER_VERSION_ID: &[&str] = &["prismalayerversionarn", "layerversionarn", "layerversionid", "layerversion"];
const FUNCTION_ID: &[&str] = &["userfunctionarn", "functionarn", "functionid"];
const FUNCTION_URL: &[&str] = &["userfunctionurl", "functionurl", "url"];

impl DeploymentOutputs {
  pub fn load(path: &Path, stack: Option<&str>) -> Result<Self, DescriptorError> {
    let content = std::fs::read_to_string(path).map_err(|source| DescriptorError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| DescriptorError::ParseOutputs {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_value(&value, stack)
  }

  pub fn from_value(value: &Value, stack: Option<&str>) -> Result<Self, DescriptorError> {
    let empty = Map::new();
    let root = value.as_object().unwrap_or(&empty);
    let outputs = select_stack(root, stack)?;

    let find = |name: &'static str, keys: &[&str]| -> Result<String, DescriptorError> {
      outputs
        .iter()
        .find(|(key, _)| keys.contains(&normalize(key).as_str()))
        .and_then(|(_, v)| v.as_str())
        .map(String::from)
        .ok_or(DescriptorError::MissingOutput(name))
    };

    Ok(Self {
      network_id: find("network id", NETWORK_ID)?,
      security_group_id: find("security group id", SECURITY_GROUP_ID)?,
      database_hostname: find("database hostname", DATABASE_HOSTNAME)?,
      layer_version_id: find("layer version", LAYER_VERSION_ID)?,
      function_id: find("function id", FUNCTION_ID)?,
      function_url: find("function url", FUNCTION_URL)?,
    })
  }
}

fn select_stack<'a>(root: &'a Map<String, Value>, stack: Option<&str>) -> Result<&'a Map<String, Value>, DescriptorError> {
  if let Some(name) = stack {
    return root
      .get(name)
      .and_then(Value::as_object)
      .ok_or_else(|| DescriptorError::UnknownStack(name.to_string()));
  }

  let nested = !root.is_empty() && root.values().all(Value::is_object);
  if !nested {
    return Ok(root);
  }

  let mut stacks = root.iter();
  match (stacks.next(), stacks.next()) {
    (Some((_, only)), None) => Ok(only.as_object().unwrap_or(root)),
    _ => Err(DescriptorError::AmbiguousStack(
      root.keys().cloned().collect::<Vec<_>>().join(", "),
    )),
  }
}

fn normalize(key: &str) -> String {
  key
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .map(|c| c.to_ascii_lowercase())
    .collect()
}
