//! Deployment descriptor: the typed configuration of a deployment.
//!
//! Declares the network, security group, database cluster, the layer built
//! by `bundle`, the function using it, and the function's public URL. The
//! descriptor is validated here and handed to an external provisioning
//! engine; nothing in this crate creates cloud resources.
//!
//! The function's `architecture` decides the bundler's target platform (see
//! [`FunctionSpec::target_platform`]).

mod outputs;
mod types;
mod validate;

use std::path::Path;

use tracing::debug;

pub use types::*;
pub use validate::has_errors;

impl DeploymentDescriptor {
  pub fn parse(content: &str, path: &Path) -> Result<Self, DescriptorError> {
    toml::from_str(content).map_err(|source| DescriptorError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn load(path: &Path) -> Result<Self, DescriptorError> {
    let content = std::fs::read_to_string(path).map_err(|source| DescriptorError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let descriptor = Self::parse(&content, path)?;
    debug!(path = %path.display(), function = %descriptor.function.name, "loaded deployment descriptor");
    Ok(descriptor)
  }
}
