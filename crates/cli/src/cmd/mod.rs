mod bundle;
mod check;
mod info;
mod layers;
mod outputs;
mod publish;

pub use bundle::{BundleArgs, cmd_bundle};
pub use check::cmd_check;
pub use info::cmd_info;
pub use layers::cmd_layers;
pub use outputs::cmd_outputs;
pub use publish::{PublishArgs, cmd_publish};
