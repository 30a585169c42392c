use anyhow::Result;
use serde::Serialize;

use layerpack_lib::consts::CONFIG_FILENAME;
use layerpack_lib::platform::{Platform, paths};

use crate::output::{OutputFormat, print_json, print_stat};

#[derive(Serialize)]
struct Info {
  version: &'static str,
  platform: Option<Platform>,
  store: String,
  config_file: &'static str,
}

pub fn cmd_info(output: OutputFormat) -> Result<()> {
  let info = Info {
    version: env!("CARGO_PKG_VERSION"),
    platform: Platform::current(),
    store: paths::store_dir().display().to_string(),
    config_file: CONFIG_FILENAME,
  };

  if output.is_json() {
    return print_json(&info);
  }

  println!("layerpack {}", info.version);
  match info.platform {
    Some(platform) => print_stat("Platform", &platform.to_string()),
    None => print_stat("Platform", "unsupported"),
  }
  print_stat("Store", &info.store);
  print_stat("Config file", info.config_file);

  Ok(())
}
