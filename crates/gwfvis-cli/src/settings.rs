//! Configuration: an optional TOML file layered under `GWFVIS_*`
//! environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CliConfig {
  /// Directory relative store paths are resolved against.
  pub store_dir:    PathBuf,
  /// Name given to derived variables when `--name` is omitted.
  pub derived_name: String,
}

impl Default for CliConfig {
  fn default() -> Self {
    Self {
      store_dir:    PathBuf::from("."),
      derived_name: "new".to_owned(),
    }
  }
}

impl CliConfig {
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("GWFVIS"))
      .build()?
      .try_deserialize()
  }

  pub fn resolve(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.store_dir.join(path)
    }
  }
}
