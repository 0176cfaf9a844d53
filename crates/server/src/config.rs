//! Configuration loading.

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::Path;
use tilestash_core::config::AppConfig;

/// Prefix of environment variables that override the config file.
pub const ENV_PREFIX: &str = "TILESTASH_";

/// Load the configuration from an optional TOML file merged with
/// `TILESTASH_*` environment variables (nested keys split on `__`), then
/// validate it.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        tracing::info!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(
            config_path = %path.display(),
            "No config file found, using defaults and environment"
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tilestash_core::MimeType;
    use tilestash_core::config::StorageConfig;

    #[test]
    fn loads_layers_and_blobstore_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
bind = "0.0.0.0:9000"

[storage]
type = "memory"
bucket = "tiles"

[blobstore]
prefix = "cache"
batch_size = 500

[[layers]]
name = "topp:states"
id = "states"
grid_sets = ["EPSG:4326", "EPSG:900913"]
formats = ["image/png", "image/jpeg"]
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert!(matches!(config.storage, StorageConfig::Memory { ref bucket } if bucket == "tiles"));
        assert_eq!(config.blobstore.prefix, "cache");
        assert_eq!(config.blobstore.batch_size, 500);
        assert_eq!(config.layers.len(), 1);
        assert_eq!(config.layers[0].layer_id(), "states");
        assert_eq!(config.layers[0].formats, vec![MimeType::Png, MimeType::Jpeg]);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.blobstore.batch_size, 1000);
        assert!(config.layers.is_empty());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[blobstore]\nbatch_size = 5000").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("batch_size"), "{err}");
    }
}
