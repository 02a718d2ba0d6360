use super::{AssetScopeConfig, ConfigError, ConfigResult, MatchPolicy};
use figment::{
    providers::{Env, Format as _, Serialized, Toml},
    Figment,
};
use serde::Serialize;
use std::path::Path;

/// Name of the config file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "assetscope.toml";

/// Prefix for environment overrides, e.g. `ASSETSCOPE_COMPRESSION__CONCURRENCY=8`.
pub const ENV_PREFIX: &str = "ASSETSCOPE_";

/// Values given on the command line. Unset fields leave lower layers untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_policy: Option<MatchPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<bool>,
    pub compression: CompressionOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompressionOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

impl AssetScopeConfig {
    /// Load configuration from multiple sources.
    /// Priority: CLI args > environment variables > config file > defaults
    pub fn load(
        project_root: &Path,
        config_path: Option<&Path>,
        overrides: &CliOverrides,
    ) -> ConfigResult<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        let config_file = match config_path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::InvalidValue {
                    field: "config",
                    reason: format!("config file not found: {}", path.display()),
                });
            }
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default_path = project_root.join(CONFIG_FILE_NAME);
                default_path.exists().then_some(default_path)
            }
        };

        if let Some(path) = config_file {
            tracing::debug!("Loading config file {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        // The compression service's conventional variable, below our own prefix
        figment = figment.merge(
            Env::raw()
                .only(&["TINYPNG_API_KEY"])
                .map(|_| "compression.api_key".into()),
        );
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        figment = figment.merge(Serialized::defaults(overrides));

        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }
}
