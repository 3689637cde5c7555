use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};

use crate::constants::{DEFAULT_CONFIG_FILES, ENV_CONFIG_JSON, ENV_CONFIG_PATH};
use crate::models::ViewerConfig;
use crate::validation::ConfigWarnings;

/// Source that produced the viewer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// A loaded configuration together with where it came from and any
/// guard-rail warnings it tripped.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: ViewerConfig,
    pub source: ConfigSource,
    pub warnings: ConfigWarnings,
}

impl ConfigLoad {
    fn new(config: ViewerConfig, source: ConfigSource) -> Self {
        let warnings = config.validate();
        for warning in warnings.iter() {
            log::warn!("viewer config ({source:?}): {warning}");
        }
        Self {
            config,
            source,
            warnings,
        }
    }
}

impl ViewerConfig {
    /// Load configuration using environment variables.
    /// Evaluation order:
    /// 1) `$LIGHTBOX_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$LIGHTBOX_CONFIG_JSON` (inline JSON),
    /// 3) a default file in the working directory,
    /// 4) defaults if none of the above exist.
    pub fn load_from_env() -> anyhow::Result<ConfigLoad> {
        let cwd = env::current_dir()
            .context("failed to resolve working directory")?;
        Self::load_with(|name| env::var(name).ok(), &cwd)
    }

    /// Same as [`ViewerConfig::load_from_env`] with an injectable variable
    /// lookup and search root.
    pub fn load_with(
        lookup: impl Fn(&str) -> Option<String>,
        search_root: &Path,
    ) -> anyhow::Result<ConfigLoad> {
        if let Some(path_str) = lookup(ENV_CONFIG_PATH)
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str.trim());
            let config = Self::load_from_file(&path)?;
            return Ok(ConfigLoad::new(config, ConfigSource::EnvPath(path)));
        }

        if let Some(raw) = lookup(ENV_CONFIG_JSON)
            && !raw.trim().is_empty()
        {
            let parsed = Self::parse_json(&raw)
                .with_context(|| format!("failed to parse {ENV_CONFIG_JSON}"))?;
            return Ok(ConfigLoad::new(parsed, ConfigSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file(search_root) {
            let config = Self::load_from_file(&path)?;
            return Ok(ConfigLoad::new(config, ConfigSource::File(path)));
        }

        Ok(ConfigLoad::new(Self::default(), ConfigSource::Default))
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| {
            format!("failed to read viewer config from {}", path.display())
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents).with_context(|| {
                format!("invalid viewer config {}", path.display())
            }),
            Some("toml") => toml::from_str(&contents).map_err(|err| {
                anyhow!("invalid viewer config {}: {}", path.display(), err)
            }),
            _ => Self::parse_from_str(&contents, &path.display().to_string()),
        }
    }

    pub fn parse_from_str(
        contents: &str,
        origin: &str,
    ) -> anyhow::Result<Self> {
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                anyhow!(
                    "failed to parse viewer config {}: toml error: {}; json error: {}",
                    origin,
                    toml_err,
                    json_err
                )
            })
        })
    }

    pub fn parse_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| anyhow!("invalid viewer config json: {err}"))
    }

    fn find_default_file(root: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| root.join(candidate))
            .find(|path| path.is_file())
    }
}
