use crate::assembly::{
    AssemblyCatalog, CatalogError, CatalogId, CatalogSet, DEFAULT_ASSET_TIMEOUT, ReadinessGate,
};
use crate::assets::ModelStyle;
use crate::vr::SessionOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read runtime config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid runtime config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("initial catalog {0} is not among the configured catalogs")]
    UnknownInitialCatalog(CatalogId),
    #[error("asset timeout must be greater than zero")]
    ZeroAssetTimeout,
}

/// Host-provided runtime settings. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub session: SessionOptions,
    pub asset_timeout_ms: u64,
    pub model_style: ModelStyle,
    pub readiness_gate: ReadinessGate,
    pub initial_catalog: Option<CatalogId>,
    /// Inline catalogs; take precedence over `catalog_manifest`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalogs: Option<Vec<AssemblyCatalog>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_manifest: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            session: SessionOptions::default(),
            asset_timeout_ms: DEFAULT_ASSET_TIMEOUT.as_millis() as u64,
            model_style: ModelStyle::default(),
            readiness_gate: ReadinessGate::default(),
            initial_catalog: None,
            catalogs: None,
            catalog_manifest: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let mut config = Self::from_json(&json)?;
        // manifest paths are relative to the config file
        if let (Some(manifest), Some(dir)) = (config.catalog_manifest.as_mut(), path.parent()) {
            if manifest.is_relative() {
                *manifest = dir.join(&*manifest);
            }
        }
        Ok(config)
    }

    pub fn asset_timeout(&self) -> Duration {
        Duration::from_millis(self.asset_timeout_ms)
    }

    /// Resolves the catalogs this config describes and checks the initial
    /// catalog against them.
    pub fn catalog_set(&self) -> Result<CatalogSet, ConfigError> {
        if self.asset_timeout_ms == 0 {
            return Err(ConfigError::ZeroAssetTimeout);
        }

        let set = match (&self.catalogs, &self.catalog_manifest) {
            (Some(inline), _) => CatalogSet::new(inline.clone())?,
            (None, Some(path)) => CatalogSet::load(path)?,
            (None, None) => CatalogSet::builtin(),
        };

        if let Some(initial) = &self.initial_catalog {
            if !set.contains(initial) {
                return Err(ConfigError::UnknownInitialCatalog(initial.clone()));
            }
        }
        Ok(set)
    }
}
