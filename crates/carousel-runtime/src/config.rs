//! TOML config file: engine settings, indexer endpoints and HTTP options.
//!
//! ```toml
//! [engine]
//! tier = "production"
//!
//! [sources.ahk]
//! endpoint = "https://indexer.example/ahk/graphql"
//!
//! [http]
//! timeout_ms = 10000
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use carousel_core::types::SourceId;
use carousel_gateway::config::{EngineConfig, Tier};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub engine: EngineConfig,
    /// Keyed by source id (`ahk`, `ksm`, ...).
    pub sources: BTreeMap<String, SourceEndpoint>,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceEndpoint {
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl FileConfig {
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| anyhow::anyhow!("invalid config: {e}"))?;
        config.endpoints()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config {}: {e}", path.display()))?;
        Self::parse(&content).map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))
    }

    /// Load `path` when given, apply the tier override and validate.
    pub fn resolve(path: Option<&Path>, tier: Option<Tier>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(tier) = tier {
            config.engine.tier = tier;
        }
        config.engine.validate()?;
        if config.http.timeout_ms == 0 {
            anyhow::bail!("http.timeout_ms must be positive");
        }
        Ok(config)
    }

    pub fn endpoints(&self) -> anyhow::Result<HashMap<SourceId, String>> {
        self.sources
            .iter()
            .map(|(key, s)| {
                let source: SourceId = key
                    .parse()
                    .map_err(|e| anyhow::anyhow!("invalid config: [sources.{key}]: {e}"))?;
                Ok((source, s.endpoint.clone()))
            })
            .collect()
    }
}
