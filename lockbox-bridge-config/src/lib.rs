// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! File-backed configuration shared by the lockbox bridge crates.

use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// Configuration documents that can be loaded from and saved to disk.
///
/// Files ending in `.yaml` / `.yml` are parsed as YAML, everything else as
/// JSON. Saving always writes pretty JSON unless the target path is YAML.
pub trait Config: Serialize + DeserializeOwned {
    fn persisted(self, path: &Path) -> PersistedConfig<Self>
    where
        Self: Sized,
    {
        PersistedConfig {
            inner: self,
            path: path.to_path_buf(),
        }
    }

    fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config from {:?}: {}", path, e))?;
        let config: Self = if is_yaml(path) {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        Ok(config)
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)
            .map_err(|e| anyhow!("Failed to write config to {:?}: {}", path, e))?;
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// A config value paired with the file it was loaded from.
pub struct PersistedConfig<C> {
    inner: C,
    path: PathBuf,
}

impl<C: Config> PersistedConfig<C> {
    pub fn read(&self) -> Result<C> {
        C::load(&self.path)
    }

    pub fn save(&self) -> Result<()> {
        self.inner.save(&self.path)
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    struct SampleConfig {
        batch_size: u16,
        relayer_urls: Vec<String>,
    }

    impl Config for SampleConfig {}

    fn sample() -> SampleConfig {
        SampleConfig {
            batch_size: 10,
            relayer_urls: vec!["http://127.0.0.1:9191".into()],
        }
    }

    #[test]
    fn test_yaml_and_json_persistence() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["bridge.yaml", "bridge.json"] {
            let path = dir.path().join(name);
            let persisted = sample().persisted(&path);
            persisted.save().unwrap();
            assert_eq!(persisted.read().unwrap(), sample());
        }
    }

    #[test]
    fn test_kebab_case_yaml_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.yml");
        std::fs::write(&path, "batch-size: 42\nrelayer-urls: []\n").unwrap();
        let config = SampleConfig::load(&path).unwrap();
        assert_eq!(config.batch_size, 42);
        assert!(config.relayer_urls.is_empty());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SampleConfig::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
