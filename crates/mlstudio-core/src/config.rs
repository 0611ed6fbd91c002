//! Client configuration: where the remote service lives and where session state is kept.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the remote training API, e.g. `http://127.0.0.1:8000/api`.
    pub api_url: String,
    /// Directory holding the session file. One directory is one profile.
    pub profile_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000/api".to_string(),
            profile_dir: PathBuf::from(".mlstudio"),
        }
    }
}

impl ClientConfig {
    /// Loads a YAML config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Absolute URL of an API path such as `/train`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Where a trained model artifact can be fetched.
    pub fn download_url(&self, model_id: &str) -> String {
        self.endpoint(&format!("download/{model_id}"))
    }
}
