//! Local state file: resource instances by address

use crate::error::{Error, Result};
use crate::schema::ResourceData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const STATE_VERSION: u32 = 1;

/// Persisted state of every managed resource instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default = "state_version")]
    pub version: u32,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceData>,
}

fn state_version() -> u32 {
    STATE_VERSION
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resources: BTreeMap::new(),
        }
    }
}

impl StateFile {
    /// Load state from a file, starting empty if it does not exist
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let state: Self = serde_json::from_str(&contents)
            .map_err(|e| Error::config(format!("Failed to parse state file: {e}")))?;
        if state.version > STATE_VERSION {
            return Err(Error::config(format!(
                "State file version {} is newer than supported version {STATE_VERSION}",
                state.version
            )));
        }
        Ok(state)
    }

    /// Write state through a temporary file and rename
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }

    pub fn get(&self, address: &str) -> Option<&ResourceData> {
        self.resources.get(address)
    }

    /// Store an instance, or drop it once it has no identifier
    pub fn put(&mut self, address: &str, data: ResourceData) {
        if data.has_id() {
            self.resources.insert(address.to_string(), data);
        } else {
            self.resources.remove(address);
        }
    }

    pub fn remove(&mut self, address: &str) -> Option<ResourceData> {
        self.resources.remove(address)
    }
}
