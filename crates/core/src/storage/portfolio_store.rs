use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::CoreError;
use crate::models::holding::Holding;

/// Source of the user's holdings.
///
/// The dashboard reads holdings once at startup; the collection commands
/// read, modify and save the whole list.
pub trait PortfolioStore: Send {
    fn current_holdings(&self) -> Result<Vec<Holding>, CoreError>;

    fn save(&self, holdings: &[Holding]) -> Result<(), CoreError>;
}

/// On-disk layout of `collection.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CollectionFile {
    #[serde(default)]
    items: Vec<Holding>,
}

/// Holdings stored as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonPortfolioStore {
    path: PathBuf,
}

impl JsonPortfolioStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PortfolioStore for JsonPortfolioStore {
    /// A missing file is an empty collection. A file that exists but does
    /// not parse is an error, so a later save never overwrites it blindly.
    fn current_holdings(&self) -> Result<Vec<Holding>, CoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        let file: CollectionFile = serde_json::from_str(&text).map_err(|e| {
            CoreError::Deserialization(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        Ok(file.items)
    }

    fn save(&self, holdings: &[Holding]) -> Result<(), CoreError> {
        let file = CollectionFile {
            items: holdings.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize collection: {e}")))?;
        super::write_atomic(&self.path, json.as_bytes())
    }
}
