//! Reconciler configuration.

use crate::error::ReconcileError;
use descriptor_model::{DescriptorLayout, DEFAULT_IDENTIFIER_KEY};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for one [`crate::Reconciler`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Where field entries live in the descriptor document
    pub layout: DescriptorLayout,
    /// Sample key naming the dataset; exempt from critical severity
    pub identifier_key: String,
    /// Flag declared descriptions that do not mention their key
    pub check_descriptions: bool,
    /// Keep a meaningful description when replacing an invalid descriptor
    pub preserve_descriptions: bool,
    /// Classifier calls in flight at once; 1 classifies sequentially
    pub max_concurrency: usize,
    /// Per-call classification limit
    pub classify_timeout_ms: Option<u64>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            layout: DescriptorLayout::TopLevel,
            identifier_key: DEFAULT_IDENTIFIER_KEY.to_string(),
            check_descriptions: true,
            preserve_descriptions: false,
            max_concurrency: 1,
            classify_timeout_ms: None,
        }
    }
}

impl ReconcilerConfig {
    /// Descriptor entries nested under `dataDescriptor`.
    pub fn nested() -> Self {
        Self {
            layout: DescriptorLayout::nested(),
            ..Self::default()
        }
    }

    pub fn classify_timeout(&self) -> Option<Duration> {
        self.classify_timeout_ms.map(Duration::from_millis)
    }

    pub fn load(path: &Path) -> Result<Self, ReconcileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ReconcileError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ReconcileError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| ReconcileError::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}
