use descriptor_model::StructuralError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error("cannot access reconciler config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed reconciler config: {0}")]
    ConfigFormat(#[from] serde_json::Error),
}
