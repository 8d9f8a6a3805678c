use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot read metadata of {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: exif::Error,
    },
    #[error("unknown property name: {0}")]
    UnknownProperty(String),
    #[error("property {name} holds {found}, expected {expected}")]
    PropertyType {
        name: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("failed to launch {target}: {reason}")]
    Launch { target: String, reason: String },
    #[error("registry operation on {key} failed: {reason}")]
    Registry { key: String, reason: String },
    #[error("elevated {action} failed with exit code {code}")]
    ElevatedChild { action: &'static str, code: u32 },
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
    #[error("json output failed: {0}")]
    Json(#[from] serde_json::Error),
}
