use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start {container}: {detail}")]
    Start { container: String, detail: String },
    #[error("failed to exec in {container}: {detail}")]
    Exec { container: String, detail: String },
    #[error("failed to inspect {container}: {detail}")]
    Exists { container: String, detail: String },
    #[error("failed to stop {container}: {detail}")]
    Stop { container: String, detail: String },
    #[error("failed to destroy {container}: {detail}")]
    Destroy { container: String, detail: String },
}

#[derive(Debug, Error)]
pub enum UtilError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("helper script {path} is missing")]
    MissingScript { path: PathBuf },
    #[error("failed to render compose definition: {0}")]
    Compose(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
