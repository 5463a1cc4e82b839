use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("invalid certificate material: {0}")]
    InvalidMaterial(String),
    #[error("invalid subject alternative name {name:?}: {detail}")]
    InvalidSubjectAltName { name: String, detail: String },
    #[error("certificate generation failed: {0}")]
    Generation(#[from] rcgen::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
