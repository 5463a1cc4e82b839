use lando_tls::TlsError;
use lando_util::UtilError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertError {
    #[error("certificate authority unavailable: {0}")]
    CaUnavailable(String),
    #[error("certificate signing failed: {0}")]
    SigningError(String),
    #[error(transparent)]
    Engine(#[from] UtilError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("shell command failed: {0}")]
    Shell(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<TlsError> for CertError {
    fn from(error: TlsError) -> Self {
        match error {
            TlsError::InvalidMaterial(detail) => Self::CaUnavailable(detail),
            TlsError::InvalidSubjectAltName { name, detail } => {
                Self::SigningError(format!("invalid subject alternative name {name:?}: {detail}"))
            }
            TlsError::Generation(error) => Self::SigningError(error.to_string()),
            TlsError::Io(error) => Self::Io(error),
        }
    }
}
