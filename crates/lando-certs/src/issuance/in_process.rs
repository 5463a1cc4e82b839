use std::time::SystemTime;

use tracing::debug;

use super::{IssuanceBackend, LeafRequest, RootRequest};
use crate::fsutil::{write_all_atomic, CERT_MODE, KEY_MODE};
use crate::CertError;

/// Generates and signs with rcgen on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessBackend;

impl IssuanceBackend for InProcessBackend {
    async fn generate_root(&self, request: &RootRequest) -> Result<(), CertError> {
        let request = request.clone();
        tokio::task::spawn_blocking(move || {
            let material = lando_tls::generate_root(&request.profile, SystemTime::now())?;
            // Key first: the pair only counts as present once the cert lands.
            write_all_atomic(&[
                (request.paths.key.as_path(), material.key_pem.as_bytes(), KEY_MODE),
                (request.paths.cert.as_path(), material.cert_pem.as_bytes(), CERT_MODE),
            ])?;
            debug!(cert = %request.paths.cert.display(), "wrote root CA material");
            Ok::<_, CertError>(())
        })
        .await?
    }

    async fn issue_leaf(&self, request: &LeafRequest) -> Result<(), CertError> {
        let request = request.clone();
        tokio::task::spawn_blocking(move || {
            let ca_cert_pem = std::fs::read_to_string(&request.ca.cert).map_err(|error| {
                CertError::CaUnavailable(format!(
                    "failed to read CA certificate {}: {error}",
                    request.ca.cert.display()
                ))
            })?;
            let ca_key_pem = std::fs::read_to_string(&request.ca.key).map_err(|error| {
                CertError::CaUnavailable(format!(
                    "failed to read CA private key {}: {error}",
                    request.ca.key.display()
                ))
            })?;

            let material = lando_tls::sign_leaf(
                &ca_cert_pem,
                &ca_key_pem,
                &request.names,
                &request.profile,
                SystemTime::now(),
            )?;
            write_all_atomic(&[
                (request.paths.key.as_path(), material.key_pem.as_bytes(), KEY_MODE),
                (request.paths.cert.as_path(), material.cert_pem.as_bytes(), CERT_MODE),
            ])?;
            debug!(
                leaf = %request.leaf_name,
                cert = %request.paths.cert.display(),
                "wrote leaf certificate material"
            );
            Ok::<_, CertError>(())
        })
        .await?
    }
}
