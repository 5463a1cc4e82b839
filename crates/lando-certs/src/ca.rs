use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use lando_tls::{CertificateSummary, LeafVerdict};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{validate_file_stem, CertsConfig};
use crate::fsutil::read_optional;
use crate::issuance::{InProcessBackend, IssuanceBackend, LeafRequest, RootRequest};
use crate::layout::{CertLayout, MaterialPaths};
use crate::CertError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaRecord {
    pub certificate_path: PathBuf,
    pub key_path: PathBuf,
    pub serial_number: Vec<u8>,
    pub not_before: SystemTime,
    pub not_after: SystemTime,
    pub subject_attributes: Vec<(String, String)>,
    pub certificate_pem: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCertRecord {
    pub certificate_path: PathBuf,
    pub key_path: PathBuf,
    pub subject_alt_names: BTreeSet<String>,
    /// The root this leaf chains to, held by content.
    pub issuer_certificate_pem: String,
    pub serial_number: Vec<u8>,
    pub not_before: SystemTime,
    pub not_after: SystemTime,
}

/// Owns the local root CA and the leaves it signs.
///
/// Root generation is single-flight per authority; leaf issuance is
/// single-flight per target certificate path.
pub struct CertificateAuthority<B = InProcessBackend> {
    config: CertsConfig,
    layout: CertLayout,
    backend: B,
    root_flight: Mutex<()>,
    leaf_flights: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl CertificateAuthority<InProcessBackend> {
    pub fn new(config: CertsConfig) -> Result<Self, CertError> {
        Self::with_backend(config, InProcessBackend)
    }
}

impl<B> CertificateAuthority<B>
where
    B: IssuanceBackend,
{
    pub fn with_backend(config: CertsConfig, backend: B) -> Result<Self, CertError> {
        config.validate()?;
        Ok(Self {
            layout: config.layout(),
            config,
            backend,
            root_flight: Mutex::new(()),
            leaf_flights: DashMap::new(),
        })
    }

    pub fn config(&self) -> &CertsConfig {
        &self.config
    }

    pub fn layout(&self) -> &CertLayout {
        &self.layout
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn root_paths(&self) -> MaterialPaths {
        self.layout.material(&self.config.ca_name)
    }

    /// Returns the persisted root when it is usable, generating one otherwise.
    pub async fn ensure_root_ca(&self) -> Result<CaRecord, CertError> {
        let paths = self.root_paths();
        // Unlocked reads can observe a regeneration in progress, so only a
        // usable root is trusted here; everything else is re-checked under the lock.
        match load_root(&paths).await {
            Ok(Some(record)) => {
                debug!(cert = %paths.cert.display(), "reusing root CA");
                return Ok(record);
            }
            Ok(None) => {}
            Err(error) => debug!(%error, "root CA not usable without the lock, re-checking"),
        }

        let _flight = self.root_flight.lock().await;
        if let Some(record) = load_root(&paths).await? {
            debug!(cert = %paths.cert.display(), "root CA generated by a concurrent caller");
            return Ok(record);
        }

        info!(
            cert = %paths.cert.display(),
            validity_days = self.config.ca_validity_days,
            "generating root CA"
        );
        let request = RootRequest {
            paths: paths.clone(),
            ssl_conf: self.layout.ssl_conf(),
            profile: self.config.root_profile(),
        };
        self.backend.generate_root(&request).await?;

        load_root(&paths).await?.ok_or_else(|| {
            CertError::CaUnavailable(format!(
                "generated root CA at {} could not be read back",
                paths.cert.display()
            ))
        })
    }

    /// Issues (or reuses) the proxy leaf for `names`.
    ///
    /// Names are trimmed, lowercased and de-duplicated before signing, so the
    /// certificate's DNS names are the case-folded request.
    pub async fn issue_leaf_certificate<I, S>(&self, names: I) -> Result<LeafCertRecord, CertError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let leaf_name = self.config.proxy_cert_name.clone();
        self.issue_leaf_certificate_for(&leaf_name, names).await
    }

    pub async fn issue_leaf_certificate_for<I, S>(
        &self,
        leaf_name: &str,
        names: I,
    ) -> Result<LeafCertRecord, CertError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        validate_file_stem("leaf name", leaf_name)?;
        if leaf_name == self.config.ca_name {
            return Err(CertError::InvalidConfig(format!(
                "leaf name {leaf_name:?} collides with the CA name"
            )));
        }
        let names = lando_tls::normalize_names(names);
        if names.is_empty() {
            return Err(CertError::SigningError(
                "at least one subject alternative name is required".to_string(),
            ));
        }

        let ca = self.ensure_root_ca().await?;
        let paths = self.layout.material(leaf_name);
        let flight = self.leaf_flight(&paths.cert);
        let _flight = flight.lock().await;

        if let Some(record) = load_leaf(&paths, &ca, &names).await? {
            debug!(leaf = leaf_name, "reusing leaf certificate");
            return Ok(record);
        }

        info!(leaf = leaf_name, names = ?names, "issuing leaf certificate");
        let request = LeafRequest {
            leaf_name: leaf_name.to_string(),
            paths: paths.clone(),
            ca: self.root_paths(),
            ssl_conf: self.layout.ssl_conf(),
            extensions: self.layout.leaf_extensions(leaf_name),
            names: names.clone(),
            profile: self.config.leaf_profile(),
        };
        self.backend.issue_leaf(&request).await?;

        load_leaf(&paths, &ca, &names).await?.ok_or_else(|| {
            CertError::SigningError(format!(
                "issued leaf certificate at {} failed verification",
                paths.cert.display()
            ))
        })
    }

    fn leaf_flight(&self, cert_path: &Path) -> Arc<Mutex<()>> {
        self.leaf_flights
            .entry(cert_path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}

/// `Ok(None)` means "generate": nothing on disk, half a pair, or an expired root.
/// Material that exists but does not check out is an error and stays on disk.
async fn load_root(paths: &MaterialPaths) -> Result<Option<CaRecord>, CertError> {
    let cert_pem = read_optional(&paths.cert).await.map_err(|error| {
        CertError::CaUnavailable(format!("failed to read {}: {error}", paths.cert.display()))
    })?;
    let key_pem = read_optional(&paths.key).await.map_err(|error| {
        CertError::CaUnavailable(format!("failed to read {}: {error}", paths.key.display()))
    })?;

    let (cert_pem, key_pem) = match (cert_pem, key_pem) {
        (Some(cert_pem), Some(key_pem)) => (cert_pem, key_pem),
        (None, None) => return Ok(None),
        (cert, _) => {
            warn!(
                cert = %paths.cert.display(),
                cert_present = cert.is_some(),
                "root CA pair is incomplete, regenerating"
            );
            return Ok(None);
        }
    };

    let unusable = |error: lando_tls::TlsError| {
        CertError::CaUnavailable(format!(
            "existing root CA at {} is unusable: {error}",
            paths.cert.display()
        ))
    };

    // An expired root is replaced whatever key sits next to it.
    if !lando_tls::summarize_pem(&cert_pem)
        .map_err(unusable)?
        .is_current(SystemTime::now())
    {
        warn!(cert = %paths.cert.display(), "root CA is outside its validity window, regenerating");
        return Ok(None);
    }

    let checked_pem = cert_pem.clone();
    let summary = tokio::task::spawn_blocking(move || {
        lando_tls::check_ca_material(&checked_pem, &key_pem)
    })
    .await?
    .map_err(unusable)?;

    Ok(Some(ca_record(paths, summary, cert_pem)))
}

async fn load_leaf(
    paths: &MaterialPaths,
    ca: &CaRecord,
    names: &BTreeSet<String>,
) -> Result<Option<LeafCertRecord>, CertError> {
    let (Some(cert_pem), Some(key_pem)) =
        (read_optional(&paths.cert).await?, read_optional(&paths.key).await?)
    else {
        return Ok(None);
    };

    let verdict =
        lando_tls::verify_leaf(&cert_pem, &ca.certificate_pem, Some(names), SystemTime::now())?;
    let summary = match verdict {
        LeafVerdict::Valid(summary) => summary,
        other => {
            info!(cert = %paths.cert.display(), reason = %other, "existing leaf is stale");
            return Ok(None);
        }
    };
    if !lando_tls::key_matches_certificate(&cert_pem, &key_pem).unwrap_or(false) {
        info!(cert = %paths.cert.display(), "existing leaf key does not match its certificate");
        return Ok(None);
    }

    Ok(Some(LeafCertRecord {
        certificate_path: paths.cert.clone(),
        key_path: paths.key.clone(),
        subject_alt_names: summary.subject_alt_names,
        issuer_certificate_pem: ca.certificate_pem.clone(),
        serial_number: summary.serial,
        not_before: summary.not_before,
        not_after: summary.not_after,
    }))
}

fn ca_record(paths: &MaterialPaths, summary: CertificateSummary, cert_pem: String) -> CaRecord {
    CaRecord {
        certificate_path: paths.cert.clone(),
        key_path: paths.key.clone(),
        serial_number: summary.serial,
        not_before: summary.not_before,
        not_after: summary.not_after,
        subject_attributes: summary.subject,
        certificate_pem: cert_pem,
    }
}
