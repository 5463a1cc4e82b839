use std::collections::BTreeSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    Issuer, KeyPair, KeyUsagePurpose, SanType, SerialNumber,
};
use rustls_pki_types::CertificateDer;
use serde::Deserialize;

use crate::inspect::{pem_to_der, summarize_der, verify_signed_by, CertificateSummary};
use crate::TlsError;

pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

const ROOT_SERIAL: [u8; 1] = [0x01];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyAlgorithm {
    #[default]
    Rsa2048,
    EcdsaP256,
}

/// Fixed subject attributes stamped on every certificate this crate issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectProfile {
    pub common_name: String,
    pub organization: String,
    pub organizational_unit: String,
    pub locality: String,
    pub state: String,
    pub country: String,
}

impl SubjectProfile {
    pub fn with_common_name(&self, common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..self.clone()
        }
    }

    /// Renders the subject in the `/C=../CN=..` form accepted by `openssl req -subj`.
    pub fn openssl_subject(&self) -> String {
        self.attributes()
            .into_iter()
            .map(|(label, value)| format!("/{label}={value}"))
            .collect()
    }

    fn attributes(&self) -> Vec<(&'static str, &str)> {
        [
            ("C", self.country.as_str()),
            ("ST", self.state.as_str()),
            ("L", self.locality.as_str()),
            ("O", self.organization.as_str()),
            ("OU", self.organizational_unit.as_str()),
            ("CN", self.common_name.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect()
    }

    fn distinguished_name(&self) -> DistinguishedName {
        let mut distinguished_name = DistinguishedName::new();
        for (label, value) in self.attributes() {
            let kind = match label {
                "C" => DnType::CountryName,
                "ST" => DnType::StateOrProvinceName,
                "L" => DnType::LocalityName,
                "O" => DnType::OrganizationName,
                "OU" => DnType::OrganizationalUnitName,
                _ => DnType::CommonName,
            };
            distinguished_name.push(kind, value.to_string());
        }
        distinguished_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootProfile {
    pub subject: SubjectProfile,
    pub validity_days: u32,
    pub key_algorithm: KeyAlgorithm,
}

/// Leaf subjects reuse the root's organization fields; the common name is the
/// first subject alternative name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafProfile {
    pub subject: SubjectProfile,
    pub validity_days: u32,
    pub key_algorithm: KeyAlgorithm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMaterial {
    pub cert_pem: String,
    pub key_pem: String,
    pub cert_der: CertificateDer<'static>,
}

pub fn generate_root(
    profile: &RootProfile,
    now: SystemTime,
) -> Result<GeneratedMaterial, TlsError> {
    let key = generate_key_pair(profile.key_algorithm)?;
    let params = build_root_params(profile, now);
    let cert = params.self_signed(&key)?;

    Ok(GeneratedMaterial {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
        cert_der: cert.der().clone(),
    })
}

pub fn sign_leaf(
    ca_cert_pem: &str,
    ca_key_pem: &str,
    names: &BTreeSet<String>,
    profile: &LeafProfile,
    now: SystemTime,
) -> Result<GeneratedMaterial, TlsError> {
    let issuer = load_issuer(ca_cert_pem, ca_key_pem)?;
    let params = build_leaf_params(names, profile, now)?;
    let key = generate_key_pair(profile.key_algorithm)?;
    let cert = params.signed_by(&key, &issuer)?;

    Ok(GeneratedMaterial {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
        cert_der: cert.der().clone(),
    })
}

/// Checks that a persisted CA pair is usable: the certificate parses and is
/// self-signed, and the private key actually signs for it.
pub fn check_ca_material(
    ca_cert_pem: &str,
    ca_key_pem: &str,
) -> Result<CertificateSummary, TlsError> {
    let ca_der = pem_to_der(ca_cert_pem)?;
    let summary = summarize_der(ca_der.as_ref())?;
    if !verify_signed_by(ca_der.as_ref(), ca_der.as_ref())? {
        return Err(TlsError::InvalidMaterial(
            "CA certificate is not self-signed".to_string(),
        ));
    }

    let issuer = load_issuer(ca_cert_pem, ca_key_pem)?;
    let probe_key = KeyPair::generate()?;
    let mut probe_params = CertificateParams::new(Vec::<String>::new())?;
    probe_params.distinguished_name = DistinguishedName::new();
    probe_params
        .distinguished_name
        .push(DnType::CommonName, "key possession probe");
    let probe = probe_params.signed_by(&probe_key, &issuer)?;
    if !verify_signed_by(probe.der().as_ref(), ca_der.as_ref())? {
        return Err(TlsError::InvalidMaterial(
            "CA private key does not match the CA certificate".to_string(),
        ));
    }

    Ok(summary)
}

/// Trims, lowercases and de-duplicates requested host names, dropping blanks.
pub fn normalize_names<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| name.as_ref().trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// 16 random bytes with the top bit cleared so the DER integer stays positive.
pub fn random_serial() -> Vec<u8> {
    let mut bytes = uuid::Uuid::new_v4().into_bytes().to_vec();
    bytes[0] &= 0x7f;
    if bytes[0] == 0 {
        bytes[0] = 0x01;
    }
    bytes
}

pub fn validity_window(now: SystemTime, validity_days: u32) -> (SystemTime, SystemTime) {
    let whole_seconds = now
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    let not_before = UNIX_EPOCH + Duration::from_secs(whole_seconds);
    let not_after =
        not_before + Duration::from_secs(u64::from(validity_days) * SECONDS_PER_DAY);
    (not_before, not_after)
}

fn load_issuer(ca_cert_pem: &str, ca_key_pem: &str) -> Result<Issuer<'static, KeyPair>, TlsError> {
    let ca_der = pem_to_der(ca_cert_pem)?;
    let ca_key = KeyPair::from_pem(ca_key_pem).map_err(|error| {
        TlsError::InvalidMaterial(format!("failed to parse CA private key PEM: {error}"))
    })?;
    Issuer::from_ca_cert_der(&ca_der, ca_key).map_err(|error| {
        TlsError::InvalidMaterial(format!(
            "failed to parse issuer metadata from CA certificate: {error}"
        ))
    })
}

fn generate_key_pair(algorithm: KeyAlgorithm) -> Result<KeyPair, TlsError> {
    let key = match algorithm {
        KeyAlgorithm::Rsa2048 => KeyPair::generate_for(&rcgen::PKCS_RSA_SHA256)?,
        KeyAlgorithm::EcdsaP256 => KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?,
    };
    Ok(key)
}

fn build_root_params(profile: &RootProfile, now: SystemTime) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
    ];
    params.distinguished_name = profile.subject.distinguished_name();
    params.serial_number = Some(SerialNumber::from_slice(&ROOT_SERIAL));

    let (not_before, not_after) = validity_window(now, profile.validity_days);
    params.not_before = not_before.into();
    params.not_after = not_after.into();
    params
}

fn build_leaf_params(
    names: &BTreeSet<String>,
    profile: &LeafProfile,
    now: SystemTime,
) -> Result<CertificateParams, TlsError> {
    let Some(first_name) = names.iter().next() else {
        return Err(TlsError::InvalidSubjectAltName {
            name: String::new(),
            detail: "at least one subject alternative name is required".to_string(),
        });
    };

    let mut params = CertificateParams::new(Vec::<String>::new())?;
    params.use_authority_key_identifier_extension = true;
    params.is_ca = IsCa::NoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    params.distinguished_name = profile
        .subject
        .with_common_name(first_name.clone())
        .distinguished_name();
    params.serial_number = Some(SerialNumber::from(random_serial()));

    for name in names {
        if !name.is_ascii() {
            return Err(TlsError::InvalidSubjectAltName {
                name: name.clone(),
                detail: "DNS names must be ASCII".to_string(),
            });
        }
        let san = name
            .as_str()
            .try_into()
            .map(SanType::DnsName)
            .map_err(|error: rcgen::Error| TlsError::InvalidSubjectAltName {
                name: name.clone(),
                detail: error.to_string(),
            })?;
        params.subject_alt_names.push(san);
    }

    let (not_before, not_after) = validity_window(now, profile.validity_days);
    params.not_before = not_before.into();
    params.not_after = not_after.into();
    Ok(params)
}
