use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rcgen::{CertificateParams, KeyPair};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::CertificateDer;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::{parse_x509_certificate, X509Certificate};
use x509_parser::x509::{AttributeTypeAndValue, X509Name};

use crate::TlsError;

/// Parsed view of a certificate, enough to rebuild records and decide reuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    pub serial: Vec<u8>,
    pub not_before: SystemTime,
    pub not_after: SystemTime,
    pub subject: Vec<(String, String)>,
    pub issuer: String,
    pub subject_alt_names: BTreeSet<String>,
    pub is_ca: bool,
}

impl CertificateSummary {
    pub fn validity(&self) -> Duration {
        self.not_after
            .duration_since(self.not_before)
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_current(&self, now: SystemTime) -> bool {
        now >= self.not_before && now <= self.not_after
    }

    pub fn serial_hex(&self) -> String {
        self.serial.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    pub fn subject_value(&self, label: &str) -> Option<&str> {
        self.subject
            .iter()
            .find(|(key, _)| key == label)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafVerdict {
    Valid(CertificateSummary),
    Unparseable(String),
    IssuerMismatch { expected: String, found: String },
    BadSignature(String),
    OutsideValidity {
        not_before: SystemTime,
        not_after: SystemTime,
    },
    NamesChanged {
        expected: BTreeSet<String>,
        found: BTreeSet<String>,
    },
}

impl LeafVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

impl fmt::Display for LeafVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid(summary) => write!(f, "valid (serial {})", summary.serial_hex()),
            Self::Unparseable(detail) => write!(f, "unparseable: {detail}"),
            Self::IssuerMismatch { expected, found } => {
                write!(f, "issued by {found:?}, expected {expected:?}")
            }
            Self::BadSignature(detail) => write!(f, "signature does not verify: {detail}"),
            Self::OutsideValidity { .. } => f.write_str("outside its validity window"),
            Self::NamesChanged { expected, found } => {
                write!(f, "names {found:?} differ from requested {expected:?}")
            }
        }
    }
}

pub fn pem_to_der(pem: &str) -> Result<CertificateDer<'static>, TlsError> {
    CertificateDer::from_pem_slice(pem.as_bytes()).map_err(|error| {
        TlsError::InvalidMaterial(format!("failed to parse certificate PEM: {error}"))
    })
}

pub fn summarize_pem(pem: &str) -> Result<CertificateSummary, TlsError> {
    let der = pem_to_der(pem)?;
    summarize_der(der.as_ref())
}

pub fn summarize_der(der: &[u8]) -> Result<CertificateSummary, TlsError> {
    let (_, cert) = parse_der(der)?;
    Ok(summarize_parsed(&cert))
}

/// Returns whether `child_der` carries a valid signature from the key in `issuer_der`.
pub fn verify_signed_by(child_der: &[u8], issuer_der: &[u8]) -> Result<bool, TlsError> {
    let (_, child) = parse_der(child_der)?;
    let (_, issuer) = parse_der(issuer_der)?;
    Ok(child.verify_signature(Some(issuer.public_key())).is_ok())
}

/// Decides whether a persisted leaf can be reused under the given CA.
///
/// Only an unreadable CA certificate is an error; every problem with the leaf
/// itself is reported as a non-valid verdict.
pub fn verify_leaf(
    leaf_pem: &str,
    ca_cert_pem: &str,
    expected_names: Option<&BTreeSet<String>>,
    now: SystemTime,
) -> Result<LeafVerdict, TlsError> {
    let ca_der = pem_to_der(ca_cert_pem)?;
    let (_, ca) = parse_der(ca_der.as_ref())?;

    let leaf_der = match pem_to_der(leaf_pem) {
        Ok(der) => der,
        Err(error) => return Ok(LeafVerdict::Unparseable(error.to_string())),
    };
    let leaf = match parse_x509_certificate(leaf_der.as_ref()) {
        Ok((_, leaf)) => leaf,
        Err(error) => return Ok(LeafVerdict::Unparseable(error.to_string())),
    };

    let expected_issuer = ca.subject().to_string();
    let found_issuer = leaf.issuer().to_string();
    if expected_issuer != found_issuer {
        return Ok(LeafVerdict::IssuerMismatch {
            expected: expected_issuer,
            found: found_issuer,
        });
    }
    if let Err(error) = leaf.verify_signature(Some(ca.public_key())) {
        return Ok(LeafVerdict::BadSignature(error.to_string()));
    }

    let summary = summarize_parsed(&leaf);
    if !summary.is_current(now) {
        return Ok(LeafVerdict::OutsideValidity {
            not_before: summary.not_before,
            not_after: summary.not_after,
        });
    }
    if let Some(expected) = expected_names {
        if &summary.subject_alt_names != expected {
            return Ok(LeafVerdict::NamesChanged {
                expected: expected.clone(),
                found: summary.subject_alt_names,
            });
        }
    }

    Ok(LeafVerdict::Valid(summary))
}

/// Whether `key_pem` is the private half of the key certified by `cert_pem`.
pub fn key_matches_certificate(cert_pem: &str, key_pem: &str) -> Result<bool, TlsError> {
    let cert_der = pem_to_der(cert_pem)?;
    let (_, cert) = parse_der(cert_der.as_ref())?;
    let key = KeyPair::from_pem(key_pem).map_err(|error| {
        TlsError::InvalidMaterial(format!("failed to parse private key PEM: {error}"))
    })?;
    let probe_cert = CertificateParams::new(Vec::<String>::new())?.self_signed(&key)?;
    let (_, probe) = parse_der(probe_cert.der().as_ref())?;
    Ok(probe.public_key().raw == cert.public_key().raw)
}

fn parse_der(der: &[u8]) -> Result<(&[u8], X509Certificate<'_>), TlsError> {
    parse_x509_certificate(der).map_err(|error| {
        TlsError::InvalidMaterial(format!("failed to parse X.509 certificate: {error}"))
    })
}

fn summarize_parsed(cert: &X509Certificate<'_>) -> CertificateSummary {
    let validity = cert.validity();
    CertificateSummary {
        serial: cert.raw_serial().to_vec(),
        not_before: timestamp_to_system_time(validity.not_before.timestamp()),
        not_after: timestamp_to_system_time(validity.not_after.timestamp()),
        subject: subject_attributes(cert.subject()),
        issuer: cert.issuer().to_string(),
        subject_alt_names: subject_alt_names(cert),
        is_ca: cert
            .basic_constraints()
            .ok()
            .flatten()
            .map(|constraints| constraints.value.ca)
            .unwrap_or(false),
    }
}

fn subject_alt_names(cert: &X509Certificate<'_>) -> BTreeSet<String> {
    let Ok(Some(extension)) = cert.subject_alternative_name() else {
        return BTreeSet::new();
    };
    extension
        .value
        .general_names
        .iter()
        .filter_map(|name| match name {
            GeneralName::DNSName(dns) => Some(dns.to_string()),
            GeneralName::IPAddress(bytes) => ip_from_bytes(bytes).map(|ip| ip.to_string()),
            _ => None,
        })
        .collect()
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

fn subject_attributes(name: &X509Name<'_>) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    push_attributes(&mut attributes, "C", name.iter_country());
    push_attributes(&mut attributes, "ST", name.iter_state_or_province());
    push_attributes(&mut attributes, "L", name.iter_locality());
    push_attributes(&mut attributes, "O", name.iter_organization());
    push_attributes(&mut attributes, "OU", name.iter_organizational_unit());
    push_attributes(&mut attributes, "CN", name.iter_common_name());
    attributes
}

fn push_attributes<'a, 'b: 'a>(
    attributes: &mut Vec<(String, String)>,
    label: &str,
    values: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>,
) {
    for value in values {
        if let Ok(text) = value.as_str() {
            attributes.push((label.to_string(), text.to_string()));
        }
    }
}

fn timestamp_to_system_time(seconds: i64) -> SystemTime {
    if seconds >= 0 {
        UNIX_EPOCH + Duration::from_secs(seconds.unsigned_abs())
    } else {
        UNIX_EPOCH - Duration::from_secs(seconds.unsigned_abs())
    }
}
