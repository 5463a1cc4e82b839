use std::path::{Path, PathBuf};

use lando_tls::{KeyAlgorithm, LeafProfile, RootProfile, SubjectProfile};
use serde::Deserialize;

use crate::layout::CertLayout;
use crate::CertError;

pub const MIN_CA_VALIDITY_DAYS: u32 = 3 * 365;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CertsConfig {
    pub ssl_root: PathBuf,
    pub ca_name: String,
    pub proxy_cert_name: String,
    pub proxy_domain: String,
    pub ca_validity_days: u32,
    pub leaf_validity_days: u32,
    pub key_algorithm: KeyAlgorithm,
    pub subject: SubjectConfig,
}

impl Default for CertsConfig {
    fn default() -> Self {
        Self {
            ssl_root: default_ssl_root(),
            ca_name: "landoCA".to_string(),
            proxy_cert_name: "landoProxy".to_string(),
            proxy_domain: "lndo.site".to_string(),
            ca_validity_days: MIN_CA_VALIDITY_DAYS,
            leaf_validity_days: 365,
            key_algorithm: KeyAlgorithm::Rsa2048,
            subject: SubjectConfig::default(),
        }
    }
}

/// Organization fields shared by the root and every leaf.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubjectConfig {
    pub organization: String,
    pub organizational_unit: String,
    pub locality: String,
    pub state: String,
    pub country: String,
}

impl Default for SubjectConfig {
    fn default() -> Self {
        Self {
            organization: "Lando".to_string(),
            organizational_unit: "Bespin".to_string(),
            locality: "San Francisco".to_string(),
            state: "California".to_string(),
            country: "US".to_string(),
        }
    }
}

impl CertsConfig {
    pub fn with_ssl_root(mut self, ssl_root: impl Into<PathBuf>) -> Self {
        self.ssl_root = ssl_root.into();
        self
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CertError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw).map_err(|error| {
            CertError::InvalidConfig(format!("failed to parse {}: {error}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CertError> {
        if self.ssl_root.as_os_str().is_empty() {
            return Err(CertError::InvalidConfig(
                "ssl_root must not be empty".to_string(),
            ));
        }
        validate_file_stem("ca_name", &self.ca_name)?;
        validate_file_stem("proxy_cert_name", &self.proxy_cert_name)?;
        if self.ca_name == self.proxy_cert_name {
            return Err(CertError::InvalidConfig(
                "ca_name and proxy_cert_name must differ".to_string(),
            ));
        }
        let domain = self.proxy_domain.trim();
        if domain.is_empty() || domain.starts_with('.') || domain.contains(char::is_whitespace) {
            return Err(CertError::InvalidConfig(format!(
                "proxy_domain {:?} is not a usable domain",
                self.proxy_domain
            )));
        }
        if self.ca_validity_days < MIN_CA_VALIDITY_DAYS {
            return Err(CertError::InvalidConfig(format!(
                "ca_validity_days must be at least {MIN_CA_VALIDITY_DAYS}"
            )));
        }
        if self.leaf_validity_days == 0 {
            return Err(CertError::InvalidConfig(
                "leaf_validity_days must be greater than zero".to_string(),
            ));
        }
        if self.subject.country.len() != 2 {
            return Err(CertError::InvalidConfig(
                "subject.country must be a two-letter code".to_string(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> CertLayout {
        CertLayout::new(&self.ssl_root)
    }

    /// The root is named after the wildcard the local proxy serves.
    pub fn ca_common_name(&self) -> String {
        format!("*.{}", self.proxy_domain.trim())
    }

    pub fn subject_profile(&self) -> SubjectProfile {
        SubjectProfile {
            common_name: self.ca_common_name(),
            organization: self.subject.organization.clone(),
            organizational_unit: self.subject.organizational_unit.clone(),
            locality: self.subject.locality.clone(),
            state: self.subject.state.clone(),
            country: self.subject.country.clone(),
        }
    }

    pub fn root_profile(&self) -> RootProfile {
        RootProfile {
            subject: self.subject_profile(),
            validity_days: self.ca_validity_days,
            key_algorithm: self.key_algorithm,
        }
    }

    pub fn leaf_profile(&self) -> LeafProfile {
        LeafProfile {
            subject: self.subject_profile(),
            validity_days: self.leaf_validity_days,
            key_algorithm: self.key_algorithm,
        }
    }
}

pub(crate) fn validate_file_stem(field: &str, value: &str) -> Result<(), CertError> {
    if value.trim().is_empty() {
        return Err(CertError::InvalidConfig(format!("{field} must not be empty")));
    }
    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(CertError::InvalidConfig(format!(
            "{field} {value:?} must be a bare file name"
        )));
    }
    Ok(())
}

fn default_ssl_root() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".lando")
        .join("certs")
}
