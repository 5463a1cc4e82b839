use std::path::PathBuf;

use lando_certs::{CertError, CertificateAuthority, CertsConfig, KeyAlgorithm, MIN_CA_VALIDITY_DAYS};
use proptest::prelude::*;

fn assert_invalid(config: CertsConfig, fragment: &str) {
    match config.validate() {
        Err(CertError::InvalidConfig(detail)) => {
            assert!(detail.contains(fragment), "{detail:?} should mention {fragment:?}")
        }
        other => panic!("expected InvalidConfig mentioning {fragment:?}, got {other:?}"),
    }
}

#[test]
fn defaults_describe_the_stock_lando_layout() {
    let config = CertsConfig::default();
    assert_eq!(config.ca_name, "landoCA");
    assert_eq!(config.proxy_cert_name, "landoProxy");
    assert_eq!(config.proxy_domain, "lndo.site");
    assert_eq!(config.ca_validity_days, MIN_CA_VALIDITY_DAYS);
    assert_eq!(config.leaf_validity_days, 365);
    assert_eq!(config.key_algorithm, KeyAlgorithm::Rsa2048);
    assert!(config.ssl_root.ends_with(PathBuf::from(".lando").join("certs")));
    assert_eq!(config.ca_common_name(), "*.lndo.site");
    config.validate().expect("defaults validate");
}

#[test]
fn yaml_overrides_merge_with_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("certs.yml");
    std::fs::write(
        &path,
        format!(
            "ssl_root: {}\nproxy_domain: lndo.test\nkey_algorithm: ecdsa-p256\nsubject:\n  organization: Acme\n",
            dir.path().join("ssl").display()
        ),
    )
    .expect("write yaml");

    let config = CertsConfig::from_yaml_file(&path).expect("parse");
    assert_eq!(config.ssl_root, dir.path().join("ssl"));
    assert_eq!(config.proxy_domain, "lndo.test");
    assert_eq!(config.key_algorithm, KeyAlgorithm::EcdsaP256);
    assert_eq!(config.subject.organization, "Acme");
    assert_eq!(config.subject.country, "US");
    assert_eq!(config.ca_name, "landoCA");
    assert_eq!(config.root_profile().subject.common_name, "*.lndo.test");
}

#[test]
fn unknown_yaml_keys_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("certs.yml");
    std::fs::write(&path, "strategy: container\n").expect("write yaml");

    let error = CertsConfig::from_yaml_file(&path).expect_err("unknown key");
    assert!(matches!(error, CertError::InvalidConfig(_)), "{error}");
}

#[test]
fn yaml_values_are_validated_after_parsing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("certs.yml");
    std::fs::write(&path, "ca_validity_days: 30\n").expect("write yaml");

    let error = CertsConfig::from_yaml_file(&path).expect_err("short ca validity");
    assert!(matches!(error, CertError::InvalidConfig(_)), "{error}");
}

#[test]
fn missing_yaml_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let error = CertsConfig::from_yaml_file(dir.path().join("absent.yml")).expect_err("missing");
    assert!(matches!(error, CertError::Io(_)), "{error}");
}

#[test]
fn each_invalid_field_is_named() {
    assert_invalid(CertsConfig::default().with_ssl_root(""), "ssl_root");
    assert_invalid(
        CertsConfig {
            ca_name: " ".to_string(),
            ..CertsConfig::default()
        },
        "ca_name",
    );
    assert_invalid(
        CertsConfig {
            proxy_cert_name: "nested/proxy".to_string(),
            ..CertsConfig::default()
        },
        "proxy_cert_name",
    );
    assert_invalid(
        CertsConfig {
            proxy_cert_name: "landoCA".to_string(),
            ..CertsConfig::default()
        },
        "must differ",
    );
    assert_invalid(
        CertsConfig {
            proxy_domain: ".lndo.site".to_string(),
            ..CertsConfig::default()
        },
        "proxy_domain",
    );
    assert_invalid(
        CertsConfig {
            ca_validity_days: MIN_CA_VALIDITY_DAYS - 1,
            ..CertsConfig::default()
        },
        "ca_validity_days",
    );
    assert_invalid(
        CertsConfig {
            leaf_validity_days: 0,
            ..CertsConfig::default()
        },
        "leaf_validity_days",
    );

    let mut config = CertsConfig::default();
    config.subject.country = "USA".to_string();
    assert_invalid(config, "country");
}

#[test]
fn authority_refuses_invalid_config() {
    let config = CertsConfig {
        leaf_validity_days: 0,
        ..CertsConfig::default()
    };
    assert!(matches!(
        CertificateAuthority::new(config),
        Err(CertError::InvalidConfig(_))
    ));
}

proptest! {
    #[test]
    fn plain_stems_are_accepted(stem in "[A-Za-z][A-Za-z0-9_-]{0,15}") {
        prop_assume!(stem != "landoCA");
        let config = CertsConfig {
            proxy_cert_name: stem,
            ..CertsConfig::default()
        };
        prop_assert!(config.validate().is_ok());
    }

    #[test]
    fn stems_with_separators_are_rejected(head in "[a-z]{1,8}", tail in "[a-z]{1,8}") {
        let config = CertsConfig {
            proxy_cert_name: format!("{head}/{tail}"),
            ..CertsConfig::default()
        };
        prop_assert!(config.validate().is_err());
    }
}
