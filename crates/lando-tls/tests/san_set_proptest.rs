use std::collections::BTreeSet;
use std::sync::OnceLock;
use std::time::SystemTime;

use lando_tls::openssl::render_leaf_extensions;
use lando_tls::{
    generate_root, normalize_names, sign_leaf, summarize_pem, verify_leaf, GeneratedMaterial,
    KeyAlgorithm, LeafProfile, RootProfile, SubjectProfile,
};
use proptest::prelude::*;

fn subject() -> SubjectProfile {
    SubjectProfile {
        common_name: "*.lndo.site".to_string(),
        organization: "Lando".to_string(),
        organizational_unit: "Bespin".to_string(),
        locality: "San Francisco".to_string(),
        state: "California".to_string(),
        country: "US".to_string(),
    }
}

fn root() -> &'static GeneratedMaterial {
    static ROOT: OnceLock<GeneratedMaterial> = OnceLock::new();
    ROOT.get_or_init(|| {
        generate_root(
            &RootProfile {
                subject: subject(),
                validity_days: 1095,
                key_algorithm: KeyAlgorithm::EcdsaP256,
            },
            SystemTime::now(),
        )
        .expect("root")
    })
}

fn label_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z0-9](?:[a-z0-9-]{0,14}[a-z0-9])?")
        .expect("valid label regex")
}

fn names_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        (label_strategy(), any::<bool>()).prop_map(|(label, upper)| {
            let name = format!("{label}.lndo.site");
            if upper {
                name.to_ascii_uppercase()
            } else {
                name
            }
        }),
        1..6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn leaf_san_set_equals_normalized_request(requested in names_strategy()) {
        let names = normalize_names(&requested);
        let material = sign_leaf(
            &root().cert_pem,
            &root().key_pem,
            &names,
            &LeafProfile {
                subject: subject(),
                validity_days: 365,
                key_algorithm: KeyAlgorithm::EcdsaP256,
            },
            SystemTime::now(),
        )
        .expect("leaf");

        let summary = summarize_pem(&material.cert_pem).expect("summary");
        prop_assert_eq!(&summary.subject_alt_names, &names);
        prop_assert_eq!(
            summary.subject_value("CN"),
            names.iter().next().map(String::as_str)
        );

        let verdict = verify_leaf(
            &material.cert_pem,
            &root().cert_pem,
            Some(&names),
            SystemTime::now(),
        )
        .expect("verify");
        prop_assert!(verdict.is_valid());

        let mut widened: BTreeSet<String> = names.clone();
        widened.insert("extra.lndo.site".to_string());
        if widened != names {
            let verdict = verify_leaf(
                &material.cert_pem,
                &root().cert_pem,
                Some(&widened),
                SystemTime::now(),
            )
            .expect("verify");
            prop_assert!(!verdict.is_valid());
        }
    }

    #[test]
    fn extension_file_lists_every_name_once(requested in names_strategy()) {
        let names = normalize_names(&requested);
        let rendered = render_leaf_extensions(&names);
        let listed: BTreeSet<String> = rendered
            .lines()
            .filter(|line| line.starts_with("DNS."))
            .filter_map(|line| line.split_once(" = ").map(|(_, name)| name.to_string()))
            .collect();
        prop_assert_eq!(listed, names.clone());
        prop_assert_eq!(
            rendered.lines().filter(|line| line.starts_with("DNS.")).count(),
            names.len()
        );
    }
}
