//! Shell command chains for issuing the same material with the `openssl`
//! binary inside the utility container.

use std::collections::BTreeSet;

use crate::material::{KeyAlgorithm, SubjectProfile};

pub const SSL_CONF: &str = "\
[req]
distinguished_name = req_distinguished_name
prompt = no

[req_distinguished_name]

[v3_ca]
subjectKeyIdentifier = hash
authorityKeyIdentifier = keyid:always,issuer
basicConstraints = critical, CA:true
keyUsage = critical, digitalSignature, keyCertSign, cRLSign
";

/// Paths of one key/csr/cert triple as seen from where the commands run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpensslPaths {
    pub key: String,
    pub csr: String,
    pub cert: String,
}

/// Extension file for a leaf: server auth plus every DNS name in order.
pub fn render_leaf_extensions(names: &BTreeSet<String>) -> String {
    let mut out = String::from(
        "[v3_req]\n\
         basicConstraints = CA:FALSE\n\
         keyUsage = critical, digitalSignature, keyEncipherment\n\
         extendedKeyUsage = serverAuth\n\
         authorityKeyIdentifier = keyid,issuer\n\
         subjectAltName = @alt_names\n\
         \n\
         [alt_names]\n",
    );
    for (index, name) in names.iter().enumerate() {
        out.push_str(&format!("DNS.{} = {name}\n", index + 1));
    }
    out
}

pub fn root_command(
    paths: &OpensslPaths,
    conf_path: &str,
    subject: &SubjectProfile,
    validity_days: u32,
    algorithm: KeyAlgorithm,
) -> String {
    [
        genkey(&paths.key, algorithm),
        request(paths, conf_path, subject),
        format!(
            "openssl x509 -req -sha256 -days {validity_days} -in {} -signkey {} -set_serial 1 -out {} -extensions v3_ca -extfile {}",
            quote(&paths.csr),
            quote(&paths.key),
            quote(&paths.cert),
            quote(conf_path),
        ),
    ]
    .join(" && ")
}

#[allow(clippy::too_many_arguments)]
pub fn leaf_command(
    paths: &OpensslPaths,
    ca: &OpensslPaths,
    conf_path: &str,
    ext_path: &str,
    subject: &SubjectProfile,
    validity_days: u32,
    serial: &[u8],
    algorithm: KeyAlgorithm,
) -> String {
    let serial_hex: String = serial.iter().map(|byte| format!("{byte:02x}")).collect();
    [
        genkey(&paths.key, algorithm),
        request(paths, conf_path, subject),
        format!(
            "openssl x509 -req -sha256 -days {validity_days} -in {} -CA {} -CAkey {} -set_serial 0x{serial_hex} -out {} -extensions v3_req -extfile {}",
            quote(&paths.csr),
            quote(&ca.cert),
            quote(&ca.key),
            quote(&paths.cert),
            quote(ext_path),
        ),
    ]
    .join(" && ")
}

// genpkey writes PKCS#8 on every openssl release, which KeyPair::from_pem accepts.
fn genkey(key_path: &str, algorithm: KeyAlgorithm) -> String {
    match algorithm {
        KeyAlgorithm::Rsa2048 => format!(
            "openssl genpkey -algorithm RSA -pkeyopt rsa_keygen_bits:2048 -out {}",
            quote(key_path)
        ),
        KeyAlgorithm::EcdsaP256 => format!(
            "openssl genpkey -algorithm EC -pkeyopt ec_paramgen_curve:P-256 -out {}",
            quote(key_path)
        ),
    }
}

fn request(paths: &OpensslPaths, conf_path: &str, subject: &SubjectProfile) -> String {
    format!(
        "openssl req -new -key {} -out {} -subj {} -config {}",
        quote(&paths.key),
        quote(&paths.csr),
        quote(&subject.openssl_subject()),
        quote(conf_path),
    )
}

/// Single-quotes a value for `sh -c`.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
