mod errors;
pub mod inspect;
pub mod material;
pub mod openssl;

pub use errors::TlsError;
pub use inspect::{
    key_matches_certificate, summarize_pem, verify_leaf, CertificateSummary, LeafVerdict,
};
pub use material::{
    check_ca_material, generate_root, normalize_names, random_serial, sign_leaf,
    validity_window, GeneratedMaterial, KeyAlgorithm, LeafProfile, RootProfile, SubjectProfile,
    SECONDS_PER_DAY,
};
