mod ca;
mod ca_trust;
mod config;
mod errors;
mod fsutil;
mod issuance;
mod layout;

pub use ca::{CaRecord, CertificateAuthority, LeafCertRecord};
pub use ca_trust::{
    build_trust_command, trust_command_for, trust_root_certificate, HostShell, Shell, ShellMode,
    ShellOutcome, TrustCommand, TrustOutcome,
};
pub use config::{CertsConfig, SubjectConfig, MIN_CA_VALIDITY_DAYS};
pub use errors::CertError;
pub use issuance::{
    InProcessBackend, IssuanceBackend, LeafRequest, RootRequest, UtilContainerBackend,
};
pub use layout::{CertLayout, MaterialPaths};

pub use lando_probe::{scan_urls, ProbeConfig, ReadinessProber, ReadinessResult};
pub use lando_tls::{CertificateSummary, KeyAlgorithm};
pub use lando_util::{
    AppContext, ComposeCliEngine, HostEnvironment, HostPlatform, UtilityContainerRunner,
};

pub use lando_probe as probe;
pub use lando_tls as tls;
pub use lando_util as util;
