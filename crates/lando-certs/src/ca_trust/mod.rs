use std::fmt;
use std::path::Path;

use lando_util::HostPlatform;

mod macos;
mod shell;
mod task;
mod unsupported;

pub use shell::{HostShell, Shell, ShellMode, ShellOutcome};
pub use task::{trust_root_certificate, TrustOutcome};

/// What to run to trust a root certificate on a given host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustCommand {
    Exec(Vec<String>),
    /// A descriptive echo for platforms without an integration.
    Unsupported { platform: String, message: String },
}

impl TrustCommand {
    pub fn tokens(&self) -> Vec<String> {
        match self {
            Self::Exec(tokens) => tokens.clone(),
            Self::Unsupported { message, .. } => vec!["echo".to_string(), message.clone()],
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Exec(_))
    }
}

impl fmt::Display for TrustCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens().join(" "))
    }
}

/// Pure: never touches the host and never fails, whatever `platform` holds.
pub fn build_trust_command(platform: &str, certificate_path: &Path) -> TrustCommand {
    trust_command_for(&HostPlatform::parse(platform), certificate_path)
}

pub fn trust_command_for(platform: &HostPlatform, certificate_path: &Path) -> TrustCommand {
    match platform {
        HostPlatform::Darwin => macos::keychain_trust_command(certificate_path),
        HostPlatform::Linux => unsupported::not_yet_supported("Linux"),
        HostPlatform::Windows => unsupported::not_yet_supported("Windows"),
        HostPlatform::Other(name) => unsupported::unknown_platform(name),
    }
}
