use std::path::PathBuf;

use lando_util::HostPlatform;
use tracing::{info, warn};

use super::{trust_command_for, Shell, ShellMode, TrustCommand};
use crate::ca::CertificateAuthority;
use crate::issuance::IssuanceBackend;
use crate::CertError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustOutcome {
    Trusted {
        certificate_path: PathBuf,
        command: Vec<String>,
    },
    Unsupported {
        platform: String,
        message: String,
    },
}

/// Ensures the root CA and asks the host to trust it.
///
/// Unsupported platforms come back as [`TrustOutcome::Unsupported`] without
/// running anything.
pub async fn trust_root_certificate<B, S>(
    ca: &CertificateAuthority<B>,
    shell: &S,
    platform: &HostPlatform,
) -> Result<TrustOutcome, CertError>
where
    B: IssuanceBackend,
    S: Shell,
{
    let record = ca.ensure_root_ca().await?;
    let command = trust_command_for(platform, &record.certificate_path);

    match command {
        TrustCommand::Unsupported { platform, message } => {
            warn!(%platform, "{message}");
            Ok(TrustOutcome::Unsupported { platform, message })
        }
        TrustCommand::Exec(tokens) => {
            info!(
                command = %tokens.join(" "),
                "about to add the root CA to the host trust store; you may be prompted for your password"
            );
            let outcome = shell.run(&tokens, ShellMode::Attach).await?;
            if !outcome.success {
                return Err(CertError::Shell(format!(
                    "trust command exited unsuccessfully: {}",
                    outcome.stderr.trim()
                )));
            }
            Ok(TrustOutcome::Trusted {
                certificate_path: record.certificate_path,
                command: tokens,
            })
        }
    }
}
