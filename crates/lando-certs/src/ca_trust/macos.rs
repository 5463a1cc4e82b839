use std::path::Path;

use super::TrustCommand;

const SYSTEM_KEYCHAIN: &str = "/Library/Keychains/System.keychain";

pub(super) fn keychain_trust_command(certificate_path: &Path) -> TrustCommand {
    TrustCommand::Exec(vec![
        "sudo".to_string(),
        "security".to_string(),
        "add-trusted-cert".to_string(),
        "-d".to_string(),
        "-r".to_string(),
        "trustRoot".to_string(),
        "-k".to_string(),
        SYSTEM_KEYCHAIN.to_string(),
        certificate_path.display().to_string(),
    ])
}
