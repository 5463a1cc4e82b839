use super::TrustCommand;

pub(super) fn not_yet_supported(platform: &str) -> TrustCommand {
    TrustCommand::Unsupported {
        platform: platform.to_ascii_lowercase(),
        message: format!("{platform} is not yet supported for trusting certs."),
    }
}

pub(super) fn unknown_platform(platform: &str) -> TrustCommand {
    TrustCommand::Unsupported {
        platform: platform.to_string(),
        message: format!("{platform:?} is not a supported platform for trusting certs."),
    }
}
