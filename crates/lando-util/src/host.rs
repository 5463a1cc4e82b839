use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_UTIL_IMAGE: &str = "devwithlando/util:stable";
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostPlatform {
    Darwin,
    Linux,
    Windows,
    Other(String),
}

impl HostPlatform {
    /// Accepts both the `darwin`/`win32` spelling and Rust's `macos`/`windows`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "darwin" | "macos" => Self::Darwin,
            "linux" => Self::Linux,
            "win32" | "windows" => Self::Windows,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn current() -> Self {
        Self::parse(std::env::consts::OS)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Darwin => "darwin",
            Self::Linux => "linux",
            Self::Windows => "win32",
            Self::Other(name) => name,
        }
    }

    /// User and group setup inside the util image races its entrypoint on Linux hosts.
    pub fn needs_settle_delay(&self) -> bool {
        matches!(self, Self::Linux)
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host facts the util context needs for permission alignment and mounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    pub platform: HostPlatform,
    pub engine_uid: u32,
    pub engine_gid: u32,
    pub engine_remote_ip: String,
    pub user_conf_root: PathBuf,
    pub engine_scripts_dir: PathBuf,
    pub engine_home: PathBuf,
    pub host_ssl_dir: PathBuf,
    pub settle_delay: Duration,
    pub image: String,
}

impl HostEnvironment {
    pub fn detect(user_conf_root: impl Into<PathBuf>) -> Self {
        let user_conf_root = user_conf_root.into();
        let (engine_uid, engine_gid) = engine_identity();
        let engine_home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| user_conf_root.clone());
        Self {
            platform: HostPlatform::current(),
            engine_uid,
            engine_gid,
            engine_remote_ip: "host.docker.internal".to_string(),
            engine_scripts_dir: user_conf_root.join("scripts"),
            host_ssl_dir: user_conf_root.join("certs"),
            engine_home,
            user_conf_root,
            settle_delay: DEFAULT_SETTLE_DELAY,
            image: DEFAULT_UTIL_IMAGE.to_string(),
        }
    }

    pub fn util_compose_dir(&self) -> PathBuf {
        self.user_conf_root.join("util")
    }
}

#[cfg(unix)]
fn engine_identity() -> (u32, u32) {
    // SAFETY: getuid/getgid have no preconditions and cannot fail.
    unsafe { (libc::getuid(), libc::getgid()) }
}

#[cfg(not(unix))]
fn engine_identity() -> (u32, u32) {
    (1000, 1000)
}
