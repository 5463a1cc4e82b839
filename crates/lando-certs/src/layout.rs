use std::path::{Path, PathBuf};

pub const CERTS_DIR: &str = "certs";
pub const SSL_CONF: &str = "ssl.conf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub csr: PathBuf,
}

/// On-disk layout under the ssl root:
/// `certs/<name>.crt`, `<name>.key`, `<name>.csr`, `ssl.conf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertLayout {
    root: PathBuf,
}

impl CertLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn certs_dir(&self) -> PathBuf {
        self.root.join(CERTS_DIR)
    }

    pub fn material(&self, name: &str) -> MaterialPaths {
        MaterialPaths {
            cert: self.certs_dir().join(format!("{name}.crt")),
            key: self.root.join(format!("{name}.key")),
            csr: self.root.join(format!("{name}.csr")),
        }
    }

    pub fn ssl_conf(&self) -> PathBuf {
        self.root.join(SSL_CONF)
    }

    pub fn leaf_extensions(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.ext"))
    }

    /// Re-roots a host path under `mount`, or `None` if it lies outside the ssl root.
    pub fn mounted_path(&self, path: &Path, mount: &str) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut mounted = mount.trim_end_matches('/').to_string();
        for component in relative.components() {
            mounted.push('/');
            mounted.push_str(component.as_os_str().to_str()?);
        }
        Some(mounted)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::CertLayout;

    #[test]
    fn material_paths_follow_ssl_root_convention() {
        let layout = CertLayout::new("/home/dev/.lando/certs");
        let paths = layout.material("landoCA");
        assert_eq!(paths.cert, Path::new("/home/dev/.lando/certs/certs/landoCA.crt"));
        assert_eq!(paths.key, Path::new("/home/dev/.lando/certs/landoCA.key"));
        assert_eq!(paths.csr, Path::new("/home/dev/.lando/certs/landoCA.csr"));
        assert_eq!(layout.ssl_conf(), Path::new("/home/dev/.lando/certs/ssl.conf"));
    }

    #[test]
    fn mounted_path_rebases_under_mount() {
        let layout = CertLayout::new("/home/dev/.lando/certs");
        let paths = layout.material("landoProxy");
        assert_eq!(
            layout.mounted_path(&paths.cert, "/ssl").as_deref(),
            Some("/ssl/certs/landoProxy.crt")
        );
        assert_eq!(layout.mounted_path(Path::new("/etc/passwd"), "/ssl"), None);
    }
}
