use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::errors::UtilError;

pub const COMPOSE_VERSION: &str = "3.2";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeFile {
    pub version: String,
    pub services: BTreeMap<String, ServiceDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub image: String,
    pub environment: BTreeMap<String, String>,
    pub command: Vec<String>,
    pub entrypoint: String,
    pub labels: BTreeMap<String, String>,
    pub volumes: Vec<String>,
}

/// Persists a compose definition and returns the path it landed at.
pub trait ComposeWriter: Send + Sync {
    fn write(
        &self,
        path: &Path,
        file: &ComposeFile,
    ) -> impl Future<Output = Result<PathBuf, UtilError>> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlComposeWriter;

impl ComposeWriter for YamlComposeWriter {
    async fn write(&self, path: &Path, file: &ComposeFile) -> Result<PathBuf, UtilError> {
        let rendered =
            serde_yaml::to_string(file).map_err(|error| UtilError::Compose(error.to_string()))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Concurrent describes share the file; rename keeps readers off half-written YAML.
        let staged = path.with_extension(format!(
            "yml.{}.{}",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&staged, rendered).await?;
        if let Err(error) = tokio::fs::rename(&staged, path).await {
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(error.into());
        }
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{ComposeFile, ComposeWriter, ServiceDefinition, YamlComposeWriter};

    #[tokio::test]
    async fn yaml_writer_creates_parent_and_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("util").join("util.yml");
        let mut services = BTreeMap::new();
        services.insert(
            "util".to_string(),
            ServiceDefinition {
                image: "devwithlando/util:stable".to_string(),
                environment: BTreeMap::from([("LANDO".to_string(), "ON".to_string())]),
                command: vec!["tail".to_string(), "-f".to_string(), "/dev/null".to_string()],
                entrypoint: "/lando-entrypoint.sh".to_string(),
                labels: BTreeMap::new(),
                volumes: vec!["/host/certs:/ssl".to_string()],
            },
        );
        let file = ComposeFile {
            version: "3.2".to_string(),
            services,
        };

        let written = YamlComposeWriter
            .write(&path, &file)
            .await
            .expect("write compose");
        assert_eq!(written, path);

        let raw = std::fs::read_to_string(&path).expect("read compose");
        let parsed: ComposeFile = serde_yaml::from_str(&raw).expect("parse compose");
        assert_eq!(parsed, file);
        let leftovers = std::fs::read_dir(path.parent().expect("parent"))
            .expect("list dir")
            .count();
        assert_eq!(leftovers, 1);
    }
}
