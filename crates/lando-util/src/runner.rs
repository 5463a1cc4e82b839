use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::compose::{
    ComposeFile, ComposeWriter, ServiceDefinition, YamlComposeWriter, COMPOSE_VERSION,
};
use crate::descriptor::{AppContext, UtilServiceDescriptor, UTIL_SERVICE};
use crate::engine::{ContainerEngine, ExecResult};
use crate::errors::UtilError;
use crate::host::{HostEnvironment, HostPlatform};

pub const HELPER_SCRIPTS: [&str; 3] = ["lando-entrypoint.sh", "user-perms.sh", "load-keys.sh"];
pub const SSL_MOUNT: &str = "/ssl";
pub const APP_MOUNT: &str = "/app";
const COMPOSE_FILE_NAME: &str = "util.yml";

/// Runs commands inside the ephemeral util context.
///
/// Start-then-exec, and stop-then-destroy, are serialized per container id so
/// an exec never races a teardown of the same context.
pub struct UtilityContainerRunner<E, W = YamlComposeWriter> {
    engine: E,
    writer: W,
    host: HostEnvironment,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<E> UtilityContainerRunner<E, YamlComposeWriter>
where
    E: ContainerEngine,
{
    pub fn new(engine: E, host: HostEnvironment) -> Self {
        Self::with_writer(engine, YamlComposeWriter, host)
    }
}

impl<E, W> UtilityContainerRunner<E, W>
where
    E: ContainerEngine,
    W: ComposeWriter,
{
    pub fn with_writer(engine: E, writer: W, host: HostEnvironment) -> Self {
        Self {
            engine,
            writer,
            host,
            locks: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn host(&self) -> &HostEnvironment {
        &self.host
    }

    /// Marks the helper scripts executable and rewrites the util compose file.
    pub async fn describe(
        &self,
        name: &str,
        app: &AppContext,
    ) -> Result<UtilServiceDescriptor, UtilError> {
        for script in HELPER_SCRIPTS {
            mark_executable(&self.host.engine_scripts_dir.join(script)).await?;
        }

        let compose = util_compose_file(&self.host, app);
        let target = self.host.util_compose_dir().join(COMPOSE_FILE_NAME);
        let written = self.writer.write(&target, &compose).await?;
        debug!(name, app = %app.name, path = %written.display(), "wrote util compose file");

        Ok(UtilServiceDescriptor::new(name, written))
    }

    pub async fn run(
        &self,
        name: &str,
        app: &AppContext,
        command: &[String],
        user: Option<&str>,
    ) -> Result<ExecResult, UtilError> {
        let descriptor = self.describe(name, app).await?;
        let descriptor = apply_user(descriptor, user);
        let lock = self.lock_for(&descriptor.container_id);
        let _guard = lock.lock().await;
        self.start_and_exec(&descriptor, command).await
    }

    /// Stops and destroys the context if it exists. A no-op otherwise.
    pub async fn kill(&self, name: &str, app: &AppContext) -> Result<(), UtilError> {
        let descriptor = self.describe(name, app).await?;
        let lock = self.lock_for(&descriptor.container_id);
        let _guard = lock.lock().await;
        self.release(&descriptor).await
    }

    /// Runs one command and always releases the context afterwards, holding the
    /// per-container lock across both so no other caller sees it half torn down.
    pub async fn run_scoped(
        &self,
        name: &str,
        app: &AppContext,
        command: &[String],
        user: Option<&str>,
    ) -> Result<ExecResult, UtilError> {
        let descriptor = apply_user(self.describe(name, app).await?, user);
        let lock = self.lock_for(&descriptor.container_id);
        let _guard = lock.lock().await;

        let outcome = self.start_and_exec(&descriptor, command).await;
        let released = self.release(&descriptor).await;
        match (outcome, released) {
            (Ok(result), Ok(())) => Ok(result),
            (Ok(_), Err(error)) => Err(error),
            (Err(error), Ok(())) => Err(error),
            (Err(error), Err(release_error)) => {
                warn!(
                    container = %descriptor.container_id,
                    error = %release_error,
                    "failed to release util context after a failed run"
                );
                Err(error)
            }
        }
    }

    async fn start_and_exec(
        &self,
        descriptor: &UtilServiceDescriptor,
        command: &[String],
    ) -> Result<ExecResult, UtilError> {
        info!(
            container = %descriptor.container_id,
            user = %descriptor.run_options.user,
            "starting util context"
        );
        self.engine.start(descriptor).await?;

        if self.host.platform.needs_settle_delay() && !self.host.settle_delay.is_zero() {
            tokio::time::sleep(self.host.settle_delay).await;
        }

        let result = self
            .engine
            .exec(descriptor, command, &descriptor.run_options)
            .await?;
        debug!(
            container = %descriptor.container_id,
            exit_code = result.exit_code,
            "util command finished"
        );
        Ok(result)
    }

    async fn release(&self, descriptor: &UtilServiceDescriptor) -> Result<(), UtilError> {
        if !self.engine.exists(descriptor).await? {
            debug!(container = %descriptor.container_id, "util context not present");
            return Ok(());
        }
        info!(container = %descriptor.container_id, "stopping util context");
        self.engine.stop(descriptor).await?;
        self.engine.destroy(descriptor).await?;
        Ok(())
    }

    fn lock_for(&self, container_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(container_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}

fn apply_user(descriptor: UtilServiceDescriptor, user: Option<&str>) -> UtilServiceDescriptor {
    match user {
        Some(user) => descriptor.with_user(user),
        None => descriptor,
    }
}

/// Builds the compose definition for the util service from host facts.
pub fn util_compose_file(host: &HostEnvironment, app: &AppContext) -> ComposeFile {
    let share_mode = if host.platform == HostPlatform::Darwin {
        ":delegated"
    } else {
        ""
    };

    let mut volumes: Vec<String> = HELPER_SCRIPTS
        .iter()
        .map(|script| {
            format!(
                "{}:/{script}",
                host.engine_scripts_dir.join(script).display()
            )
        })
        .collect();
    volumes.push(format!("{}:{SSL_MOUNT}", host.host_ssl_dir.display()));
    volumes.push(format!("{}:/user{share_mode}", host.engine_home.display()));
    if let Some(root) = &app.root {
        volumes.push(format!("{}:{APP_MOUNT}{share_mode}", root.display()));
    }

    let environment = BTreeMap::from([
        ("LANDO".to_string(), "ON".to_string()),
        ("LANDO_HOST_OS".to_string(), host.platform.as_str().to_string()),
        ("LANDO_HOST_UID".to_string(), host.engine_uid.to_string()),
        ("LANDO_HOST_GID".to_string(), host.engine_gid.to_string()),
        ("LANDO_HOST_IP".to_string(), host.engine_remote_ip.clone()),
        ("LANDO_WEBROOT_USER".to_string(), "www-data".to_string()),
        ("LANDO_WEBROOT_GROUP".to_string(), "www-data".to_string()),
        ("LANDO_WEBROOT_UID".to_string(), "33".to_string()),
        ("LANDO_WEBROOT_GID".to_string(), "33".to_string()),
        ("LANDO_MOUNT".to_string(), APP_MOUNT.to_string()),
        ("COLUMNS".to_string(), "256".to_string()),
        ("TERM".to_string(), "xterm".to_string()),
    ]);

    let labels = BTreeMap::from([
        ("io.lando.container".to_string(), "TRUE".to_string()),
        ("io.lando.service-container".to_string(), "TRUE".to_string()),
    ]);

    let service = ServiceDefinition {
        image: host.image.clone(),
        environment,
        command: vec!["tail".to_string(), "-f".to_string(), "/dev/null".to_string()],
        entrypoint: "/lando-entrypoint.sh".to_string(),
        labels,
        volumes,
    };

    ComposeFile {
        version: COMPOSE_VERSION.to_string(),
        services: BTreeMap::from([(UTIL_SERVICE.to_string(), service)]),
    }
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> Result<(), UtilError> {
    use std::os::unix::fs::PermissionsExt;

    match tokio::fs::metadata(path).await {
        Ok(_) => {}
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Err(UtilError::MissingScript {
                path: path.to_path_buf(),
            });
        }
        Err(error) => return Err(error.into()),
    }
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn mark_executable(path: &Path) -> Result<(), UtilError> {
    if !tokio::fs::try_exists(path).await? {
        return Err(UtilError::MissingScript {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
