use std::path::Path;
use std::sync::Arc;

use lando_tls::openssl::{self, OpensslPaths};
use lando_util::{
    AppContext, ComposeWriter, ContainerEngine, UtilityContainerRunner, YamlComposeWriter,
    SSL_MOUNT,
};
use tracing::{info, warn};

use super::{IssuanceBackend, LeafRequest, RootRequest};
use crate::fsutil::{restrict_mode, write_atomic, CERT_MODE, KEY_MODE};
use crate::layout::{CertLayout, MaterialPaths};
use crate::CertError;

pub const UTIL_NAME: &str = "ssl";
const EXEC_USER: &str = "root";

/// Runs the `openssl` command chain as root inside the util context, which
/// sees the host ssl dir at `/ssl`. The context is torn down after each call.
pub struct UtilContainerBackend<E, W = YamlComposeWriter> {
    runner: Arc<UtilityContainerRunner<E, W>>,
    app: AppContext,
    layout: CertLayout,
}

impl<E, W> UtilContainerBackend<E, W>
where
    E: ContainerEngine,
    W: ComposeWriter,
{
    pub fn new(runner: Arc<UtilityContainerRunner<E, W>>, app: AppContext) -> Self {
        let layout = CertLayout::new(runner.host().host_ssl_dir.clone());
        Self {
            runner,
            app,
            layout,
        }
    }

    pub fn runner(&self) -> &UtilityContainerRunner<E, W> {
        &self.runner
    }

    fn mounted(&self, path: &Path) -> Result<String, CertError> {
        self.layout.mounted_path(path, SSL_MOUNT).ok_or_else(|| {
            CertError::InvalidConfig(format!(
                "{} is outside the util host ssl dir {}",
                path.display(),
                self.layout.root().display()
            ))
        })
    }

    fn mounted_material(&self, paths: &MaterialPaths) -> Result<OpensslPaths, CertError> {
        Ok(OpensslPaths {
            key: self.mounted(&paths.key)?,
            csr: self.mounted(&paths.csr)?,
            cert: self.mounted(&paths.cert)?,
        })
    }

    async fn run_chain(&self, chain: String, key_path: &Path) -> Result<(), CertError> {
        let certs_dir = self.mounted(&self.layout.certs_dir())?;
        let script = format!("mkdir -p {} && {chain}", openssl::quote(&certs_dir));
        let command = vec!["sh".to_string(), "-c".to_string(), script];

        let result = self
            .runner
            .run_scoped(UTIL_NAME, &self.app, &command, Some(EXEC_USER))
            .await?;
        if !result.success() {
            return Err(CertError::SigningError(format!(
                "openssl exited with status {}: {}",
                result.exit_code,
                result.stderr.trim()
            )));
        }

        if let Err(error) = restrict_mode(key_path, KEY_MODE).await {
            warn!(key = %key_path.display(), %error, "could not restrict key permissions");
        }
        Ok(())
    }
}

impl<E, W> IssuanceBackend for UtilContainerBackend<E, W>
where
    E: ContainerEngine,
    W: ComposeWriter,
{
    async fn generate_root(&self, request: &RootRequest) -> Result<(), CertError> {
        let chain = openssl::root_command(
            &self.mounted_material(&request.paths)?,
            &self.mounted(&request.ssl_conf)?,
            &request.profile.subject,
            request.profile.validity_days,
            request.profile.key_algorithm,
        );
        write_atomic(&request.ssl_conf, openssl::SSL_CONF.as_bytes(), CERT_MODE)?;
        info!(container_user = EXEC_USER, "generating root CA inside util context");
        self.run_chain(chain, &request.paths.key).await
    }

    async fn issue_leaf(&self, request: &LeafRequest) -> Result<(), CertError> {
        let Some(first_name) = request.names.iter().next() else {
            return Err(CertError::SigningError(
                "at least one subject alternative name is required".to_string(),
            ));
        };
        let chain = openssl::leaf_command(
            &self.mounted_material(&request.paths)?,
            &self.mounted_material(&request.ca)?,
            &self.mounted(&request.ssl_conf)?,
            &self.mounted(&request.extensions)?,
            &request.profile.subject.with_common_name(first_name.clone()),
            request.profile.validity_days,
            &lando_tls::random_serial(),
            request.profile.key_algorithm,
        );
        write_atomic(&request.ssl_conf, openssl::SSL_CONF.as_bytes(), CERT_MODE)?;
        write_atomic(
            &request.extensions,
            openssl::render_leaf_extensions(&request.names).as_bytes(),
            CERT_MODE,
        )?;
        info!(leaf = %request.leaf_name, "issuing leaf certificate inside util context");
        self.run_chain(chain, &request.paths.key).await
    }
}
