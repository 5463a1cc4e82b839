use std::collections::BTreeSet;
use std::future::Future;
use std::path::PathBuf;

use lando_tls::{LeafProfile, RootProfile};

use crate::layout::MaterialPaths;
use crate::CertError;

mod in_process;
mod util_container;

pub use in_process::InProcessBackend;
pub use util_container::UtilContainerBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRequest {
    pub paths: MaterialPaths,
    pub ssl_conf: PathBuf,
    pub profile: RootProfile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafRequest {
    pub leaf_name: String,
    pub paths: MaterialPaths,
    pub ca: MaterialPaths,
    pub ssl_conf: PathBuf,
    pub extensions: PathBuf,
    pub names: BTreeSet<String>,
    pub profile: LeafProfile,
}

/// Produces key and certificate files at the requested paths.
///
/// Backends only write; the authority reads everything back and verifies it
/// before handing out a record.
pub trait IssuanceBackend: Send + Sync {
    fn generate_root(
        &self,
        request: &RootRequest,
    ) -> impl Future<Output = Result<(), CertError>> + Send;

    fn issue_leaf(&self, request: &LeafRequest)
        -> impl Future<Output = Result<(), CertError>> + Send;
}
