mod cli_engine;
mod compose;
mod descriptor;
mod engine;
mod errors;
mod host;
mod init;
mod runner;

pub use cli_engine::ComposeCliEngine;
pub use compose::{
    ComposeFile, ComposeWriter, ServiceDefinition, YamlComposeWriter, COMPOSE_VERSION,
};
pub use descriptor::{
    composify, AppContext, ExecMode, RunOptions, UtilServiceDescriptor, DEFAULT_EXEC_USER,
    UTIL_SERVICE,
};
pub use engine::{ContainerEngine, ExecResult};
pub use errors::{EngineError, UtilError};
pub use host::{HostEnvironment, HostPlatform, DEFAULT_SETTLE_DELAY, DEFAULT_UTIL_IMAGE};
pub use init::{
    create_key_command, ensure_keys_dir, InitMethod, InitMethodId, InitRegistry, KEYS_DIR,
};
pub use runner::{util_compose_file, UtilityContainerRunner, APP_MOUNT, HELPER_SCRIPTS, SSL_MOUNT};
