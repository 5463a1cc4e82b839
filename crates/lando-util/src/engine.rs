use std::future::Future;
use std::sync::Arc;

use crate::descriptor::{RunOptions, UtilServiceDescriptor};
use crate::errors::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The container orchestration engine the util context runs on.
///
/// Implementations report failures as [`EngineError`]; the runner never
/// retries or suppresses them.
pub trait ContainerEngine: Send + Sync {
    fn start(
        &self,
        descriptor: &UtilServiceDescriptor,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn exec(
        &self,
        descriptor: &UtilServiceDescriptor,
        command: &[String],
        options: &RunOptions,
    ) -> impl Future<Output = Result<ExecResult, EngineError>> + Send;

    fn exists(
        &self,
        descriptor: &UtilServiceDescriptor,
    ) -> impl Future<Output = Result<bool, EngineError>> + Send;

    fn stop(
        &self,
        descriptor: &UtilServiceDescriptor,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn destroy(
        &self,
        descriptor: &UtilServiceDescriptor,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}

impl<E> ContainerEngine for Arc<E>
where
    E: ContainerEngine,
{
    fn start(
        &self,
        descriptor: &UtilServiceDescriptor,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        self.as_ref().start(descriptor)
    }

    fn exec(
        &self,
        descriptor: &UtilServiceDescriptor,
        command: &[String],
        options: &RunOptions,
    ) -> impl Future<Output = Result<ExecResult, EngineError>> + Send {
        self.as_ref().exec(descriptor, command, options)
    }

    fn exists(
        &self,
        descriptor: &UtilServiceDescriptor,
    ) -> impl Future<Output = Result<bool, EngineError>> + Send {
        self.as_ref().exists(descriptor)
    }

    fn stop(
        &self,
        descriptor: &UtilServiceDescriptor,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        self.as_ref().stop(descriptor)
    }

    fn destroy(
        &self,
        descriptor: &UtilServiceDescriptor,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        self.as_ref().destroy(descriptor)
    }
}
