use std::process::Output;

use tokio::process::Command;
use tracing::debug;

use crate::descriptor::{ExecMode, RunOptions, UtilServiceDescriptor, UTIL_SERVICE};
use crate::engine::{ContainerEngine, ExecResult};
use crate::errors::EngineError;

/// Drives the util context through the `docker` CLI and its compose plugin.
#[derive(Debug, Clone)]
pub struct ComposeCliEngine {
    binary: String,
}

impl Default for ComposeCliEngine {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ComposeCliEngine {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn compose_args(descriptor: &UtilServiceDescriptor) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "--project-name".to_string(),
            descriptor.project_name.clone(),
        ];
        for file in &descriptor.compose_files {
            args.push("--file".to_string());
            args.push(file.display().to_string());
        }
        args
    }

    fn service(descriptor: &UtilServiceDescriptor) -> String {
        descriptor
            .run_options
            .services
            .first()
            .cloned()
            .unwrap_or_else(|| UTIL_SERVICE.to_string())
    }

    /// Exec goes through compose so the container is found by service, not by
    /// a name whose separator differs between compose releases.
    fn exec_args(
        descriptor: &UtilServiceDescriptor,
        command: &[String],
        options: &RunOptions,
    ) -> Vec<String> {
        let mut args = Self::compose_args(descriptor);
        args.extend([
            "exec".to_string(),
            "--no-TTY".to_string(),
            "--user".to_string(),
            options.user.clone(),
        ]);
        if options.mode == ExecMode::Detach {
            args.push("--detach".to_string());
        }
        args.push(Self::service(descriptor));
        args.extend(command.iter().cloned());
        args
    }

    fn exists_args(descriptor: &UtilServiceDescriptor) -> Vec<String> {
        let mut args = Self::compose_args(descriptor);
        args.extend([
            "ps".to_string(),
            "--all".to_string(),
            "--quiet".to_string(),
            Self::service(descriptor),
        ]);
        args
    }

    async fn invoke(&self, args: &[String]) -> std::io::Result<Output> {
        debug!(binary = %self.binary, ?args, "invoking container cli");
        Command::new(&self.binary).args(args).output().await
    }

    async fn invoke_checked(
        &self,
        args: &[String],
        wrap: impl Fn(String) -> EngineError,
    ) -> Result<Output, EngineError> {
        let output = self.invoke(args).await.map_err(|error| wrap(error.to_string()))?;
        if !output.status.success() {
            return Err(wrap(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }
        Ok(output)
    }
}

impl ContainerEngine for ComposeCliEngine {
    async fn start(&self, descriptor: &UtilServiceDescriptor) -> Result<(), EngineError> {
        let mut args = Self::compose_args(descriptor);
        args.extend(["up".to_string(), "--detach".to_string()]);
        args.extend(descriptor.run_options.services.iter().cloned());
        self.invoke_checked(&args, |detail| EngineError::Start {
            container: descriptor.container_id.clone(),
            detail,
        })
        .await?;
        Ok(())
    }

    async fn exec(
        &self,
        descriptor: &UtilServiceDescriptor,
        command: &[String],
        options: &RunOptions,
    ) -> Result<ExecResult, EngineError> {
        let args = Self::exec_args(descriptor, command, options);
        let output = self.invoke(&args).await.map_err(|error| EngineError::Exec {
            container: descriptor.container_id.clone(),
            detail: error.to_string(),
        })?;
        Ok(ExecResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn exists(&self, descriptor: &UtilServiceDescriptor) -> Result<bool, EngineError> {
        let args = Self::exists_args(descriptor);
        let output = self
            .invoke_checked(&args, |detail| EngineError::Exists {
                container: descriptor.container_id.clone(),
                detail,
            })
            .await?;
        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }

    async fn stop(&self, descriptor: &UtilServiceDescriptor) -> Result<(), EngineError> {
        let mut args = Self::compose_args(descriptor);
        args.push("stop".to_string());
        self.invoke_checked(&args, |detail| EngineError::Stop {
            container: descriptor.container_id.clone(),
            detail,
        })
        .await?;
        Ok(())
    }

    async fn destroy(&self, descriptor: &UtilServiceDescriptor) -> Result<(), EngineError> {
        let mut args = Self::compose_args(descriptor);
        args.extend(["rm".to_string(), "--force".to_string(), "--volumes".to_string()]);
        self.invoke_checked(&args, |detail| EngineError::Destroy {
            container: descriptor.container_id.clone(),
            detail,
        })
        .await?;
        Ok(())
    }
}
