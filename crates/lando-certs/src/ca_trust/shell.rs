use std::future::Future;
use std::io;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;

use crate::CertError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShellMode {
    /// Inherit the terminal so prompts such as `sudo` reach the user.
    #[default]
    Attach,
    Detach,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutcome {
    pub success: bool,
    pub stderr: String,
}

/// Executes host commands on behalf of CLI tasks.
pub trait Shell: Send + Sync {
    fn run(
        &self,
        tokens: &[String],
        mode: ShellMode,
    ) -> impl Future<Output = Result<ShellOutcome, CertError>> + Send;
}

impl<S: Shell> Shell for Arc<S> {
    fn run(
        &self,
        tokens: &[String],
        mode: ShellMode,
    ) -> impl Future<Output = Result<ShellOutcome, CertError>> + Send {
        self.as_ref().run(tokens, mode)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HostShell;

impl Shell for HostShell {
    async fn run(&self, tokens: &[String], mode: ShellMode) -> Result<ShellOutcome, CertError> {
        let Some((program, args)) = tokens.split_first() else {
            return Err(CertError::Shell("empty command".to_string()));
        };
        let mut command = Command::new(program);
        command.args(args);

        match mode {
            ShellMode::Attach => {
                let status = command
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await
                    .map_err(|error| spawn_error(program, error))?;
                Ok(ShellOutcome {
                    success: status.success(),
                    stderr: String::new(),
                })
            }
            ShellMode::Detach => {
                command
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                    .map_err(|error| spawn_error(program, error))?;
                Ok(ShellOutcome {
                    success: true,
                    stderr: String::new(),
                })
            }
        }
    }
}

fn spawn_error(program: &str, error: io::Error) -> CertError {
    if error.kind() == io::ErrorKind::NotFound {
        return CertError::Shell(format!("command '{program}' not found"));
    }
    CertError::Io(error)
}
