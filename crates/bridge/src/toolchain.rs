//! The external build toolchain that compiles the contracts.

use {
    anyhow::{Result, bail},
    std::{
        io,
        path::PathBuf,
        process::{ExitStatus, Stdio},
    },
    tokio::process::Command,
};

#[derive(Debug, thiserror::Error)]
pub enum BuildFailure {
    #[error("failed to start `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` exited with {status}")]
    Exit {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Rebuild: Send + Sync {
    /// Compiles the contracts. Returns once the artifacts are written.
    async fn rebuild(&self) -> Result<(), BuildFailure>;
}

pub struct Toolchain {
    program: String,
    args: Vec<String>,
    dir: PathBuf,
}

impl Toolchain {
    /// Splits `command` on whitespace into program and arguments, run in
    /// `dir`.
    pub fn new(command: &str, dir: impl Into<PathBuf>) -> Result<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let Some(program) = words.next() else {
            bail!("empty build command");
        };
        Ok(Self {
            program,
            args: words.collect(),
            dir: dir.into(),
        })
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait::async_trait]
impl Rebuild for Toolchain {
    async fn rebuild(&self) -> Result<(), BuildFailure> {
        let command = self.command_line();
        tracing::info!(%command, dir = %self.dir.display(), "compiling contracts");
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| BuildFailure::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            tracing::debug!(%stdout, "build output");
        }
        if !output.status.success() {
            return Err(BuildFailure::Exit {
                command,
                status: output.status,
                stderr: stderr.into_owned(),
            });
        }
        if !stderr.trim().is_empty() {
            tracing::warn!(%stderr, "build succeeded with diagnostics");
        }
        Ok(())
    }
}
