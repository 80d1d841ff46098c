//! Compiler invocation.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable carrying the intermediate directory to the compiler.
pub const BUILD_DIR_VAR: &str = "DEMOFORGE_BUILD_DIR";

/// Errors that can occur while compiling. All of them abort the build.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("No compiler command configured")]
    EmptyCommand,

    #[error("Failed to start `{command}`: {message}")]
    SpawnError { command: String, message: String },

    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: String },
}

/// Trait for compilers that turn every source script into the intermediate
/// directory in one batch.
pub trait Compile: Send + Sync {
    /// Compile all sources, blocking until done.
    ///
    /// Either every source compiled or an error is returned.
    fn compile(&self, out_dir: &Path) -> Result<(), CompileError>;
}

/// Compiler run as an external command (`tsc` by default).
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
}

impl CommandCompiler {
    /// Create a compiler from a command line (program followed by arguments).
    pub fn new(command: &[String], cwd: impl Into<PathBuf>) -> Result<Self, CompileError> {
        let (program, args) = command.split_first().ok_or(CompileError::EmptyCommand)?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            cwd: cwd.into(),
        })
    }

    /// The command line as displayed in logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Compile for CommandCompiler {
    fn compile(&self, out_dir: &Path) -> Result<(), CompileError> {
        let command = self.display();
        tracing::debug!("Running `{}` in {}", command, self.cwd.display());

        let status = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.cwd)
            .env(BUILD_DIR_VAR, out_dir)
            .status()
            .map_err(|e| CompileError::SpawnError {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(CompileError::Failed {
                command,
                status: status.to_string(),
            });
        }

        Ok(())
    }
}
