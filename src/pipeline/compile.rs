//! The external document compiler.
//!
//! Compilation is the one stage this crate does not do itself. It sits
//! behind [`DocumentCompiler`] so chapter conversion can be exercised in
//! tests without pandoc installed.

use crate::error::Tex2DocxError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Environment variable naming the pandoc executable.
pub const PANDOC_ENV: &str = "PANDOC";

/// One compilation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// Assembled chapter source.
    pub input: PathBuf,
    /// Document to produce.
    pub output: PathBuf,
    /// Directories searched for `\includegraphics` targets.
    pub resource_paths: Vec<PathBuf>,
}

/// Turns an assembled chapter source into a DOCX document.
pub trait DocumentCompiler: Send + Sync {
    fn compile(&self, request: &CompileRequest) -> Result<(), Tex2DocxError>;
}

/// Runs `pandoc` as a child process.
#[derive(Debug, Clone)]
pub struct PandocCompiler {
    program: PathBuf,
}

impl PandocCompiler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program from the explicit setting, else `$PANDOC`, else `pandoc` on
    /// the `PATH`.
    pub fn locate(explicit: Option<&Path>) -> Self {
        match explicit {
            Some(path) => Self::new(path),
            None => Self::new(
                std::env::var_os(PANDOC_ENV)
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("pandoc")),
            ),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command-line arguments for one request.
    pub fn arguments(request: &CompileRequest) -> Result<Vec<OsString>, Tex2DocxError> {
        let joined = std::env::join_paths(&request.resource_paths)
            .map_err(|e| Tex2DocxError::Internal(format!("resource path: {e}")))?;
        let mut resource_arg = OsString::from("--resource-path=");
        resource_arg.push(joined);

        Ok(vec![
            request.input.clone().into_os_string(),
            "-f".into(),
            "latex".into(),
            "-t".into(),
            "docx".into(),
            "-o".into(),
            request.output.clone().into_os_string(),
            resource_arg,
            "--top-level-division=chapter".into(),
        ])
    }
}

impl Default for PandocCompiler {
    fn default() -> Self {
        Self::locate(None)
    }
}

impl DocumentCompiler for PandocCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<(), Tex2DocxError> {
        let args = Self::arguments(request)?;
        debug!("Running {} {:?}", self.program.display(), args);

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| Tex2DocxError::ConverterNotFound {
                program: self.program.display().to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(Tex2DocxError::ConversionFailed {
                input: request.input.clone(),
                detail,
            });
        }

        info!("Compiled {}", request.output.display());
        Ok(())
    }
}
