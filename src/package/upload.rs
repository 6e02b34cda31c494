//! Cookbook upload via a configured external command.
//!
//! The command is an argument vector; `{cookbook}`, `{path}` and `{version}`
//! inside any argument are substituted. No shell is involved.

use std::path::Path;
use tracing::info;

use crate::error::{CookforgeError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCommand {
    argv: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub cookbook: String,
    pub version: String,
    pub success: bool,
    pub error: Option<String>,
}

impl UploadCommand {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(CookforgeError::Config("upload_command must name a program".into()));
        }
        Ok(Self { argv })
    }

    /// The argument vector with placeholders filled in
    pub fn render(&self, cookbook: &str, path: &Path, version: &str) -> Vec<String> {
        let path = path.display().to_string();
        self.argv
            .iter()
            .map(|arg| {
                arg.replace("{cookbook}", cookbook)
                    .replace("{path}", &path)
                    .replace("{version}", version)
            })
            .collect()
    }

    pub async fn run(&self, cookbook: &str, path: &Path, version: &str) -> Result<UploadResult> {
        let argv = self.render(cookbook, path, version);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| CookforgeError::Config("upload_command is empty".into()))?;

        info!(cookbook = %cookbook, version = %version, program = %program, "uploading cookbook");

        let output = tokio::process::Command::new(program)
            .args(args)
            .current_dir(path)
            .output()
            .await
            .map_err(|e| CookforgeError::Upload(format!("failed to start {program}: {e}")))?;

        let success = output.status.success();
        let error = if success {
            None
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            Some(format!("{}\n{}", stderr.trim(), stdout.trim()).trim().to_string())
        };

        Ok(UploadResult {
            cookbook: cookbook.to_string(),
            version: version.to_string(),
            success,
            error,
        })
    }
}
