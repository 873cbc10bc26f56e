//! Staging source code into the working directory

use crate::error::SandboxError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Prefix for names derived from the code fingerprint
const STAGED_PREFIX: &str = "tmp_code_";

/// Hex characters of the fingerprint used in staged names
const FINGERPRINT_LEN: usize = 32;

/// A source file ready to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    /// Whether the stager wrote this file (and may delete it)
    pub written: bool,
    /// Per-request directory holding a generated file, removed on release
    pub scratch_dir: Option<PathBuf>,
}

/// Stable fingerprint of a code text
pub fn fingerprint(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// File name for a request, derived from the code when none is given
pub fn staged_file_name(code: Option<&str>, filename: Option<&str>, extension: &str) -> String {
    let suffix = format!(".{}", extension);
    match filename.map(str::trim).filter(|f| !f.is_empty()) {
        Some(name) if name.ends_with(&suffix) => name.to_string(),
        Some(name) => format!("{}{}", name, suffix),
        None => format!(
            "{}{}{}",
            STAGED_PREFIX,
            fingerprint(code.unwrap_or_default()),
            suffix
        ),
    }
}

/// Writes code to disk before execution and removes it afterwards
#[derive(Debug, Clone, Default)]
pub struct CodeStager;

impl CodeStager {
    pub fn new() -> Self {
        Self
    }

    /// Materialize the code as a file under `work_dir`.
    ///
    /// Generated names go into a `scope` subdirectory so concurrent requests
    /// with the same code never share a file. When only a filename is given
    /// the file is expected to exist already and is executed in place.
    pub async fn stage(
        &self,
        scope: &str,
        code: Option<&str>,
        filename: Option<&str>,
        work_dir: &Path,
        extension: &str,
    ) -> Result<StagedFile, SandboxError> {
        let name = staged_file_name(code, filename, extension);
        let generated = filename.map_or(true, |f| f.trim().is_empty());
        let scratch_dir = generated.then(|| work_dir.join(scope));
        let path = scratch_dir.as_deref().unwrap_or(work_dir).join(name);

        let Some(code) = code else {
            if tokio::fs::metadata(&path).await.is_err() {
                return Err(SandboxError::InvalidRequest(format!(
                    "no code given and {} does not exist",
                    path.display()
                )));
            }
            return Ok(StagedFile {
                path,
                written: false,
                scratch_dir: None,
            });
        };

        let parent = path.parent().unwrap_or(work_dir);
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| SandboxError::Staging {
                path: parent.to_path_buf(),
                source,
            })?;

        // Rust strings are UTF-8, written as-is regardless of platform locale
        tokio::fs::write(&path, code.as_bytes())
            .await
            .map_err(|source| SandboxError::Staging {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(path = %path.display(), bytes = code.len(), "Staged code");

        Ok(StagedFile {
            path,
            written: true,
            scratch_dir,
        })
    }

    /// Delete a staged file unless it should be kept. Failures are logged.
    pub async fn release(&self, staged: &StagedFile, keep_temp_files: bool) {
        if keep_temp_files || !staged.written {
            return;
        }
        match tokio::fs::remove_file(&staged.path).await {
            Ok(()) => tracing::debug!(path = %staged.path.display(), "Removed staged file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %staged.path.display(),
                error = %e,
                "Failed to clean up staged file"
            ),
        }
        if let Some(dir) = &staged.scratch_dir {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    path = %dir.display(),
                    error = %e,
                    "Failed to clean up staging directory"
                ),
            }
        }
    }
}
