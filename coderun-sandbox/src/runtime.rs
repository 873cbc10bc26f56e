//! Runtime trait and implementations

mod process;

use crate::error::SandboxError;
use crate::types::{CommandSpec, RawResult};
use async_trait::async_trait;

pub use process::{ProcessRuntime, DEFAULT_DRAIN_GRACE};

/// Runs a resolved command to completion.
///
/// Process-level failures (spawn errors, timeouts, unreadable output) are
/// reported inside the [`RawResult`]; only malformed commands are errors.
#[async_trait]
pub trait Runtime: Send + Sync {
    async fn run(&self, spec: CommandSpec) -> Result<RawResult, SandboxError>;

    /// Get runtime name
    fn name(&self) -> &str;
}
