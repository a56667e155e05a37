//! Required executable checks.

use anyhow::Result;

use crate::application::ports::{CommandRequest, CommandRunner};
use crate::application::services::exec::TOOL_CHECK_TIMEOUT;
use crate::domain::config::ResolvedConfig;
use crate::domain::error::CommandError;

/// Tools `up` and `ci` need for `config`, in check order.
#[must_use]
pub fn required_tools(config: &ResolvedConfig) -> Vec<&'static str> {
    let mut tools = vec!["tilt"];
    if config.k3d_enabled() {
        tools.push("k3d");
    }
    if config.k3d_registry_enabled() {
        tools.push("docker");
    }
    if config.registry_advertise_enabled() {
        tools.push("kubectl");
    }
    tools
}

/// Whether `tool` resolves on `PATH`. Timeouts count as missing.
pub async fn tool_available(runner: &impl CommandRunner, tool: &str) -> bool {
    let request =
        CommandRequest::shell(&format!("command -v {tool}")).timeout(TOOL_CHECK_TIMEOUT);
    runner
        .run(&request)
        .await
        .is_ok_and(|output| output.success())
}

/// Fail unless every tool is available.
///
/// # Errors
///
/// Returns [`CommandError::MissingTools`] listing every missing tool.
pub async fn ensure_tools(runner: &impl CommandRunner, tools: &[&str]) -> Result<()> {
    let mut missing = Vec::new();
    for tool in tools {
        if !tool_available(runner, tool).await {
            missing.push((*tool).to_string());
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CommandError::MissingTools(missing).into())
    }
}
