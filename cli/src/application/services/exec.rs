//! Checked command execution and the timeouts every external call uses.

use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{CommandOutput, CommandRequest, CommandRunner};
use crate::domain::error::CommandError;

pub const TOOL_CHECK_TIMEOUT: Duration = Duration::from_secs(2);
pub const HOOK_TIMEOUT: Duration = Duration::from_secs(300);
pub const K3D_CREATE_TIMEOUT: Duration = Duration::from_secs(300);
pub const K3D_DELETE_TIMEOUT: Duration = Duration::from_secs(180);
pub const K3D_LIST_TIMEOUT: Duration = Duration::from_secs(5);
pub const KUBECONFIG_TIMEOUT: Duration = Duration::from_secs(10);
pub const DOCKER_TIMEOUT: Duration = Duration::from_secs(5);
pub const KUBECTL_TIMEOUT: Duration = Duration::from_secs(10);
pub const TILT_DOWN_TIMEOUT: Duration = Duration::from_secs(60);
pub const TILT_CI_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Run `request`, turning a non-zero exit into [`CommandError::Failed`].
///
/// # Errors
///
/// Returns an error if the command cannot be spawned, times out, or exits
/// unsuccessfully.
pub async fn run_checked(
    runner: &impl CommandRunner,
    request: &CommandRequest,
) -> Result<CommandOutput> {
    let output = runner.run(request).await?;
    if !output.success() {
        return Err(CommandError::Failed {
            context: request.context.clone(),
            code: output.code_or_signal(),
        }
        .into());
    }
    Ok(output)
}
