//! Command implementations

pub mod ci;
pub mod down;
pub mod env;
pub mod profiles;
pub mod status;
pub mod up;
pub mod version;

use clap::Args;

use crate::app::AppContext;
use crate::application::services::instance_up::PrepareOptions;

/// Arguments shared by commands that resolve an instance.
#[derive(Args, Debug, Clone, Default)]
pub struct InstanceArgs {
    /// Instance name (reuses the lockfile name, or generates one, when omitted)
    pub name: Option<String>,

    /// Regenerate ports and allow switching profiles
    #[arg(short, long)]
    pub force: bool,

    /// Use named profile (overrides SILO_PROFILE)
    #[arg(short, long)]
    pub profile: Option<String>,
}

impl InstanceArgs {
    /// Borrow these arguments as service options.
    #[must_use]
    pub fn options<'a>(&'a self, app: &'a AppContext) -> PrepareOptions<'a> {
        PrepareOptions {
            name: self.name.as_deref(),
            profile: self.profile.as_deref(),
            profile_env: app.env.profile.as_deref(),
            force: self.force,
        }
    }
}
