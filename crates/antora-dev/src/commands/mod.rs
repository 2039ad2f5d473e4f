//! Task implementations, one per subcommand.

pub mod build;
pub mod dev;
pub mod open;
pub mod preview;
pub mod serve;
pub mod watch;

use antora_dev_generator::SiteGenerator;
use antora_dev_playbook::PreparedPlaybook;
use antora_dev_server::{PreviewServerConfig, ReloadHub};

/// Everything the tasks share for one invocation.
pub struct TaskContext {
    /// Playbook for this run; dropping it removes a derived playbook
    pub playbook: PreparedPlaybook,

    pub generator: SiteGenerator,

    /// Reload notifications for connected browsers
    pub hub: ReloadHub,

    /// Server settings; name and root are filled in from the playbook
    pub server: PreviewServerConfig,
}
