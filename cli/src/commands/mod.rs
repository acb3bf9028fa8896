mod helpers;
mod onboard;
mod plan;
mod progress;
mod tasks;

pub(crate) use onboard::{cmd_onboard, cmd_profile};
pub(crate) use plan::{cmd_plan, cmd_templates};
pub(crate) use progress::{cmd_log, cmd_progress};
pub(crate) use tasks::{cmd_done, cmd_tasks};
