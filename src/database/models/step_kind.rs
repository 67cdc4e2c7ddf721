use sea_orm::{sea_query::StringLen, DeriveActiveEnum};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::database::models::run_status::RunStatus;

/// Identifies one step of the pipeline.
///
/// The canonical execution order is [`StepKind::SEQUENCE`]; a run executes a
/// prefix of it, stopping at the first step that does not succeed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum StepKind {
    /// Snapshot the project directory into the fresh sandbox.
    #[sea_orm(string_value = "checkout")]
    Checkout,

    /// Verify the pinned interpreter is present and reports the expected
    /// version.
    #[sea_orm(string_value = "runtime")]
    Runtime,

    /// Validate the dependency manifest, then install every listed package.
    #[sea_orm(string_value = "dependencies")]
    Dependencies,

    /// Install the OS shared-library packages the browser engines need.
    #[sea_orm(string_value = "system_packages")]
    SystemPackages,

    /// Download the headless browser engine binaries.
    #[sea_orm(string_value = "browsers")]
    Browsers,

    /// Invoke the external bot; its exit status decides the run.
    #[sea_orm(string_value = "bot")]
    Bot,
}

impl StepKind {
    /// Canonical step order. Installs run after the dependency manifest so
    /// the browser installer can already import the automation library.
    pub const SEQUENCE: [Self; 6] = [
        Self::Checkout,
        Self::Runtime,
        Self::Dependencies,
        Self::SystemPackages,
        Self::Browsers,
        Self::Bot,
    ];

    /// The run status a worker reports while this step executes.
    pub const fn phase(&self) -> RunStatus {
        match self {
            Self::Checkout | Self::Runtime => RunStatus::Provisioning,
            Self::Dependencies | Self::SystemPackages | Self::Browsers => RunStatus::Installing,
            Self::Bot => RunStatus::Running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StepKind;
    use crate::database::models::run_status::RunStatus;

    #[test]
    fn sequence_phases_are_monotonic() {
        // provisioning steps first, then installs, then the bot
        let phases: Vec<RunStatus> = StepKind::SEQUENCE.iter().map(StepKind::phase).collect();
        let mut seen_installing = false;
        let mut seen_running = false;
        for phase in phases {
            match phase {
                RunStatus::Provisioning => {
                    assert!(!seen_installing && !seen_running);
                }
                RunStatus::Installing => {
                    assert!(!seen_running);
                    seen_installing = true;
                }
                RunStatus::Running => seen_running = true,
                other => panic!("unexpected phase {other}"),
            }
        }
        assert!(seen_installing && seen_running);
    }

    #[test]
    fn bot_is_the_final_step() {
        assert_eq!(StepKind::SEQUENCE.last(), Some(&StepKind::Bot));
    }
}
