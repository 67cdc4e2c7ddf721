use sea_orm::{sea_query::StringLen, DeriveActiveEnum};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Represents the current state of a pipeline run.
///
/// A run moves through the pipeline phases strictly in order. The only
/// branches are the failure edges: every active state can drop straight
/// to `Failed` when a step exits non-zero, times out, or cannot start.
///
/// # State Transitions
///
/// - `Pending` → `Provisioning` → `Installing` → `Running` → `Succeeded`
/// - `Pending` → `Provisioning`/`Installing`/`Running` → `Failed`
///
/// There are no retry or loop-back transitions; a terminal run stays
/// terminal.
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
#[derive(Default)]
pub enum RunStatus {
    /// Run has been created by the scheduler or a manual dispatch and is
    /// waiting for a worker to claim it. This is the default state for
    /// newly created runs.
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,

    /// A worker has claimed the run and is preparing the sandbox:
    /// snapshotting the project and verifying the pinned runtime.
    #[sea_orm(string_value = "provisioning")]
    Provisioning,

    /// The sandbox exists and install steps are executing: the dependency
    /// manifest, the OS shared-library packages, and the browser engines.
    #[sea_orm(string_value = "installing")]
    Installing,

    /// The bot process has been spawned and the run is waiting for its
    /// exit status.
    #[sea_orm(string_value = "running")]
    Running,

    /// Every step, including the bot invocation, exited zero.
    ///
    /// Terminal: the run will not be touched again except by cleanup.
    #[sea_orm(string_value = "succeeded")]
    Succeeded,

    /// A step failed, timed out, or could not be started, or the run was
    /// reaped after its worker disappeared.
    ///
    /// Terminal: failed runs are never retried.
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl RunStatus {
    /// Checks if this status represents a terminal state.
    ///
    /// Terminal runs will not be processed again; they are only ever read
    /// (API, CLI) or deleted (retention cleanup).
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Checks if a worker currently owns this run.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Provisioning | Self::Installing | Self::Running)
    }

    /// Checks if this run is waiting to be claimed by a worker.
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::RunStatus;

    #[test]
    fn terminal_states_are_exactly_succeeded_and_failed() {
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Provisioning.is_terminal());
        assert!(!RunStatus::Installing.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn active_states_cover_every_pipeline_phase() {
        assert!(RunStatus::Provisioning.is_active());
        assert!(RunStatus::Installing.is_active());
        assert!(RunStatus::Running.is_active());
        assert!(!RunStatus::Pending.is_active());
        assert!(!RunStatus::Succeeded.is_active());
    }

    #[test]
    fn default_status_is_pending() {
        assert_eq!(RunStatus::default(), RunStatus::Pending);
        assert!(RunStatus::default().is_pending());
    }
}
