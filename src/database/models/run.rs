//! `SeaORM` Entity for pipeline runs

use crate::database::models::{run_status::RunStatus, trigger::Trigger};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "run")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub trigger: Trigger,
    pub status: RunStatus,
    pub started_at: Option<DateTime>,
    pub finished_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::step_execution::Entity")]
    StepExecution,
}

impl Related<super::step_execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StepExecution.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Check if the run has reached a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock duration from claim to completion, when both are known.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some(finished.signed_duration_since(started)),
            _ => None,
        }
    }
}
