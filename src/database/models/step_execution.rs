//! `SeaORM` Entity for per-step execution records
//!
//! Steps that never ran have no row: the rows of a run, ordered by
//! `started_at`, are always a prefix of the canonical step sequence.

use crate::database::models::{step_kind::StepKind, step_outcome::StepOutcome};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "step_execution")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub run_id: Uuid,
    pub step: StepKind,
    pub outcome: StepOutcome,
    pub exit_code: Option<i32>,
    pub started_at: DateTime,
    pub finished_at: DateTime,
    pub duration_ms: i64,
    pub failure_reason: Option<String>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::run::Entity",
        from = "Column::RunId",
        to = "super::run::Column::Id"
    )]
    Run,
}

impl Related<super::run::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Run.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Check if this step exited zero.
    #[must_use]
    pub const fn was_successful(&self) -> bool {
        self.outcome.is_successful()
    }

    /// Check if this step hit the per-step wall-clock limit.
    #[must_use]
    pub const fn was_timed_out(&self) -> bool {
        self.outcome.is_timed_out()
    }
}
