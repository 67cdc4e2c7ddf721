use sea_orm::{sea_query::StringLen, DeriveActiveEnum};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// How a run came to exist. Scheduled firings and manual dispatches produce
/// otherwise identical runs; the trigger is recorded for inspection only.
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
pub enum Trigger {
    /// Created by the scheduler when the recurrence rule fired.
    #[sea_orm(string_value = "scheduled")]
    Scheduled,

    /// Created by an on-demand dispatch (HTTP API or CLI), accepted at any
    /// time regardless of the recurrence state.
    #[sea_orm(string_value = "manual")]
    Manual,
}
