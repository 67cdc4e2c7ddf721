pub use sea_orm_migration::prelude::*;

mod m20260712_093000_create_run;
mod m20260712_094500_create_step_execution;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260712_093000_create_run::Migration),
            Box::new(m20260712_094500_create_step_execution::Migration),
        ]
    }
}

pub struct Migrator;
