use std::sync::{Arc, Mutex};

use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use crate::database::models::{run, run_status::RunStatus, trigger::Trigger};

/// Run queue that is either real (database) or mock (in-memory) for testing
#[derive(Clone, Debug)]
pub enum RunQueue {
    /// Real queue that inserts pending runs into the database
    Database,
    /// Mock queue that captures dispatches for testing
    Mock(Arc<Mutex<Vec<DispatchedRun>>>),
}

/// A run that was dispatched (captured by the mock queue)
#[derive(Debug, Clone)]
pub struct DispatchedRun {
    pub id: Uuid,
    pub trigger: Trigger,
}

impl RunQueue {
    /// Create a new mock queue for testing
    #[must_use]
    pub fn mock() -> Self {
        Self::Mock(Arc::new(Mutex::new(Vec::new())))
    }

    /// Create a real database queue for production
    #[must_use]
    pub const fn database() -> Self {
        Self::Database
    }

    /// Dispatch a run. Accepted at any time: nothing here consults the
    /// recurrence state or the set of currently executing runs.
    pub async fn add(
        &self,
        db: &sea_orm::DatabaseConnection,
        trigger: Trigger,
    ) -> Result<Uuid, sea_orm::DbErr> {
        let run_id = Uuid::new_v4();

        match self {
            Self::Database => {
                let now = chrono::Utc::now().naive_utc();

                let run_model = run::ActiveModel {
                    id: Set(run_id),
                    created_at: Set(now),
                    updated_at: Set(now),
                    trigger: Set(trigger),
                    status: Set(RunStatus::Pending),
                    started_at: Set(None),
                    finished_at: Set(None),
                };

                run_model.insert(db).await?;
            }
            Self::Mock(dispatched) => {
                dispatched.lock().unwrap().push(DispatchedRun {
                    id: run_id,
                    trigger,
                });
            }
        }

        Ok(run_id)
    }

    /// Get all dispatched runs (only available for the mock queue)
    #[must_use]
    pub fn dispatched_runs(&self) -> Option<Vec<DispatchedRun>> {
        match self {
            Self::Mock(dispatched) => Some(dispatched.lock().unwrap().clone()),
            Self::Database => None,
        }
    }

    /// Clear captured dispatches (only available for the mock queue)
    pub fn clear_dispatched_runs(&self) {
        if let Self::Mock(dispatched) = self {
            dispatched.lock().unwrap().clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::run::Entity as RunEntity;
    use crate::tests::setup_test::setup_test_db;
    use sea_orm::EntityTrait;

    #[tokio::test]
    async fn mock_queue_accepts_dispatches_at_any_time() {
        let db = setup_test_db().await;
        let queue = RunQueue::mock();

        queue.add(&db, Trigger::Manual).await.unwrap();
        queue.add(&db, Trigger::Scheduled).await.unwrap();

        let dispatched = queue.dispatched_runs().unwrap();
        assert_eq!(dispatched.len(), 2);
        assert_eq!(dispatched[0].trigger, Trigger::Manual);
        assert_eq!(dispatched[1].trigger, Trigger::Scheduled);

        // nothing reached the database
        assert!(RunEntity::find().all(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn database_queue_inserts_a_pending_run() {
        let db = setup_test_db().await;

        let run_id = RunQueue::database().add(&db, Trigger::Manual).await.unwrap();

        let run_model = RunEntity::find_by_id(run_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(run_model.status, RunStatus::Pending);
        assert_eq!(run_model.trigger, Trigger::Manual);
        assert!(run_model.started_at.is_none());
    }
}
