use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheKey, CachedEntity, EntityCache};
use crate::error::AppError;
use crate::models::{Task, TaskInput, TaskQuery, TaskUpdate};
use crate::store::{with_deadline, TaskStore};

pub struct TaskRepository {
    store: Arc<dyn TaskStore>,
    cache: Arc<EntityCache>,
    deadline: Duration,
}

impl TaskRepository {
    pub fn new(store: Arc<dyn TaskStore>, cache: Arc<EntityCache>, deadline: Duration) -> Self {
        Self {
            store,
            cache,
            deadline,
        }
    }

    pub async fn create(&self, owner: i64, input: TaskInput) -> Result<Arc<Task>, AppError> {
        let task = with_deadline(self.deadline, self.store.create(owner, input)).await?;
        log::debug!("user {} created task {}", owner, task.id);
        Ok(self.remember(task))
    }

    /// Returns the task only if `owner` owns it.
    pub async fn get(&self, id: i64, owner: i64) -> Result<Option<Arc<Task>>, AppError> {
        if let Some(CachedEntity::Task(task)) = self.cache.get(&CacheKey::Task(id)) {
            if task.user_id == owner {
                return Ok(Some(task));
            }
            // cached but not theirs; the owner-scoped store query decides
        }

        let found = with_deadline(self.deadline, self.store.find(id, owner)).await?;
        Ok(found.map(|task| self.remember(task)))
    }

    /// Listings always go to the store.
    pub async fn list(&self, owner: i64, query: &TaskQuery) -> Result<Vec<Task>, AppError> {
        with_deadline(self.deadline, self.store.list(owner, query)).await
    }

    pub async fn update(
        &self,
        id: i64,
        owner: i64,
        update: TaskUpdate,
    ) -> Result<Option<Task>, AppError> {
        let updated = with_deadline(self.deadline, self.store.update(id, owner, update)).await?;
        if updated.is_some() {
            self.cache.delete(&CacheKey::Task(id));
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: i64, owner: i64) -> Result<bool, AppError> {
        let deleted = with_deadline(self.deadline, self.store.delete(id, owner)).await?;
        if deleted {
            self.cache.delete(&CacheKey::Task(id));
        }
        Ok(deleted)
    }

    fn remember(&self, task: Task) -> Arc<Task> {
        let task = Arc::new(task);
        self.cache
            .set_default(CacheKey::Task(task.id), CachedEntity::Task(Arc::clone(&task)));
        task
    }
}
