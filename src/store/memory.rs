use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{TaskStore, UserStore};
use crate::error::AppError;
use crate::models::{NewUser, Task, TaskInput, TaskQuery, TaskUpdate, User, UserAlias};

/// In-process store with the same uniqueness and ownership rules as the Postgres schema.
///
/// Counts lookups so callers can observe how often the cache falls through, and can be
/// switched to fail every call.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
    tasks: Mutex<Vec<Task>>,
    next_user_id: AtomicI64,
    next_task_id: AtomicI64,
    user_lookups: AtomicUsize,
    task_lookups: AtomicUsize,
    unavailable: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `find_by_alias` calls served so far.
    pub fn user_lookups(&self) -> usize {
        self.user_lookups.load(Ordering::SeqCst)
    }

    /// Number of single-task `find` calls served so far.
    pub fn task_lookups(&self) -> usize {
        self.task_lookups.load(Ordering::SeqCst)
    }

    /// While set, every call fails with a store error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError("memory store unavailable".into()));
        }
        Ok(())
    }
}

fn has_alias(user: &User, alias: &UserAlias) -> bool {
    match alias {
        UserAlias::Id(id) => user.id == *id,
        UserAlias::Email(email) => user.email == *email,
        UserAlias::Provider { provider, subject } => {
            user.provider == *provider && user.provider_user_id == *subject
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        self.check_available()
    }

    async fn find_by_alias(&self, alias: &UserAlias) -> Result<Option<User>, AppError> {
        self.check_available()?;
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.users).iter().find(|u| has_alias(u, alias)).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        self.check_available()?;
        let mut users = lock(&self.users);
        let taken = users.iter().any(|u| {
            u.email == user.email
                || (u.provider == user.provider && u.provider_user_id == user.provider_user_id)
        });
        if taken {
            return Err(AppError::Conflict("user_exists".into()));
        }

        let now = Utc::now();
        let created = User {
            id: self.next_user_id.fetch_add(1, Ordering::SeqCst) + 1,
            email: user.email,
            full_name: user.full_name,
            age: user.age,
            password_hash: user.password_hash,
            avatar_url: user.avatar_url,
            provider: user.provider,
            provider_user_id: user.provider_user_id,
            created_at: now,
            updated_at: now,
            last_login: None,
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn touch_last_login(&self, id: i64) -> Result<Option<User>, AppError> {
        self.check_available()?;
        let mut users = lock(&self.users);
        Ok(users.iter_mut().find(|u| u.id == id).map(|user| {
            let now = Utc::now();
            user.last_login = Some(now);
            user.updated_at = now;
            user.clone()
        }))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create(&self, owner: i64, input: TaskInput) -> Result<Task, AppError> {
        self.check_available()?;
        let id = self.next_task_id.fetch_add(1, Ordering::SeqCst) + 1;
        let task = Task::new(id, owner, input, Utc::now());
        lock(&self.tasks).push(task.clone());
        Ok(task)
    }

    async fn find(&self, id: i64, owner: i64) -> Result<Option<Task>, AppError> {
        self.check_available()?;
        self.task_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.tasks)
            .iter()
            .find(|t| t.id == id && t.user_id == owner)
            .cloned())
    }

    async fn list(&self, owner: i64, query: &TaskQuery) -> Result<Vec<Task>, AppError> {
        self.check_available()?;
        let mut tasks: Vec<Task> = lock(&self.tasks)
            .iter()
            .filter(|t| t.user_id == owner)
            .filter(|t| query.status.map_or(true, |s| t.status == s))
            .filter(|t| {
                query
                    .due_before
                    .map_or(true, |before| t.due_date.map_or(false, |due| due < before))
            })
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(0);
        Ok(tasks.into_iter().skip(offset).take(limit).collect())
    }

    async fn update(
        &self,
        id: i64,
        owner: i64,
        update: TaskUpdate,
    ) -> Result<Option<Task>, AppError> {
        self.check_available()?;
        let mut tasks = lock(&self.tasks);
        Ok(tasks
            .iter_mut()
            .find(|t| t.id == id && t.user_id == owner)
            .map(|task| {
                task.apply(update, Utc::now());
                task.clone()
            }))
    }

    async fn delete(&self, id: i64, owner: i64) -> Result<bool, AppError> {
        self.check_available()?;
        let mut tasks = lock(&self.tasks);
        let before = tasks.len();
        tasks.retain(|t| !(t.id == id && t.user_id == owner));
        Ok(tasks.len() < before)
    }
}
