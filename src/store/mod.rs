//! Persistent storage behind the repositories.
//!
//! [`PgStore`] is the production backend. [`MemoryStore`] keeps everything in process and
//! backs the test suite.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::error::AppError;
use crate::models::{NewUser, Task, TaskInput, TaskQuery, TaskUpdate, User, UserAlias};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Round-trips to the backend without touching any row.
    async fn ping(&self) -> Result<(), AppError>;

    async fn find_by_alias(&self, alias: &UserAlias) -> Result<Option<User>, AppError>;

    /// Fails with `Conflict("user_exists")` when the email or provider subject is taken.
    async fn create(&self, user: NewUser) -> Result<User, AppError>;

    /// Stamps `last_login` and returns the updated row.
    async fn touch_last_login(&self, id: i64) -> Result<Option<User>, AppError>;
}

/// Every task operation is scoped to the owning user.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, owner: i64, input: TaskInput) -> Result<Task, AppError>;

    async fn find(&self, id: i64, owner: i64) -> Result<Option<Task>, AppError>;

    /// Newest first.
    async fn list(&self, owner: i64, query: &TaskQuery) -> Result<Vec<Task>, AppError>;

    async fn update(&self, id: i64, owner: i64, update: TaskUpdate)
        -> Result<Option<Task>, AppError>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: i64, owner: i64) -> Result<bool, AppError>;
}

/// Runs a store call, failing with a store error once `deadline` passes.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    tokio::time::timeout(deadline, call).await?
}
