use std::fmt;
use std::sync::Arc;

use crate::models::{Task, User, UserAlias};

/// Entity kind plus identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    User(UserAlias),
    Task(i64),
}

impl CacheKey {
    /// One key per alias of `user`.
    pub fn user_aliases(user: &User) -> impl Iterator<Item = CacheKey> {
        UserAlias::all_of(user).into_iter().map(CacheKey::User)
    }
}

impl From<UserAlias> for CacheKey {
    fn from(alias: UserAlias) -> Self {
        CacheKey::User(alias)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CacheKey::User(UserAlias::Id(id)) => write!(f, "user:id:{}", id),
            CacheKey::User(UserAlias::Email(email)) => write!(f, "user:email:{}", email),
            CacheKey::User(UserAlias::Provider { provider, subject }) => {
                write!(f, "user:provider:{}:{}", provider, subject)
            }
            CacheKey::Task(id) => write!(f, "task:{}", id),
        }
    }
}

/// Snapshot of an entity at the time it was cached.
#[derive(Debug, Clone)]
pub enum CachedEntity {
    User(Arc<User>),
    Task(Arc<Task>),
}
