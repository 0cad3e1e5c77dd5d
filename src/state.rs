use std::sync::Arc;
use std::time::Duration;

use crate::auth::IdentityProviders;
use crate::cache::EntityCache;
use crate::repository::{TaskRepository, UserRepository};
use crate::store::{TaskStore, UserStore};

/// Shared handler state, registered once as `web::Data<AppState>`.
pub struct AppState {
    pub users: UserRepository,
    pub tasks: TaskRepository,
    pub identity: IdentityProviders,
}

impl AppState {
    /// Both repositories share `cache`; every store call is bounded by `store_timeout`.
    pub fn new(
        user_store: Arc<dyn UserStore>,
        task_store: Arc<dyn TaskStore>,
        cache: Arc<EntityCache>,
        store_timeout: Duration,
        identity: IdentityProviders,
    ) -> Self {
        Self {
            users: UserRepository::new(user_store, Arc::clone(&cache), store_timeout),
            tasks: TaskRepository::new(task_store, cache, store_timeout),
            identity,
        }
    }
}
