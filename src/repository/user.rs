use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheKey, CachedEntity, EntityCache};
use crate::error::AppError;
use crate::models::{NewUser, User, UserAlias};
use crate::store::{with_deadline, UserStore};

pub struct UserRepository {
    store: Arc<dyn UserStore>,
    cache: Arc<EntityCache>,
    deadline: Duration,
}

impl UserRepository {
    pub fn new(store: Arc<dyn UserStore>, cache: Arc<EntityCache>, deadline: Duration) -> Self {
        Self {
            store,
            cache,
            deadline,
        }
    }

    /// Looks a user up by any alias, populating every alias on a miss.
    pub async fn get(&self, alias: UserAlias) -> Result<Option<Arc<User>>, AppError> {
        let key = CacheKey::User(alias.clone());
        if let Some(CachedEntity::User(user)) = self.cache.get(&key) {
            log::trace!("cache hit for {}", key);
            return Ok(Some(user));
        }

        let found = with_deadline(self.deadline, self.store.find_by_alias(&alias)).await?;
        Ok(found.map(|user| self.remember(user)))
    }

    pub async fn create(&self, user: NewUser) -> Result<Arc<User>, AppError> {
        let created = with_deadline(self.deadline, self.store.create(user)).await?;
        log::info!("created {} user {}", created.provider, created.id);
        Ok(self.remember(created))
    }

    /// Stamps the login time, drops every cached alias of the user and returns the
    /// updated row. `None` when the user no longer exists.
    pub async fn update_last_login(&self, id: i64) -> Result<Option<Arc<User>>, AppError> {
        let touched = with_deadline(self.deadline, self.store.touch_last_login(id)).await?;
        match touched {
            Some(user) => {
                self.forget(&user);
                Ok(Some(Arc::new(user)))
            }
            None => {
                self.cache.delete(&CacheKey::User(UserAlias::Id(id)));
                Ok(None)
            }
        }
    }

    /// [`update_last_login`](Self::update_last_login) for a sign-in that already
    /// succeeded: a failed stamp is logged and the given snapshot is returned instead.
    pub async fn record_login(&self, user: Arc<User>) -> Arc<User> {
        match self.update_last_login(user.id).await {
            Ok(Some(touched)) => touched,
            Ok(None) => user,
            Err(e) => {
                log::warn!("could not record login for user {}: {}", user.id, e);
                user
            }
        }
    }

    /// Checks the store is reachable within `deadline`, independent of the call deadline.
    pub async fn ping(&self, deadline: Duration) -> Result<(), AppError> {
        with_deadline(deadline, self.store.ping()).await
    }

    fn remember(&self, user: User) -> Arc<User> {
        let user = Arc::new(user);
        for key in CacheKey::user_aliases(&user) {
            self.cache.set_default(key, CachedEntity::User(Arc::clone(&user)));
        }
        user
    }

    fn forget(&self, user: &User) {
        for key in CacheKey::user_aliases(user) {
            self.cache.delete(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthProvider;
    use crate::store::MemoryStore;

    fn repository() -> (UserRepository, Arc<MemoryStore>, Arc<EntityCache>) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(EntityCache::new(Duration::from_secs(300)));
        let repo = UserRepository::new(store.clone(), cache.clone(), Duration::from_secs(5));
        (repo, store, cache)
    }

    fn github_user() -> NewUser {
        NewUser {
            email: "ana@example.com".into(),
            full_name: "Ana".into(),
            age: 0,
            password_hash: None,
            avatar_url: None,
            provider: AuthProvider::Github,
            provider_user_id: "1234".into(),
        }
    }

    #[tokio::test]
    async fn test_create_populates_every_alias() {
        let (repo, store, cache) = repository();
        let created = repo.create(github_user()).await.unwrap();

        assert_eq!(cache.len(), 3);
        for alias in UserAlias::all_of(&created) {
            let found = repo.get(alias).await.unwrap().unwrap();
            assert_eq!(found.id, created.id);
        }
        assert_eq!(store.user_lookups(), 0);
    }

    #[tokio::test]
    async fn test_miss_falls_through_once() {
        let (repo, store, cache) = repository();
        let created = repo.create(github_user()).await.unwrap();
        for key in CacheKey::user_aliases(&created) {
            cache.delete(&key);
        }

        let by_email = repo.get(UserAlias::Email("ana@example.com".into())).await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));
        assert_eq!(store.user_lookups(), 1);

        // the email lookup repopulated the other aliases too
        repo.get(UserAlias::Id(created.id)).await.unwrap();
        repo.get(UserAlias::provider(AuthProvider::Github, "1234")).await.unwrap();
        assert_eq!(store.user_lookups(), 1);
    }

    #[tokio::test]
    async fn test_absent_user_is_not_cached() {
        let (repo, store, cache) = repository();

        assert!(repo.get(UserAlias::Id(99)).await.unwrap().is_none());
        assert!(repo.get(UserAlias::Id(99)).await.unwrap().is_none());
        assert_eq!(store.user_lookups(), 2);
        assert!(cache.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_last_login_invalidates_every_alias() {
        let (repo, _store, cache) = repository();
        let created = repo.create(github_user()).await.unwrap();
        assert!(created.last_login.is_none());

        let touched = repo.update_last_login(created.id).await.unwrap().unwrap();
        assert!(touched.last_login.is_some());

        assert!(cache.is_empty());
        let by_provider = repo
            .get(UserAlias::provider(AuthProvider::Github, "1234"))
            .await
            .unwrap()
            .unwrap();
        assert!(by_provider.last_login.is_some());
    }

    #[tokio::test]
    async fn test_record_login_falls_back_to_snapshot() {
        let (repo, store, _cache) = repository();
        let created = repo.create(github_user()).await.unwrap();

        let fresh = repo.record_login(Arc::clone(&created)).await;
        assert!(fresh.last_login.is_some());

        store.set_unavailable(true);
        let kept = repo.record_login(Arc::clone(&created)).await;
        assert!(Arc::ptr_eq(&kept, &created));
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let (repo, store, _cache) = repository();
        store.set_unavailable(true);

        match repo.get(UserAlias::Id(1)).await {
            Err(AppError::DatabaseError(_)) => {}
            other => panic!("expected a store error, got {:?}", other),
        }
    }
}
