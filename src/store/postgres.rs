use async_trait::async_trait;
use sqlx::PgPool;

use super::{TaskStore, UserStore};
use crate::error::AppError;
use crate::models::{NewUser, Task, TaskInput, TaskQuery, TaskUpdate, User, UserAlias};

const USER_BY_ID: &str = "SELECT id, email, full_name, age, password_hash, avatar_url, provider, \
     provider_user_id, created_at, updated_at, last_login FROM users WHERE id = $1";

const USER_BY_EMAIL: &str = "SELECT id, email, full_name, age, password_hash, avatar_url, provider, \
     provider_user_id, created_at, updated_at, last_login FROM users WHERE email = $1";

const USER_BY_PROVIDER: &str = "SELECT id, email, full_name, age, password_hash, avatar_url, \
     provider, provider_user_id, created_at, updated_at, last_login FROM users \
     WHERE provider = $1 AND provider_user_id = $2";

const TASK_COLUMNS: &str =
    "id, user_id, title, description, status, priority, due_date, created_at, updated_at";

/// Postgres-backed store for users and tasks.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT NOW()").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_by_alias(&self, alias: &UserAlias) -> Result<Option<User>, AppError> {
        let user = match alias {
            UserAlias::Id(id) => {
                sqlx::query_as::<_, User>(USER_BY_ID)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            UserAlias::Email(email) => {
                sqlx::query_as::<_, User>(USER_BY_EMAIL)
                    .bind(email)
                    .fetch_optional(&self.pool)
                    .await?
            }
            UserAlias::Provider { provider, subject } => {
                sqlx::query_as::<_, User>(USER_BY_PROVIDER)
                    .bind(provider.as_str())
                    .bind(subject)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let created = sqlx::query_as::<_, User>(
            "INSERT INTO users (email, full_name, age, password_hash, avatar_url, provider, provider_user_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id, email, full_name, age, password_hash, avatar_url, provider,
                       provider_user_id, created_at, updated_at, last_login",
        )
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.age)
        .bind(&user.password_hash)
        .bind(&user.avatar_url)
        .bind(user.provider.as_str())
        .bind(&user.provider_user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn touch_last_login(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET last_login = NOW(), updated_at = NOW() WHERE id = $1
             RETURNING id, email, full_name, age, password_hash, avatar_url, provider,
                       provider_user_id, created_at, updated_at, last_login",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create(&self, owner: i64, input: TaskInput) -> Result<Task, AppError> {
        let sql = format!(
            "INSERT INTO tasks (user_id, title, description, status, priority, due_date)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(owner)
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.status.unwrap_or_default().as_str())
            .bind(input.priority)
            .bind(input.due_date)
            .fetch_one(&self.pool)
            .await?;
        Ok(task)
    }

    async fn find(&self, id: i64, owner: i64) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE id = $1 AND user_id = $2",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn list(&self, owner: i64, query: &TaskQuery) -> Result<Vec<Task>, AppError> {
        // absent filters bind as NULL and match everything
        let sql = format!(
            "SELECT {} FROM tasks
             WHERE user_id = $1
               AND ($2::text IS NULL OR status = $2)
               AND ($3::timestamptz IS NULL OR due_date < $3)
             ORDER BY created_at DESC, id DESC
             LIMIT $4 OFFSET $5",
            TASK_COLUMNS
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(owner)
            .bind(query.status.map(|s| s.as_str()))
            .bind(query.due_before)
            .bind(query.limit)
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    async fn update(
        &self,
        id: i64,
        owner: i64,
        update: TaskUpdate,
    ) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "UPDATE tasks SET
                 title = COALESCE($3, title),
                 description = COALESCE($4, description),
                 status = COALESCE($5, status),
                 priority = COALESCE($6, priority),
                 due_date = COALESCE($7, due_date),
                 updated_at = NOW()
             WHERE id = $1 AND user_id = $2
             RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .bind(&update.title)
            .bind(&update.description)
            .bind(update.status.map(|s| s.as_str()))
            .bind(update.priority)
            .bind(update.due_date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn delete(&self, id: i64, owner: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
