//! Librarian accounts repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{error::AppResult, models::librarian::Librarian};

#[async_trait]
pub trait LibrarianRepository: Send + Sync {
    async fn get_by_username(&self, username: &str) -> AppResult<Option<Librarian>>;
    async fn get_by_id(&self, librarian_id: i32) -> AppResult<Option<Librarian>>;
    /// Insert the account unless the username already exists. Returns whether it was created.
    async fn create_if_absent(&self, username: &str, password_hash: &str) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgLibrarianRepository {
    pool: Pool<Postgres>,
}

impl PgLibrarianRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LibrarianRepository for PgLibrarianRepository {
    async fn get_by_username(&self, username: &str) -> AppResult<Option<Librarian>> {
        let librarian =
            sqlx::query_as::<_, Librarian>("SELECT * FROM librarians WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(librarian)
    }

    async fn get_by_id(&self, librarian_id: i32) -> AppResult<Option<Librarian>> {
        let librarian =
            sqlx::query_as::<_, Librarian>("SELECT * FROM librarians WHERE librarian_id = $1")
                .bind(librarian_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(librarian)
    }

    async fn create_if_absent(&self, username: &str, password_hash: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO librarians (username, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (username) DO NOTHING
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
