//! Report queries

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::stats::{LibrarySummary, PopularBook, TopBorrower},
};

#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn summary(&self) -> AppResult<LibrarySummary>;
    async fn top_borrowers(&self, limit: i64) -> AppResult<Vec<TopBorrower>>;
    async fn popular_books(&self, limit: i64) -> AppResult<Vec<PopularBook>>;
}

#[derive(Clone)]
pub struct PgStatsRepository {
    pool: Pool<Postgres>,
}

impl PgStatsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatsRepository for PgStatsRepository {
    async fn summary(&self) -> AppResult<LibrarySummary> {
        let summary = sqlx::query_as::<_, LibrarySummary>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM members WHERE status = 'Active') AS active_members,
                (SELECT COUNT(*) FROM members WHERE status = 'Inactive') AS inactive_members,
                (SELECT COUNT(*) FROM borrowed_books WHERE status = 'Borrowed') AS borrowed_books,
                (SELECT COUNT(*) FROM borrowed_books WHERE status = 'Overdue') AS overdue_books,
                (SELECT COALESCE(SUM(fine_amount), 0) FROM borrowed_books
                 WHERE status IN ('Overdue', 'Borrowed')) AS total_fines
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }

    async fn top_borrowers(&self, limit: i64) -> AppResult<Vec<TopBorrower>> {
        let rows = sqlx::query_as::<_, TopBorrower>(
            r#"
            SELECT m.member_id, m.full_name,
                   COUNT(bb.borrow_id) AS total_borrowed,
                   COALESCE(SUM(bb.fine_amount), 0) AS total_fines
            FROM members m
            JOIN borrowed_books bb ON m.member_id = bb.member_id
            GROUP BY m.member_id, m.full_name
            ORDER BY total_borrowed DESC, m.member_id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn popular_books(&self, limit: i64) -> AppResult<Vec<PopularBook>> {
        let rows = sqlx::query_as::<_, PopularBook>(
            r#"
            SELECT b.book_id, b.title, b.author, COUNT(bb.borrow_id) AS borrow_count
            FROM books b
            JOIN borrowed_books bb ON b.book_id = bb.book_id
            GROUP BY b.book_id, b.title, b.author
            ORDER BY borrow_count DESC, b.book_id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
