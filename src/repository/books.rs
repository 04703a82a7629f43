//! Books repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::{map_unique_violation, search_pattern};
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookFields, BookQuery, BookRow},
};

const ISBN_TAKEN: (&str, &str) = ("books_isbn_key", "ISBN already exists");

#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Highest book id issued so far (numeric order of the suffix)
    async fn last_id(&self) -> AppResult<Option<String>>;
    /// Insert a book. `DuplicateId` when its id is taken, `Conflict` on a duplicate ISBN.
    async fn create(&self, book: &Book) -> AppResult<Book>;
    async fn get_by_id(&self, book_id: &str) -> AppResult<Book>;
    async fn search(&self, query: &BookQuery) -> AppResult<Vec<Book>>;
    async fn update(&self, book_id: &str, fields: &BookFields, at: DateTime<Utc>) -> AppResult<Book>;
    /// Delete the book unless a loan on it is still active. Returns whether a row was removed.
    async fn delete_if_idle(&self, book_id: &str) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgBookRepository {
    pool: Pool<Postgres>,
}

impl PgBookRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRepository for PgBookRepository {
    async fn last_id(&self) -> AppResult<Option<String>> {
        let id = sqlx::query_scalar::<_, String>(
            "SELECT book_id FROM books ORDER BY length(book_id) DESC, book_id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create(&self, book: &Book) -> AppResult<Book> {
        let row = sqlx::query_as::<_, BookRow>(
            r#"
            INSERT INTO books (book_id, title, author, isbn, category, status, added_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&book.book_id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.category.as_str())
        .bind(book.status.as_str())
        .bind(book.added_at)
        .bind(book.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "books_pkey", &book.book_id, &[ISBN_TAKEN]))?;

        row.try_into()
    }

    async fn get_by_id(&self, book_id: &str) -> AppResult<Book> {
        sqlx::query_as::<_, BookRow>("SELECT * FROM books WHERE book_id = $1")
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))?
            .try_into()
    }

    async fn search(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let rows = sqlx::query_as::<_, BookRow>(
            r#"
            SELECT * FROM books
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL
                   OR book_id ILIKE $3 ESCAPE '\' OR title ILIKE $3 ESCAPE '\'
                   OR author ILIKE $3 ESCAPE '\' OR isbn ILIKE $3 ESCAPE '\')
            ORDER BY length(book_id), book_id
            "#,
        )
        .bind(query.category.map(|c| c.as_str()))
        .bind(query.status.map(|s| s.as_str()))
        .bind(search_pattern(query.search.as_deref()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Book::try_from).collect()
    }

    async fn update(&self, book_id: &str, fields: &BookFields, at: DateTime<Utc>) -> AppResult<Book> {
        sqlx::query_as::<_, BookRow>(
            r#"
            UPDATE books
            SET title = $2, author = $3, isbn = $4, category = $5, updated_at = $6
            WHERE book_id = $1
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(&fields.title)
        .bind(&fields.author)
        .bind(&fields.isbn)
        .bind(fields.category.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "books_pkey", book_id, &[ISBN_TAKEN]))?
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))?
        .try_into()
    }

    async fn delete_if_idle(&self, book_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM books
            WHERE book_id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM borrowed_books
                  WHERE book_id = $1 AND status IN ('Borrowed', 'Overdue', 'Lost')
              )
            "#,
        )
        .bind(book_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
