//! Book catalog service

use std::sync::Arc;

use validator::Validate;

use super::not_found_as;
use crate::{
    circulation::{generate_id, validate_isbn, BOOK_PREFIX},
    clock::Clock,
    error::{AppError, AppResult},
    models::book::{Book, BookFields, BookQuery, BookStatus},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    id_retry_attempts: u32,
}

impl CatalogService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>, id_retry_attempts: u32) -> Self {
        Self {
            repository,
            clock,
            id_retry_attempts,
        }
    }

    fn check_fields(fields: &BookFields) -> AppResult<BookFields> {
        let fields = fields.trimmed();
        fields.validate()?;
        if !validate_isbn(&fields.isbn) {
            return Err(AppError::Validation("Invalid ISBN format".to_string()));
        }
        Ok(fields)
    }

    /// Add a book with the next `BK-NNN` id
    pub async fn add_book(&self, fields: &BookFields) -> AppResult<Book> {
        let fields = Self::check_fields(fields)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let last_id = self.repository.books.last_id().await?;
            let now = self.clock.now();
            let book = Book {
                book_id: generate_id(BOOK_PREFIX, last_id.as_deref())?,
                title: fields.title.clone(),
                author: fields.author.clone(),
                isbn: fields.isbn.clone(),
                category: fields.category,
                status: BookStatus::Available,
                added_at: now,
                updated_at: now,
            };

            match self.repository.books.create(&book).await {
                Err(AppError::DuplicateId(id)) if attempt < self.id_retry_attempts => {
                    tracing::warn!(book_id = %id, attempt, "Book id taken concurrently, retrying");
                }
                Ok(book) => {
                    tracing::info!(book_id = %book.book_id, title = %book.title, "Book added");
                    return Ok(book);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn get_book(&self, book_id: &str) -> AppResult<Book> {
        self.repository
            .books
            .get_by_id(book_id.trim())
            .await
            .map_err(not_found_as("Book ID not found"))
    }

    pub async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        self.repository.books.search(query).await
    }

    /// Edit descriptive fields. Status only changes through circulation.
    pub async fn update_book(&self, book_id: &str, fields: &BookFields) -> AppResult<Book> {
        let fields = Self::check_fields(fields)?;
        let book = self
            .repository
            .books
            .update(book_id.trim(), &fields, self.clock.now())
            .await
            .map_err(not_found_as("Book ID not found"))?;
        tracing::info!(book_id = %book.book_id, "Book updated");
        Ok(book)
    }

    /// Delete a book and its loan history. Refused while the book is on loan.
    pub async fn delete_book(&self, book_id: &str) -> AppResult<()> {
        let book_id = book_id.trim();
        if self.repository.books.delete_if_idle(book_id).await? {
            tracing::info!(book_id = %book_id, "Book deleted");
            return Ok(());
        }

        // Nothing removed: either unknown or still on loan
        self.get_book(book_id).await?;
        Err(AppError::Conflict(
            "Book has an active loan and cannot be deleted".to_string(),
        ))
    }
}
