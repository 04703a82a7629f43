//! Repository layer for database operations
//!
//! Each entity has a repository trait with a PostgreSQL implementation next to
//! it. [`memory::MemoryStore`] implements every trait in-process.

pub mod books;
pub mod librarians;
pub mod loans;
pub mod members;
pub mod memory;
pub mod stats;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::error::AppError;

pub use books::BookRepository;
pub use librarians::LibrarianRepository;
pub use loans::LoanRepository;
pub use members::MemberRepository;
pub use stats::StatsRepository;

/// Handles to every repository, shared by the services
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookRepository>,
    pub members: Arc<dyn MemberRepository>,
    pub loans: Arc<dyn LoanRepository>,
    pub stats: Arc<dyn StatsRepository>,
    pub librarians: Arc<dyn LibrarianRepository>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::PgBookRepository::new(pool.clone())),
            members: Arc::new(members::PgMemberRepository::new(pool.clone())),
            loans: Arc::new(loans::PgLoanRepository::new(pool.clone())),
            stats: Arc::new(stats::PgStatsRepository::new(pool.clone())),
            librarians: Arc::new(librarians::PgLibrarianRepository::new(pool)),
        }
    }

    /// Create a repository backed by a fresh in-memory store
    pub fn in_memory() -> Self {
        let store = memory::MemoryStore::default();
        Self {
            books: Arc::new(store.clone()),
            members: Arc::new(store.clone()),
            loans: Arc::new(store.clone()),
            stats: Arc::new(store.clone()),
            librarians: Arc::new(store),
        }
    }
}

/// Translate unique-constraint violations into domain errors.
///
/// `primary_key` names the constraint guarding generated ids; `unique` maps
/// other constraint names to the conflict message shown to the operator.
pub(crate) fn map_unique_violation(
    err: sqlx::Error,
    primary_key: &str,
    id: &str,
    unique: &[(&str, &str)],
) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or_default();
            if constraint == primary_key {
                return AppError::DuplicateId(id.to_string());
            }
            if let Some((_, message)) = unique.iter().find(|(name, _)| *name == constraint) {
                return AppError::Conflict(message.to_string());
            }
        }
    }
    AppError::Database(err)
}

/// `%keyword%` pattern for `ILIKE ... ESCAPE '\'` searches; `None` for blank input.
/// Wildcards in the keyword match literally.
pub(crate) fn search_pattern(search: Option<&str>) -> Option<String> {
    search.map(str::trim).filter(|s| !s.is_empty()).map(|s| {
        let mut pattern = String::with_capacity(s.len() + 2);
        pattern.push('%');
        for c in s.chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        pattern
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        assert_eq!(search_pattern(Some(" rizal ")).as_deref(), Some("%rizal%"));
        assert_eq!(search_pattern(Some("50%")).as_deref(), Some(r"%50\%%"));
        assert_eq!(search_pattern(Some("a_b")).as_deref(), Some(r"%a\_b%"));
        assert_eq!(search_pattern(Some(r"c:\x")).as_deref(), Some(r"%c:\\x%"));
        assert_eq!(search_pattern(Some("   ")), None);
        assert_eq!(search_pattern(None), None);
    }
}
