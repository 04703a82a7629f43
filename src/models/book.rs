//! Book (catalog entry) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{circulation::normalize_isbn, error::AppError};

/// Circulation status of a physical book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum BookStatus {
    Available,
    Borrowed,
    Lost,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "Available",
            BookStatus::Borrowed => "Borrowed",
            BookStatus::Lost => "Lost",
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Available" => Ok(BookStatus::Available),
            "Borrowed" => Ok(BookStatus::Borrowed),
            "Lost" => Ok(BookStatus::Lost),
            _ => Err(format!("Invalid book status: {}", s)),
        }
    }
}

/// Fixed set of shelving categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Category {
    Adventure,
    Art,
    Biography,
    Business,
    Cooking,
    Fantasy,
    Fiction,
    History,
    Horror,
    Mystery,
    #[serde(rename = "Non-Fiction")]
    NonFiction,
    Poetry,
    Romance,
    Science,
    Technology,
}

impl Category {
    pub const ALL: [Category; 15] = [
        Category::Adventure,
        Category::Art,
        Category::Biography,
        Category::Business,
        Category::Cooking,
        Category::Fantasy,
        Category::Fiction,
        Category::History,
        Category::Horror,
        Category::Mystery,
        Category::NonFiction,
        Category::Poetry,
        Category::Romance,
        Category::Science,
        Category::Technology,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Adventure => "Adventure",
            Category::Art => "Art",
            Category::Biography => "Biography",
            Category::Business => "Business",
            Category::Cooking => "Cooking",
            Category::Fantasy => "Fantasy",
            Category::Fiction => "Fiction",
            Category::History => "History",
            Category::Horror => "Horror",
            Category::Mystery => "Mystery",
            Category::NonFiction => "Non-Fiction",
            Category::Poetry => "Poetry",
            Category::Romance => "Romance",
            Category::Science => "Science",
            Category::Technology => "Technology",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Invalid category: {}", s))
    }
}

/// Book record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Book {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: Category,
    pub status: BookStatus,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw `books` row; enum columns are still text
#[derive(Debug, Clone, FromRow)]
pub struct BookRow {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub status: String,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BookRow> for Book {
    type Error = AppError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        Ok(Book {
            category: row.category.parse().map_err(AppError::Validation)?,
            status: row.status.parse().map_err(AppError::Validation)?,
            book_id: row.book_id,
            title: row.title,
            author: row.author,
            isbn: row.isbn,
            added_at: row.added_at,
            updated_at: row.updated_at,
        })
    }
}

/// Create / update book request. Status is managed by circulation only.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookFields {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Author is required"))]
    pub author: String,
    #[validate(length(min = 1, max = 20, message = "ISBN is required"))]
    pub isbn: String,
    pub category: Category,
}

impl BookFields {
    /// Copy with surrounding whitespace removed and the ISBN reduced to its digits
    pub fn trimmed(&self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            isbn: normalize_isbn(self.isbn.trim()),
            category: self.category,
        }
    }
}

/// Book list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    pub category: Option<Category>,
    pub status: Option<BookStatus>,
    /// Matches book id, title, author or ISBN (case-insensitive)
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(category: &str, status: &str) -> BookRow {
        BookRow {
            book_id: "BK-001".to_string(),
            title: "Noli Me Tángere".to_string(),
            author: "José Rizal".to_string(),
            isbn: "9789710810736".to_string(),
            category: category.to_string(),
            status: status.to_string(),
            added_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_mapping() {
        let book = Book::try_from(row("Non-Fiction", "Borrowed")).unwrap();
        assert_eq!(book.category, Category::NonFiction);
        assert_eq!(book.status, BookStatus::Borrowed);
    }

    #[test]
    fn test_row_rejects_unknown_status() {
        assert!(matches!(
            Book::try_from(row("Fiction", "Missing")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            Book::try_from(row("Comics", "Available")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_category_names_round_trip() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
    }
}
