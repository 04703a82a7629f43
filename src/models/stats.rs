//! Aggregate report rows

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// Dashboard counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow, ToSchema)]
pub struct LibrarySummary {
    pub active_members: i64,
    pub inactive_members: i64,
    /// Loans with status Borrowed
    pub borrowed_books: i64,
    /// Loans with status Overdue
    pub overdue_books: i64,
    /// Sum of fines on Borrowed and Overdue loans
    pub total_fines: Decimal,
}

/// Member ranked by number of loans (all time)
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct TopBorrower {
    pub member_id: String,
    pub full_name: String,
    pub total_borrowed: i64,
    pub total_fines: Decimal,
}

/// Book ranked by number of loans (all time)
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct PopularBook {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub borrow_count: i64,
}
