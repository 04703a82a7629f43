//! Loan (borrowed_books record) model and related types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::book::BookStatus;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum LoanStatus {
    Borrowed,
    Returned,
    Overdue,
    Lost,
}

impl LoanStatus {
    pub const ACTIVE: [LoanStatus; 3] = [LoanStatus::Borrowed, LoanStatus::Overdue, LoanStatus::Lost];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Borrowed => "Borrowed",
            LoanStatus::Returned => "Returned",
            LoanStatus::Overdue => "Overdue",
            LoanStatus::Lost => "Lost",
        }
    }

    /// Not yet returned
    pub fn is_active(&self) -> bool {
        !matches!(self, LoanStatus::Returned)
    }

    /// Status the referenced book must carry while a loan is in this state
    pub fn book_status(&self) -> BookStatus {
        match self {
            LoanStatus::Borrowed | LoanStatus::Overdue => BookStatus::Borrowed,
            LoanStatus::Lost => BookStatus::Lost,
            LoanStatus::Returned => BookStatus::Available,
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Borrowed" => Ok(LoanStatus::Borrowed),
            "Returned" => Ok(LoanStatus::Returned),
            "Overdue" => Ok(LoanStatus::Overdue),
            "Lost" => Ok(LoanStatus::Lost),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

/// Loan record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Loan {
    pub borrow_id: i32,
    pub book_id: String,
    pub member_id: String,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,
    pub fine_amount: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Raw `borrowed_books` row
#[derive(Debug, Clone, FromRow)]
pub struct LoanRow {
    pub borrow_id: i32,
    pub book_id: String,
    pub member_id: String,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: String,
    pub fine_amount: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<LoanRow> for Loan {
    type Error = AppError;

    fn try_from(row: LoanRow) -> Result<Self, Self::Error> {
        let status: LoanStatus = row.status.parse().map_err(AppError::Validation)?;
        if (status == LoanStatus::Returned) != row.return_date.is_some() {
            return Err(AppError::Validation(format!(
                "Loan {} is {} but its return date is {}",
                row.borrow_id,
                status,
                if row.return_date.is_some() { "set" } else { "missing" }
            )));
        }

        Ok(Loan {
            borrow_id: row.borrow_id,
            book_id: row.book_id,
            member_id: row.member_id,
            borrow_date: row.borrow_date,
            due_date: row.due_date,
            return_date: row.return_date,
            status,
            fine_amount: row.fine_amount.unwrap_or_default(),
            updated_at: row.updated_at,
        })
    }
}

/// Loan with the borrowed book's title, for listings
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    pub book_title: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct LoanDetailsRow {
    #[sqlx(flatten)]
    pub loan: LoanRow,
    pub book_title: String,
}

impl TryFrom<LoanDetailsRow> for LoanDetails {
    type Error = AppError;

    fn try_from(row: LoanDetailsRow) -> Result<Self, Self::Error> {
        Ok(LoanDetails {
            loan: row.loan.try_into()?,
            book_title: row.book_title,
        })
    }
}

/// Issue a book to a member
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct IssueLoan {
    #[validate(length(min = 1, message = "Book ID is required"))]
    pub book_id: String,
    #[validate(length(min = 1, message = "Member ID is required"))]
    pub member_id: String,
    /// Borrowing period in days (default from configuration)
    pub period_days: Option<u32>,
}

/// Manual overwrite of a loan record
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateLoan {
    #[validate(length(min = 1, message = "Book ID is required"))]
    pub book_id: String,
    #[validate(length(min = 1, message = "Member ID is required"))]
    pub member_id: String,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: LoanStatus,
    pub fine_amount: Decimal,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
    /// Matches book id, member id or book title (case-insensitive)
    pub search: Option<String>,
}

/// New loan plus the side effects that must land with it
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub book_id: String,
    pub member_id: String,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Flip an inactive borrower back to Active in the same write
    pub activate_member: bool,
    pub at: DateTime<Utc>,
}

/// Book status write attached to a loan write
#[derive(Debug, Clone, PartialEq)]
pub struct BookStatusChange {
    pub book_id: String,
    pub status: BookStatus,
    /// When set, the write only applies if the book currently has this status
    pub expected: Option<BookStatus>,
}

/// Full replacement of a loan row, guarded by its current status
#[derive(Debug, Clone)]
pub struct LoanWrite {
    pub loan: Loan,
    pub expected_status: Vec<LoanStatus>,
    /// Only apply while the stored fine is null or zero
    pub only_if_unfined: bool,
    pub books: Vec<BookStatusChange>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoanWriteOutcome {
    Applied(Loan),
    /// The loan no longer matched the expected status (or fine); nothing was written
    LoanChanged,
    /// A guarded book status change did not match; nothing was written
    BookUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, return_date: Option<NaiveDate>) -> LoanRow {
        LoanRow {
            borrow_id: 7,
            book_id: "BK-001".to_string(),
            member_id: "MEM-001".to_string(),
            borrow_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            return_date,
            status: status.to_string(),
            fine_amount: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_null_fine_reads_as_zero() {
        let loan = Loan::try_from(row("Borrowed", None)).unwrap();
        assert_eq!(loan.fine_amount, Decimal::ZERO);
    }

    #[test]
    fn test_return_date_must_match_status() {
        let returned = NaiveDate::from_ymd_opt(2024, 1, 10);
        assert!(Loan::try_from(row("Returned", returned)).is_ok());
        assert!(matches!(Loan::try_from(row("Returned", None)), Err(AppError::Validation(_))));
        assert!(matches!(Loan::try_from(row("Overdue", returned)), Err(AppError::Validation(_))));
        assert!(matches!(Loan::try_from(row("Renewed", None)), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_status_to_book_status() {
        assert_eq!(LoanStatus::Overdue.book_status(), BookStatus::Borrowed);
        assert_eq!(LoanStatus::Lost.book_status(), BookStatus::Lost);
        assert_eq!(LoanStatus::Returned.book_status(), BookStatus::Available);
        assert!(LoanStatus::ACTIVE.iter().all(LoanStatus::is_active));
    }
}
