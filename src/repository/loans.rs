//! Loans repository
//!
//! Every write that touches both a loan and a book runs in one transaction and
//! is conditional on the state the caller read, so two librarians working on
//! the same book cannot both win.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres, Transaction};

use super::search_pattern;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookStatus,
        loan::{
            BookStatusChange, Loan, LoanDetails, LoanDetailsRow, LoanQuery, LoanRow, LoanStatus,
            LoanWrite, LoanWriteOutcome, NewLoan,
        },
        member::MemberStatus,
    },
};

#[async_trait]
pub trait LoanRepository: Send + Sync {
    async fn get_by_id(&self, borrow_id: i32) -> AppResult<Loan>;
    async fn get_details(&self, borrow_id: i32) -> AppResult<LoanDetails>;
    /// Loans joined with their book title, ordered by due date
    async fn search(&self, query: &LoanQuery) -> AppResult<Vec<LoanDetails>>;
    /// Claim an Available book and record the loan.
    ///
    /// Returns `None` (and writes nothing) when the book was no longer Available.
    async fn issue(&self, new_loan: &NewLoan) -> AppResult<Option<Loan>>;
    /// Replace a loan row and apply the attached book status changes, all or nothing.
    async fn save(&self, write: &LoanWrite) -> AppResult<LoanWriteOutcome>;
    /// Remove a loan, resetting its book to Available when the loan was active.
    /// `None` when no such loan.
    async fn delete(&self, borrow_id: i32, at: DateTime<Utc>) -> AppResult<Option<Loan>>;
    /// Borrowed loans whose due date is before `today`
    async fn find_overdue(&self, today: NaiveDate) -> AppResult<Vec<Loan>>;
    /// Lost loans carrying no fine yet
    async fn find_unfined_lost(&self) -> AppResult<Vec<Loan>>;
    /// Number of loans with status Borrowed held by a member
    async fn count_borrowed_by_member(&self, member_id: &str) -> AppResult<i64>;
}

#[derive(Clone)]
pub struct PgLoanRepository {
    pool: Pool<Postgres>,
}

impl PgLoanRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn set_book_status(
        tx: &mut Transaction<'static, Postgres>,
        change: &BookStatusChange,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books SET status = $2, updated_at = $3
            WHERE book_id = $1 AND ($4::text IS NULL OR status = $4)
            "#,
        )
        .bind(&change.book_id)
        .bind(change.status.as_str())
        .bind(at)
        .bind(change.expected.map(|s| s.as_str()))
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl LoanRepository for PgLoanRepository {
    async fn get_by_id(&self, borrow_id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, LoanRow>("SELECT * FROM borrowed_books WHERE borrow_id = $1")
            .bind(borrow_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", borrow_id)))?
            .try_into()
    }

    async fn get_details(&self, borrow_id: i32) -> AppResult<LoanDetails> {
        sqlx::query_as::<_, LoanDetailsRow>(
            r#"
            SELECT bb.*, b.title AS book_title
            FROM borrowed_books bb
            JOIN books b ON bb.book_id = b.book_id
            WHERE bb.borrow_id = $1
            "#,
        )
        .bind(borrow_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", borrow_id)))?
        .try_into()
    }

    async fn search(&self, query: &LoanQuery) -> AppResult<Vec<LoanDetails>> {
        let rows = sqlx::query_as::<_, LoanDetailsRow>(
            r#"
            SELECT bb.*, b.title AS book_title
            FROM borrowed_books bb
            JOIN books b ON bb.book_id = b.book_id
            WHERE ($1::text IS NULL OR bb.status = $1)
              AND ($2::text IS NULL
                   OR bb.book_id ILIKE $2 ESCAPE '\' OR bb.member_id ILIKE $2 ESCAPE '\'
                   OR b.title ILIKE $2 ESCAPE '\')
            ORDER BY bb.due_date ASC, bb.borrow_id ASC
            "#,
        )
        .bind(query.status.map(|s| s.as_str()))
        .bind(search_pattern(query.search.as_deref()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LoanDetails::try_from).collect()
    }

    async fn issue(&self, new_loan: &NewLoan) -> AppResult<Option<Loan>> {
        let mut tx = self.pool.begin().await?;

        // Availability check and status flip in one statement
        let claimed = Self::set_book_status(
            &mut tx,
            &BookStatusChange {
                book_id: new_loan.book_id.clone(),
                status: BookStatus::Borrowed,
                expected: Some(BookStatus::Available),
            },
            new_loan.at,
        )
        .await?;
        if !claimed {
            tx.rollback().await?;
            return Ok(None);
        }

        if new_loan.activate_member {
            sqlx::query(
                "UPDATE members SET status = $2, updated_at = $3 WHERE member_id = $1 AND status = $4",
            )
            .bind(&new_loan.member_id)
            .bind(MemberStatus::Active.as_str())
            .bind(new_loan.at)
            .bind(MemberStatus::Inactive.as_str())
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query_as::<_, LoanRow>(
            r#"
            INSERT INTO borrowed_books
                (book_id, member_id, borrow_date, due_date, status, fine_amount, updated_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            RETURNING *
            "#,
        )
        .bind(&new_loan.book_id)
        .bind(&new_loan.member_id)
        .bind(new_loan.borrow_date)
        .bind(new_loan.due_date)
        .bind(LoanStatus::Borrowed.as_str())
        .bind(new_loan.at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.try_into()?))
    }

    async fn save(&self, write: &LoanWrite) -> AppResult<LoanWriteOutcome> {
        let loan = &write.loan;
        let expected: Vec<String> = write
            .expected_status
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LoanRow>(
            r#"
            UPDATE borrowed_books
            SET book_id = $2, member_id = $3, borrow_date = $4, due_date = $5,
                return_date = $6, status = $7, fine_amount = $8, updated_at = $9
            WHERE borrow_id = $1
              AND status = ANY($10)
              AND ($11 = FALSE OR COALESCE(fine_amount, 0) = 0)
            RETURNING *
            "#,
        )
        .bind(loan.borrow_id)
        .bind(&loan.book_id)
        .bind(&loan.member_id)
        .bind(loan.borrow_date)
        .bind(loan.due_date)
        .bind(loan.return_date)
        .bind(loan.status.as_str())
        .bind(loan.fine_amount)
        .bind(loan.updated_at)
        .bind(expected)
        .bind(write.only_if_unfined)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(LoanWriteOutcome::LoanChanged);
        };

        for change in &write.books {
            if !Self::set_book_status(&mut tx, change, loan.updated_at).await? {
                tx.rollback().await?;
                return Ok(LoanWriteOutcome::BookUnavailable(change.book_id.clone()));
            }
        }

        tx.commit().await?;
        Ok(LoanWriteOutcome::Applied(row.try_into()?))
    }

    async fn delete(&self, borrow_id: i32, at: DateTime<Utc>) -> AppResult<Option<Loan>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LoanRow>(
            "DELETE FROM borrowed_books WHERE borrow_id = $1 RETURNING *",
        )
        .bind(borrow_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let loan: Loan = row.try_into()?;
        if loan.status.is_active() {
            Self::set_book_status(
                &mut tx,
                &BookStatusChange {
                    book_id: loan.book_id.clone(),
                    status: BookStatus::Available,
                    expected: None,
                },
                at,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(Some(loan))
    }

    async fn find_overdue(&self, today: NaiveDate) -> AppResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, LoanRow>(
            r#"
            SELECT * FROM borrowed_books
            WHERE status = 'Borrowed' AND due_date < $1
            ORDER BY due_date, borrow_id
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Loan::try_from).collect()
    }

    async fn find_unfined_lost(&self) -> AppResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, LoanRow>(
            r#"
            SELECT * FROM borrowed_books
            WHERE status = 'Lost' AND COALESCE(fine_amount, 0) = 0
            ORDER BY borrow_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Loan::try_from).collect()
    }

    async fn count_borrowed_by_member(&self, member_id: &str) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM borrowed_books WHERE member_id = $1 AND status = 'Borrowed'",
        )
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
