//! Circulation desk: issuing, returning and tracking loans.
//!
//! Every state change goes through [`LoanRepository::issue`] or
//! [`LoanRepository::save`], which apply the loan and book writes together and
//! only if the loan is still in the status this service read. A concurrent
//! writer therefore surfaces as a `Conflict` instead of a half-applied change.
//!
//! [`LoanRepository::issue`]: crate::repository::LoanRepository::issue
//! [`LoanRepository::save`]: crate::repository::LoanRepository::save

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use super::not_found_as;
use crate::{
    circulation::{calculate_due_date, fines::days_overdue, format_currency, FineSchedule},
    clock::Clock,
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::{
        book::BookStatus,
        loan::{
            BookStatusChange, IssueLoan, Loan, LoanDetails, LoanQuery, LoanStatus, LoanWrite,
            LoanWriteOutcome, NewLoan, UpdateLoan,
        },
        member::MemberStatus,
    },
    repository::Repository,
};

const BOOK_NOT_AVAILABLE: &str = "Book is not available for borrowing";
const LOAN_CHANGED: &str = "Loan was changed by another operation, reload and try again";

/// A loan after a state change, plus anything the operator should be told
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanReceipt {
    pub loan: Loan,
    pub notice: Option<String>,
}

/// What one sweep pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    /// Borrowed loans moved to Overdue
    pub overdue: usize,
    /// Lost loans that received the flat fine
    pub lost_fined: usize,
    /// Loans that could not be written (logged)
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FinePreview {
    pub borrow_id: i32,
    pub days_overdue: i64,
    pub daily_rate: Decimal,
    pub amount: Decimal,
    /// e.g. `₱150.00`
    pub formatted: String,
}

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    fines: FineSchedule,
    default_period_days: u32,
    max_period_days: u32,
}

impl CirculationService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>, config: &CirculationConfig) -> Self {
        Self {
            repository,
            clock,
            fines: FineSchedule::from(config),
            default_period_days: config.default_period_days,
            max_period_days: config.max_period_days,
        }
    }

    /// Lend an available book to a member. Inactive members are reactivated.
    pub async fn issue(&self, request: &IssueLoan) -> AppResult<LoanReceipt> {
        request.validate()?;
        let book_id = request.book_id.trim();
        let member_id = request.member_id.trim();

        let period = request.period_days.unwrap_or(self.default_period_days);
        if period < 1 || period > self.max_period_days {
            return Err(AppError::Validation(format!(
                "Borrowing period must be between 1 and {} days",
                self.max_period_days
            )));
        }

        let book = self
            .repository
            .books
            .get_by_id(book_id)
            .await
            .map_err(not_found_as("Book ID not found"))?;
        if book.status != BookStatus::Available {
            return Err(AppError::Conflict(BOOK_NOT_AVAILABLE.to_string()));
        }
        let member = self
            .repository
            .members
            .get_by_id(member_id)
            .await
            .map_err(not_found_as("Member ID not found"))?;
        let activate_member = member.status == MemberStatus::Inactive;

        let today = self.clock.today();
        let new_loan = NewLoan {
            book_id: book.book_id.clone(),
            member_id: member.member_id.clone(),
            borrow_date: today,
            due_date: calculate_due_date(today, period),
            activate_member,
            at: self.clock.now(),
        };

        // The book may have been lent out since we read it
        let loan = self
            .repository
            .loans
            .issue(&new_loan)
            .await?
            .ok_or_else(|| AppError::Conflict(BOOK_NOT_AVAILABLE.to_string()))?;

        tracing::info!(
            borrow_id = loan.borrow_id,
            book_id = %loan.book_id,
            member_id = %loan.member_id,
            due_date = %loan.due_date,
            "Book issued"
        );

        let notice = activate_member.then(|| {
            tracing::info!(member_id = %member.member_id, "Inactive member activated on issue");
            format!("Member {} has been activated for borrowing", member.member_id)
        });
        Ok(LoanReceipt { loan, notice })
    }

    /// Mark Borrowed loans past their due date as Overdue and fine unfined Lost loans.
    ///
    /// Each loan is written conditionally, so running this twice, or alongside
    /// a return, never charges a loan twice.
    pub async fn sweep(&self) -> AppResult<SweepReport> {
        let today = self.clock.today();
        let now = self.clock.now();
        let mut report = SweepReport::default();

        for loan in self.repository.loans.find_overdue(today).await? {
            let write = LoanWrite {
                loan: Loan {
                    status: LoanStatus::Overdue,
                    fine_amount: self.fines.overdue_fine(loan.due_date, today),
                    updated_at: now,
                    ..loan
                },
                expected_status: vec![LoanStatus::Borrowed],
                only_if_unfined: false,
                books: Vec::new(),
            };
            match self.repository.loans.save(&write).await {
                Ok(LoanWriteOutcome::Applied(_)) => report.overdue += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(borrow_id = write.loan.borrow_id, "Failed to mark loan overdue: {}", e);
                    report.failed += 1;
                }
            }
        }

        for loan in self.repository.loans.find_unfined_lost().await? {
            let write = LoanWrite {
                loan: Loan {
                    fine_amount: self.fines.lost_fine(loan.fine_amount),
                    updated_at: now,
                    ..loan
                },
                expected_status: vec![LoanStatus::Lost],
                only_if_unfined: true,
                books: Vec::new(),
            };
            match self.repository.loans.save(&write).await {
                Ok(LoanWriteOutcome::Applied(_)) => report.lost_fined += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(borrow_id = write.loan.borrow_id, "Failed to fine lost loan: {}", e);
                    report.failed += 1;
                }
            }
        }

        if report != SweepReport::default() {
            tracing::info!(
                overdue = report.overdue,
                lost_fined = report.lost_fined,
                failed = report.failed,
                "Loan sweep finished"
            );
        }
        Ok(report)
    }

    /// Check a book back in. The fine already on the loan is kept.
    pub async fn return_loan(&self, borrow_id: i32) -> AppResult<LoanReceipt> {
        let current = self.get_loan_record(borrow_id).await?;
        if current.status == LoanStatus::Returned {
            return Err(AppError::Conflict("Loan has already been returned".to_string()));
        }

        let write = LoanWrite {
            loan: Loan {
                status: LoanStatus::Returned,
                return_date: Some(self.clock.today()),
                updated_at: self.clock.now(),
                ..current.clone()
            },
            expected_status: vec![current.status],
            only_if_unfined: false,
            books: vec![BookStatusChange {
                book_id: current.book_id.clone(),
                status: BookStatus::Available,
                expected: None,
            }],
        };
        let loan = self.apply(&write).await?;

        tracing::info!(
            borrow_id = loan.borrow_id,
            book_id = %loan.book_id,
            fine = %loan.fine_amount,
            "Book returned"
        );
        let notice = self.no_more_loans_notice(&loan.member_id).await?;
        Ok(LoanReceipt { loan, notice })
    }

    /// Record a Borrowed or Overdue loan as lost and charge the flat fine if nothing is owed yet.
    pub async fn mark_lost(&self, borrow_id: i32) -> AppResult<LoanReceipt> {
        let current = self.get_loan_record(borrow_id).await?;
        if !matches!(current.status, LoanStatus::Borrowed | LoanStatus::Overdue) {
            return Err(AppError::Conflict(
                "Only borrowed or overdue loans can be marked lost".to_string(),
            ));
        }

        let write = LoanWrite {
            loan: Loan {
                status: LoanStatus::Lost,
                fine_amount: self.fines.lost_fine(current.fine_amount),
                updated_at: self.clock.now(),
                ..current.clone()
            },
            expected_status: vec![current.status],
            only_if_unfined: false,
            books: vec![BookStatusChange {
                book_id: current.book_id.clone(),
                status: BookStatus::Lost,
                expected: None,
            }],
        };
        let loan = self.apply(&write).await?;

        tracing::info!(
            borrow_id = loan.borrow_id,
            book_id = %loan.book_id,
            fine = %loan.fine_amount,
            "Book marked lost"
        );
        Ok(LoanReceipt { loan, notice: None })
    }

    /// Overwrite a loan record.
    ///
    /// The book status follows the new loan status. Reopening a returned loan
    /// or moving a loan to a different book requires that book to be Available.
    /// A book is only released when this loan was holding it.
    pub async fn update_loan(&self, borrow_id: i32, request: &UpdateLoan) -> AppResult<LoanReceipt> {
        request.validate()?;
        if request.fine_amount < Decimal::ZERO {
            return Err(AppError::Validation("Fine amount cannot be negative".to_string()));
        }
        if request.due_date < request.borrow_date {
            return Err(AppError::Validation(
                "Due date cannot be before the borrow date".to_string(),
            ));
        }

        let book_id = request.book_id.trim().to_string();
        let member_id = request.member_id.trim().to_string();
        let current = self.get_loan_record(borrow_id).await?;

        let book_changed = book_id != current.book_id;
        if book_changed {
            self.repository
                .books
                .get_by_id(&book_id)
                .await
                .map_err(not_found_as("Book ID not found"))?;
        }
        if member_id != current.member_id {
            self.repository
                .members
                .get_by_id(&member_id)
                .await
                .map_err(not_found_as("Member ID not found"))?;
        }

        let status = request.status;
        let return_date = match status {
            LoanStatus::Returned => current.return_date.or(Some(self.clock.today())),
            _ => None,
        };
        let fine_amount = match status {
            LoanStatus::Lost => self.fines.lost_fine(request.fine_amount),
            _ => request.fine_amount,
        };

        // Only an active loan holds its book. A returned loan's book may be
        // on loan to someone else by now.
        let was_active = current.status.is_active();
        let mut books = Vec::with_capacity(2);
        if was_active && (book_changed || !status.is_active()) {
            books.push(BookStatusChange {
                book_id: current.book_id.clone(),
                status: BookStatus::Available,
                expected: None,
            });
        }
        if status.is_active() {
            let holds_book = was_active && !book_changed;
            books.push(BookStatusChange {
                book_id: book_id.clone(),
                status: status.book_status(),
                expected: (!holds_book).then_some(BookStatus::Available),
            });
        }

        let write = LoanWrite {
            loan: Loan {
                borrow_id,
                book_id,
                member_id,
                borrow_date: request.borrow_date,
                due_date: request.due_date,
                return_date,
                status,
                fine_amount,
                updated_at: self.clock.now(),
            },
            expected_status: vec![current.status],
            only_if_unfined: false,
            books,
        };
        let loan = self.apply(&write).await?;

        tracing::info!(borrow_id = loan.borrow_id, status = %loan.status, "Loan updated");
        let notice = match loan.status {
            LoanStatus::Returned => self.no_more_loans_notice(&loan.member_id).await?,
            _ => None,
        };
        Ok(LoanReceipt { loan, notice })
    }

    /// Remove a loan record. An active loan releases its book.
    pub async fn delete_loan(&self, borrow_id: i32) -> AppResult<Loan> {
        let loan = self
            .repository
            .loans
            .delete(borrow_id, self.clock.now())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", borrow_id)))?;
        tracing::info!(borrow_id, book_id = %loan.book_id, "Loan deleted");
        Ok(loan)
    }

    pub async fn get_loan(&self, borrow_id: i32) -> AppResult<LoanDetails> {
        self.repository.loans.get_details(borrow_id).await
    }

    /// Loans ordered by due date. Statuses are brought up to date first.
    pub async fn list_loans(&self, query: &LoanQuery) -> AppResult<Vec<LoanDetails>> {
        if let Err(e) = self.sweep().await {
            tracing::error!("Loan sweep before listing failed: {}", e);
        }
        self.repository.loans.search(query).await
    }

    /// Fine the loan would carry at the standard daily rate, as of its return
    /// date or today while it is still out.
    pub async fn fine_preview(&self, borrow_id: i32) -> AppResult<FinePreview> {
        let loan = self.get_loan_record(borrow_id).await?;
        let today = self.clock.today();
        let amount = self.fines.preview(loan.due_date, loan.return_date, today);

        Ok(FinePreview {
            borrow_id,
            days_overdue: days_overdue(loan.due_date, loan.return_date.unwrap_or(today)),
            daily_rate: self.fines.standard_daily_rate,
            amount,
            formatted: format_currency(amount),
        })
    }

    async fn get_loan_record(&self, borrow_id: i32) -> AppResult<Loan> {
        self.repository.loans.get_by_id(borrow_id).await
    }

    async fn apply(&self, write: &LoanWrite) -> AppResult<Loan> {
        match self.repository.loans.save(write).await? {
            LoanWriteOutcome::Applied(loan) => Ok(loan),
            LoanWriteOutcome::LoanChanged => {
                tracing::warn!(borrow_id = write.loan.borrow_id, "Loan changed concurrently");
                Err(AppError::Conflict(LOAN_CHANGED.to_string()))
            }
            LoanWriteOutcome::BookUnavailable(book_id) => {
                tracing::warn!(borrow_id = write.loan.borrow_id, book_id = %book_id, "Book not available");
                Err(AppError::Conflict(BOOK_NOT_AVAILABLE.to_string()))
            }
        }
    }

    async fn no_more_loans_notice(&self, member_id: &str) -> AppResult<Option<String>> {
        let remaining = self.repository.loans.count_borrowed_by_member(member_id).await?;
        Ok((remaining == 0).then(|| {
            format!(
                "Member {} has no more borrowed books. Consider reviewing their status.",
                member_id
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::MockClock,
        models::{
            book::{Book, Category},
            member::Member,
        },
    };
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn clock_at(today: NaiveDate) -> Arc<dyn Clock> {
        let mut clock = MockClock::new();
        clock.expect_today().return_const(today);
        clock
            .expect_now()
            .return_const(today.and_hms_opt(9, 0, 0).unwrap().and_utc());
        Arc::new(clock)
    }

    fn desk(repository: &Repository, today: NaiveDate) -> CirculationService {
        CirculationService::new(repository.clone(), clock_at(today), &CirculationConfig::default())
    }

    async fn seed(repository: &Repository) {
        let at = date(2024, 1, 1).and_hms_opt(8, 0, 0).unwrap().and_utc();
        for (id, isbn) in [("BK-001", "0306406152"), ("BK-002", "9780131103627")] {
            repository
                .books
                .create(&Book {
                    book_id: id.to_string(),
                    title: format!("Title {}", id),
                    author: "Author".to_string(),
                    isbn: isbn.to_string(),
                    category: Category::Fiction,
                    status: BookStatus::Available,
                    added_at: at,
                    updated_at: at,
                })
                .await
                .unwrap();
        }
        for (id, status) in [("MEM-001", MemberStatus::Active), ("MEM-002", MemberStatus::Inactive)] {
            repository
                .members
                .create(&Member {
                    member_id: id.to_string(),
                    full_name: format!("Member {}", id),
                    email: format!("{}@example.com", id.to_lowercase()),
                    mobile_number: "+63 917 123 4567".to_string(),
                    status,
                    added_at: at,
                    updated_at: at,
                })
                .await
                .unwrap();
        }
    }

    fn issue_request(book_id: &str, member_id: &str, period_days: Option<u32>) -> IssueLoan {
        IssueLoan {
            book_id: book_id.to_string(),
            member_id: member_id.to_string(),
            period_days,
        }
    }

    async fn book_status(repository: &Repository, book_id: &str) -> BookStatus {
        repository.books.get_by_id(book_id).await.unwrap().status
    }

    #[tokio::test]
    async fn test_issue_sets_due_date_and_book_status() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));

        let receipt = desk.issue(&issue_request("BK-001", "MEM-001", None)).await.unwrap();
        assert_eq!(receipt.loan.status, LoanStatus::Borrowed);
        assert_eq!(receipt.loan.borrow_date, date(2024, 1, 1));
        assert_eq!(receipt.loan.due_date, date(2024, 1, 15));
        assert!(receipt.loan.fine_amount.is_zero());
        assert!(receipt.notice.is_none());
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Borrowed);
    }

    #[tokio::test]
    async fn test_issue_activates_inactive_member() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));

        let receipt = desk.issue(&issue_request("BK-001", "MEM-002", Some(7))).await.unwrap();
        assert!(receipt.notice.unwrap().contains("MEM-002"));
        let member = repository.members.get_by_id("MEM-002").await.unwrap();
        assert_eq!(member.status, MemberStatus::Active);
    }

    #[tokio::test]
    async fn test_issue_rejects_bad_period_and_unknown_ids() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));

        for period in [0, 31] {
            assert!(matches!(
                desk.issue(&issue_request("BK-001", "MEM-001", Some(period))).await,
                Err(AppError::Validation(_))
            ));
        }
        let err = desk.issue(&issue_request("BK-404", "MEM-001", None)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Book ID not found"));
        let err = desk.issue(&issue_request("BK-001", "MEM-404", None)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Member ID not found"));
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Available);
    }

    #[tokio::test]
    async fn test_issue_borrowed_book_conflicts() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));

        desk.issue(&issue_request("BK-001", "MEM-001", None)).await.unwrap();
        let err = desk.issue(&issue_request("BK-001", "MEM-002", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == BOOK_NOT_AVAILABLE));

        // The second member was not touched
        let member = repository.members.get_by_id("MEM-002").await.unwrap();
        assert_eq!(member.status, MemberStatus::Inactive);
        assert_eq!(repository.loans.search(&LoanQuery::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_day_sweep_keeps_loan_borrowed() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));

        let loan = desk.issue(&issue_request("BK-001", "MEM-001", None)).await.unwrap().loan;
        let report = desk.sweep().await.unwrap();
        assert_eq!(report, SweepReport::default());

        let loan = repository.loans.get_by_id(loan.borrow_id).await.unwrap();
        assert_eq!(loan.status, LoanStatus::Borrowed);
        assert!(loan.fine_amount.is_zero());
    }

    #[tokio::test]
    async fn test_sweep_fines_overdue_loans_once() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let loan = desk(&repository, date(2024, 1, 1))
            .issue(&issue_request("BK-001", "MEM-001", Some(1)))
            .await
            .unwrap()
            .loan;

        // Due on Jan 2, three days late on Jan 5
        let later = desk(&repository, date(2024, 1, 5));
        let report = later.sweep().await.unwrap();
        assert_eq!(report.overdue, 1);

        let overdue = repository.loans.get_by_id(loan.borrow_id).await.unwrap();
        assert_eq!(overdue.status, LoanStatus::Overdue);
        assert_eq!(overdue.fine_amount, Decimal::from(300));

        let report = later.sweep().await.unwrap();
        assert_eq!(report.overdue, 0);
        let again = repository.loans.get_by_id(loan.borrow_id).await.unwrap();
        assert_eq!(again.fine_amount, Decimal::from(300));
    }

    #[tokio::test]
    async fn test_sweep_fines_unfined_lost_loans() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));
        let loan = desk.issue(&issue_request("BK-001", "MEM-001", None)).await.unwrap().loan;

        // A Lost loan with no fine, as left behind by older data
        let write = LoanWrite {
            loan: Loan {
                status: LoanStatus::Lost,
                ..loan.clone()
            },
            expected_status: vec![LoanStatus::Borrowed],
            only_if_unfined: false,
            books: Vec::new(),
        };
        repository.loans.save(&write).await.unwrap();

        assert_eq!(desk.sweep().await.unwrap().lost_fined, 1);
        assert_eq!(desk.sweep().await.unwrap().lost_fined, 0);
        let lost = repository.loans.get_by_id(loan.borrow_id).await.unwrap();
        assert_eq!(lost.fine_amount, Decimal::from(1000));
    }

    #[tokio::test]
    async fn test_return_overdue_loan_keeps_fine() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let loan = desk(&repository, date(2024, 1, 1))
            .issue(&issue_request("BK-001", "MEM-001", Some(1)))
            .await
            .unwrap()
            .loan;
        let later = desk(&repository, date(2024, 1, 5));
        later.sweep().await.unwrap();

        let receipt = later.return_loan(loan.borrow_id).await.unwrap();
        assert_eq!(receipt.loan.status, LoanStatus::Returned);
        assert_eq!(receipt.loan.return_date, Some(date(2024, 1, 5)));
        assert_eq!(receipt.loan.fine_amount, Decimal::from(300));
        assert!(receipt.notice.unwrap().contains("no more borrowed books"));
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Available);

        assert!(matches!(
            later.return_loan(loan.borrow_id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_return_then_reissue_to_another_member() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));

        let first = desk.issue(&issue_request("BK-001", "MEM-001", None)).await.unwrap().loan;
        desk.return_loan(first.borrow_id).await.unwrap();
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Available);

        let second = desk.issue(&issue_request("BK-001", "MEM-002", None)).await.unwrap().loan;
        assert_ne!(first.borrow_id, second.borrow_id);
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Borrowed);
    }

    #[tokio::test]
    async fn test_mark_lost_applies_flat_fine_once() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));
        let loan = desk.issue(&issue_request("BK-001", "MEM-001", None)).await.unwrap().loan;

        let lost = desk.mark_lost(loan.borrow_id).await.unwrap().loan;
        assert_eq!(lost.status, LoanStatus::Lost);
        assert_eq!(lost.fine_amount, Decimal::from(1000));
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Lost);

        assert_eq!(desk.sweep().await.unwrap().lost_fined, 0);
        assert!(matches!(
            desk.mark_lost(loan.borrow_id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_loan_resets_book() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));
        let loan = desk.issue(&issue_request("BK-001", "MEM-001", None)).await.unwrap().loan;
        desk.mark_lost(loan.borrow_id).await.unwrap();

        desk.delete_loan(loan.borrow_id).await.unwrap();
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Available);
        assert!(matches!(
            desk.delete_loan(loan.borrow_id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_loan_cannot_move_onto_borrowed_book() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));
        let first = desk.issue(&issue_request("BK-001", "MEM-001", None)).await.unwrap().loan;
        desk.issue(&issue_request("BK-002", "MEM-002", None)).await.unwrap();

        let request = UpdateLoan {
            book_id: "BK-002".to_string(),
            member_id: first.member_id.clone(),
            borrow_date: first.borrow_date,
            due_date: first.due_date,
            status: LoanStatus::Borrowed,
            fine_amount: Decimal::ZERO,
        };
        let err = desk.update_loan(first.borrow_id, &request).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Nothing moved
        let unchanged = repository.loans.get_by_id(first.borrow_id).await.unwrap();
        assert_eq!(unchanged.book_id, "BK-001");
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Borrowed);
        assert_eq!(book_status(&repository, "BK-002").await, BookStatus::Borrowed);
    }

    fn edit_request(loan: &Loan, status: LoanStatus) -> UpdateLoan {
        UpdateLoan {
            book_id: loan.book_id.clone(),
            member_id: loan.member_id.clone(),
            borrow_date: loan.borrow_date,
            due_date: loan.due_date,
            status,
            fine_amount: loan.fine_amount,
        }
    }

    /// BK-001 returned by MEM-001, then borrowed by MEM-002
    async fn reissued_book(desk: &CirculationService) -> (Loan, Loan) {
        let first = desk.issue(&issue_request("BK-001", "MEM-001", None)).await.unwrap().loan;
        let first = desk.return_loan(first.borrow_id).await.unwrap().loan;
        let second = desk.issue(&issue_request("BK-001", "MEM-002", None)).await.unwrap().loan;
        (first, second)
    }

    #[tokio::test]
    async fn test_editing_returned_loan_leaves_reissued_book_alone() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));
        let (first, _) = reissued_book(&desk).await;

        let mut request = edit_request(&first, LoanStatus::Returned);
        request.fine_amount = Decimal::from(50);
        let updated = desk.update_loan(first.borrow_id, &request).await.unwrap().loan;
        assert_eq!(updated.fine_amount, Decimal::from(50));
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Borrowed);

        assert!(matches!(
            desk.issue(&issue_request("BK-001", "MEM-001", None)).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_reopening_returned_loan_requires_available_book() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));
        let (first, second) = reissued_book(&desk).await;

        let request = edit_request(&first, LoanStatus::Borrowed);
        assert!(matches!(
            desk.update_loan(first.borrow_id, &request).await,
            Err(AppError::Conflict(_))
        ));
        let unchanged = repository.loans.get_by_id(first.borrow_id).await.unwrap();
        assert_eq!(unchanged.status, LoanStatus::Returned);

        // Once the book is back it can be reopened
        desk.return_loan(second.borrow_id).await.unwrap();
        let reopened = desk.update_loan(first.borrow_id, &request).await.unwrap().loan;
        assert_eq!(reopened.status, LoanStatus::Borrowed);
        assert!(reopened.return_date.is_none());
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Borrowed);
    }

    #[tokio::test]
    async fn test_moving_returned_loan_keeps_old_book_on_loan() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));
        let (first, _) = reissued_book(&desk).await;

        let mut request = edit_request(&first, LoanStatus::Returned);
        request.book_id = "BK-002".to_string();
        let moved = desk.update_loan(first.borrow_id, &request).await.unwrap().loan;
        assert_eq!(moved.book_id, "BK-002");
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Borrowed);
        assert_eq!(book_status(&repository, "BK-002").await, BookStatus::Available);
    }

    #[tokio::test]
    async fn test_deleting_returned_loan_keeps_reissued_book() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));
        let (first, _) = reissued_book(&desk).await;

        desk.delete_loan(first.borrow_id).await.unwrap();
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Borrowed);
    }

    #[tokio::test]
    async fn test_update_loan_moves_to_available_book() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));
        let loan = desk.issue(&issue_request("BK-001", "MEM-001", None)).await.unwrap().loan;

        let request = UpdateLoan {
            book_id: "BK-002".to_string(),
            member_id: loan.member_id.clone(),
            borrow_date: loan.borrow_date,
            due_date: date(2024, 1, 20),
            status: LoanStatus::Borrowed,
            fine_amount: Decimal::ZERO,
        };
        let updated = desk.update_loan(loan.borrow_id, &request).await.unwrap().loan;
        assert_eq!(updated.book_id, "BK-002");
        assert_eq!(updated.due_date, date(2024, 1, 20));
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Available);
        assert_eq!(book_status(&repository, "BK-002").await, BookStatus::Borrowed);
    }

    #[tokio::test]
    async fn test_update_loan_to_returned_and_lost() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let desk = desk(&repository, date(2024, 1, 1));
        let loan = desk.issue(&issue_request("BK-001", "MEM-001", None)).await.unwrap().loan;

        let mut request = UpdateLoan {
            book_id: loan.book_id.clone(),
            member_id: loan.member_id.clone(),
            borrow_date: loan.borrow_date,
            due_date: loan.due_date,
            status: LoanStatus::Lost,
            fine_amount: Decimal::ZERO,
        };
        let lost = desk.update_loan(loan.borrow_id, &request).await.unwrap().loan;
        assert_eq!(lost.fine_amount, Decimal::from(1000));
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Lost);

        request.status = LoanStatus::Returned;
        request.fine_amount = Decimal::from(250);
        let receipt = desk.update_loan(loan.borrow_id, &request).await.unwrap();
        assert_eq!(receipt.loan.return_date, Some(date(2024, 1, 1)));
        assert_eq!(receipt.loan.fine_amount, Decimal::from(250));
        assert!(receipt.notice.is_some());
        assert_eq!(book_status(&repository, "BK-001").await, BookStatus::Available);

        request.due_date = date(2023, 12, 1);
        assert!(matches!(
            desk.update_loan(loan.borrow_id, &request).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_fine_preview_uses_standard_rate() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        let loan = desk(&repository, date(2024, 1, 1))
            .issue(&issue_request("BK-001", "MEM-001", Some(1)))
            .await
            .unwrap()
            .loan;

        let preview = desk(&repository, date(2024, 1, 5))
            .fine_preview(loan.borrow_id)
            .await
            .unwrap();
        assert_eq!(preview.days_overdue, 3);
        assert_eq!(preview.amount, Decimal::from(150));
        assert_eq!(preview.formatted, "₱150.00");
    }

    #[tokio::test]
    async fn test_list_loans_sweeps_first() {
        let repository = Repository::in_memory();
        seed(&repository).await;
        desk(&repository, date(2024, 1, 1))
            .issue(&issue_request("BK-001", "MEM-001", Some(1)))
            .await
            .unwrap();

        let query = LoanQuery {
            status: Some(LoanStatus::Overdue),
            ..Default::default()
        };
        let listed = desk(&repository, date(2024, 1, 5)).list_loans(&query).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].book_title, "Title BK-001");
    }
}
