//! In-process store implementing every repository trait.
//!
//! All data lives behind one async mutex, so each trait call is atomic in the
//! same way a single PostgreSQL transaction is. Ordering, filtering and
//! conflict rules mirror the SQL implementations.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::{BookRepository, LibrarianRepository, LoanRepository, MemberRepository, StatsRepository};
use crate::{
    circulation::ids::sequence_order,
    error::{AppError, AppResult},
    models::{
        book::{Book, BookFields, BookQuery, BookStatus},
        librarian::Librarian,
        loan::{Loan, LoanDetails, LoanQuery, LoanStatus, LoanWrite, LoanWriteOutcome, NewLoan},
        member::{Member, MemberQuery, MemberStatus, MemberSummary, UpdateMember},
        stats::{LibrarySummary, PopularBook, TopBorrower},
    },
};

#[derive(Default)]
struct State {
    books: HashMap<String, Book>,
    members: HashMap<String, Member>,
    loans: BTreeMap<i32, Loan>,
    last_borrow_id: i32,
    librarians: Vec<Librarian>,
}

impl State {
    fn book(&self, book_id: &str) -> AppResult<&Book> {
        self.books
            .get(book_id)
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))
    }

    fn member(&self, member_id: &str) -> AppResult<&Member> {
        self.members
            .get(member_id)
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", member_id)))
    }

    fn borrowed_count(&self, member_id: &str) -> i64 {
        self.loans
            .values()
            .filter(|l| l.member_id == member_id && l.status == LoanStatus::Borrowed)
            .count() as i64
    }

    fn summary_of(&self, member: &Member) -> MemberSummary {
        MemberSummary {
            member: member.clone(),
            borrowed_count: self.borrowed_count(&member.member_id),
        }
    }

    fn details_of(&self, loan: &Loan) -> Option<LoanDetails> {
        self.books.get(&loan.book_id).map(|book| LoanDetails {
            loan: loan.clone(),
            book_title: book.title.clone(),
        })
    }

    fn has_active_loan(&self, matches: impl Fn(&Loan) -> bool) -> bool {
        self.loans.values().any(|l| l.status.is_active() && matches(l))
    }
}

/// Lowercased search needle; `None` for blank input
fn needle(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl BookRepository for MemoryStore {
    async fn last_id(&self) -> AppResult<Option<String>> {
        let state = self.state.lock().await;
        Ok(state.books.keys().max_by(|a, b| sequence_order(a).cmp(&sequence_order(b))).cloned())
    }

    async fn create(&self, book: &Book) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        if state.books.contains_key(&book.book_id) {
            return Err(AppError::DuplicateId(book.book_id.clone()));
        }
        if state.books.values().any(|b| b.isbn == book.isbn) {
            return Err(AppError::Conflict("ISBN already exists".to_string()));
        }
        state.books.insert(book.book_id.clone(), book.clone());
        Ok(book.clone())
    }

    async fn get_by_id(&self, book_id: &str) -> AppResult<Book> {
        let state = self.state.lock().await;
        state.book(book_id).cloned()
    }

    async fn search(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        let needle = needle(query.search.as_deref());
        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|b| query.category.map_or(true, |c| b.category == c))
            .filter(|b| query.status.map_or(true, |s| b.status == s))
            .filter(|b| {
                needle.as_deref().map_or(true, |n| {
                    contains(&b.book_id, n)
                        || contains(&b.title, n)
                        || contains(&b.author, n)
                        || contains(&b.isbn, n)
                })
            })
            .cloned()
            .collect();
        books.sort_by(|a, b| sequence_order(&a.book_id).cmp(&sequence_order(&b.book_id)));
        Ok(books)
    }

    async fn update(&self, book_id: &str, fields: &BookFields, at: DateTime<Utc>) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        state.book(book_id)?;
        if state
            .books
            .values()
            .any(|b| b.book_id != book_id && b.isbn == fields.isbn)
        {
            return Err(AppError::Conflict("ISBN already exists".to_string()));
        }

        let book = state
            .books
            .get_mut(book_id)
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))?;
        book.title = fields.title.clone();
        book.author = fields.author.clone();
        book.isbn = fields.isbn.clone();
        book.category = fields.category;
        book.updated_at = at;
        Ok(book.clone())
    }

    async fn delete_if_idle(&self, book_id: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        if state.has_active_loan(|l| l.book_id == book_id) {
            return Ok(false);
        }
        let removed = state.books.remove(book_id).is_some();
        if removed {
            state.loans.retain(|_, l| l.book_id != book_id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl MemberRepository for MemoryStore {
    async fn last_id(&self) -> AppResult<Option<String>> {
        let state = self.state.lock().await;
        Ok(state.members.keys().max_by(|a, b| sequence_order(a).cmp(&sequence_order(b))).cloned())
    }

    async fn create(&self, member: &Member) -> AppResult<Member> {
        let mut state = self.state.lock().await;
        if state.members.contains_key(&member.member_id) {
            return Err(AppError::DuplicateId(member.member_id.clone()));
        }
        if state.members.values().any(|m| m.email == member.email) {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }
        state.members.insert(member.member_id.clone(), member.clone());
        Ok(member.clone())
    }

    async fn get_by_id(&self, member_id: &str) -> AppResult<Member> {
        let state = self.state.lock().await;
        state.member(member_id).cloned()
    }

    async fn get_summary(&self, member_id: &str) -> AppResult<MemberSummary> {
        let state = self.state.lock().await;
        let member = state.member(member_id)?;
        Ok(state.summary_of(member))
    }

    async fn search(&self, query: &MemberQuery) -> AppResult<Vec<MemberSummary>> {
        let state = self.state.lock().await;
        let needle = needle(query.search.as_deref());
        let mut members: Vec<&Member> = state
            .members
            .values()
            .filter(|m| query.status.map_or(true, |s| m.status == s))
            .filter(|m| {
                needle.as_deref().map_or(true, |n| {
                    contains(&m.member_id, n)
                        || contains(&m.full_name, n)
                        || contains(&m.email, n)
                        || contains(&m.mobile_number, n)
                })
            })
            .collect();
        members.sort_by(|a, b| sequence_order(&a.member_id).cmp(&sequence_order(&b.member_id)));
        Ok(members.into_iter().map(|m| state.summary_of(m)).collect())
    }

    async fn update(&self, member_id: &str, fields: &UpdateMember, at: DateTime<Utc>) -> AppResult<Member> {
        let mut state = self.state.lock().await;
        state.member(member_id)?;
        if state
            .members
            .values()
            .any(|m| m.member_id != member_id && m.email == fields.email)
        {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let member = state
            .members
            .get_mut(member_id)
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", member_id)))?;
        member.full_name = fields.full_name.clone();
        member.email = fields.email.clone();
        member.mobile_number = fields.mobile_number.clone();
        member.status = fields.status;
        member.updated_at = at;
        Ok(member.clone())
    }

    async fn delete_if_idle(&self, member_id: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        if state.has_active_loan(|l| l.member_id == member_id) {
            return Ok(false);
        }
        let removed = state.members.remove(member_id).is_some();
        if removed {
            state.loans.retain(|_, l| l.member_id != member_id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl LoanRepository for MemoryStore {
    async fn get_by_id(&self, borrow_id: i32) -> AppResult<Loan> {
        let state = self.state.lock().await;
        state
            .loans
            .get(&borrow_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", borrow_id)))
    }

    async fn get_details(&self, borrow_id: i32) -> AppResult<LoanDetails> {
        let state = self.state.lock().await;
        state
            .loans
            .get(&borrow_id)
            .and_then(|loan| state.details_of(loan))
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", borrow_id)))
    }

    async fn search(&self, query: &LoanQuery) -> AppResult<Vec<LoanDetails>> {
        let state = self.state.lock().await;
        let needle = needle(query.search.as_deref());
        let mut loans: Vec<LoanDetails> = state
            .loans
            .values()
            .filter(|l| query.status.map_or(true, |s| l.status == s))
            .filter_map(|l| state.details_of(l))
            .filter(|d| {
                needle.as_deref().map_or(true, |n| {
                    contains(&d.loan.book_id, n)
                        || contains(&d.loan.member_id, n)
                        || contains(&d.book_title, n)
                })
            })
            .collect();
        loans.sort_by_key(|d| (d.loan.due_date, d.loan.borrow_id));
        Ok(loans)
    }

    async fn issue(&self, new_loan: &NewLoan) -> AppResult<Option<Loan>> {
        let mut state = self.state.lock().await;
        match state.books.get(&new_loan.book_id) {
            Some(book) if book.status == BookStatus::Available => {}
            _ => return Ok(None),
        }
        state.member(&new_loan.member_id)?;

        if new_loan.activate_member {
            if let Some(member) = state.members.get_mut(&new_loan.member_id) {
                if member.status == MemberStatus::Inactive {
                    member.status = MemberStatus::Active;
                    member.updated_at = new_loan.at;
                }
            }
        }
        if let Some(book) = state.books.get_mut(&new_loan.book_id) {
            book.status = BookStatus::Borrowed;
            book.updated_at = new_loan.at;
        }

        state.last_borrow_id += 1;
        let loan = Loan {
            borrow_id: state.last_borrow_id,
            book_id: new_loan.book_id.clone(),
            member_id: new_loan.member_id.clone(),
            borrow_date: new_loan.borrow_date,
            due_date: new_loan.due_date,
            return_date: None,
            status: LoanStatus::Borrowed,
            fine_amount: Decimal::ZERO,
            updated_at: new_loan.at,
        };
        state.loans.insert(loan.borrow_id, loan.clone());
        Ok(Some(loan))
    }

    async fn save(&self, write: &LoanWrite) -> AppResult<LoanWriteOutcome> {
        let mut state = self.state.lock().await;
        let loan = &write.loan;

        let matches = state.loans.get(&loan.borrow_id).map_or(false, |current| {
            write.expected_status.contains(&current.status)
                && (!write.only_if_unfined || current.fine_amount.is_zero())
        });
        if !matches {
            return Ok(LoanWriteOutcome::LoanChanged);
        }
        state.book(&loan.book_id)?;
        state.member(&loan.member_id)?;

        // Check every guarded book change before touching anything
        let mut pending: Vec<(String, BookStatus)> = Vec::with_capacity(write.books.len());
        for change in &write.books {
            let current = pending
                .iter()
                .rev()
                .find(|(id, _)| *id == change.book_id)
                .map(|(_, status)| *status)
                .or_else(|| state.books.get(&change.book_id).map(|b| b.status));
            match current {
                Some(status) if change.expected.map_or(true, |e| e == status) => {
                    pending.push((change.book_id.clone(), change.status));
                }
                _ => return Ok(LoanWriteOutcome::BookUnavailable(change.book_id.clone())),
            }
        }

        for (book_id, status) in pending {
            if let Some(book) = state.books.get_mut(&book_id) {
                book.status = status;
                book.updated_at = loan.updated_at;
            }
        }
        state.loans.insert(loan.borrow_id, loan.clone());
        Ok(LoanWriteOutcome::Applied(loan.clone()))
    }

    async fn delete(&self, borrow_id: i32, at: DateTime<Utc>) -> AppResult<Option<Loan>> {
        let mut state = self.state.lock().await;
        let Some(loan) = state.loans.remove(&borrow_id) else {
            return Ok(None);
        };
        if loan.status.is_active() {
            if let Some(book) = state.books.get_mut(&loan.book_id) {
                book.status = BookStatus::Available;
                book.updated_at = at;
            }
        }
        Ok(Some(loan))
    }

    async fn find_overdue(&self, today: NaiveDate) -> AppResult<Vec<Loan>> {
        let state = self.state.lock().await;
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| l.status == LoanStatus::Borrowed && l.due_date < today)
            .cloned()
            .collect();
        loans.sort_by_key(|l| (l.due_date, l.borrow_id));
        Ok(loans)
    }

    async fn find_unfined_lost(&self) -> AppResult<Vec<Loan>> {
        let state = self.state.lock().await;
        Ok(state
            .loans
            .values()
            .filter(|l| l.status == LoanStatus::Lost && l.fine_amount.is_zero())
            .cloned()
            .collect())
    }

    async fn count_borrowed_by_member(&self, member_id: &str) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state.borrowed_count(member_id))
    }
}

#[async_trait]
impl StatsRepository for MemoryStore {
    async fn summary(&self) -> AppResult<LibrarySummary> {
        let state = self.state.lock().await;
        let count_members =
            |status: MemberStatus| state.members.values().filter(|m| m.status == status).count() as i64;
        let count_loans =
            |status: LoanStatus| state.loans.values().filter(|l| l.status == status).count() as i64;

        Ok(LibrarySummary {
            active_members: count_members(MemberStatus::Active),
            inactive_members: count_members(MemberStatus::Inactive),
            borrowed_books: count_loans(LoanStatus::Borrowed),
            overdue_books: count_loans(LoanStatus::Overdue),
            total_fines: state
                .loans
                .values()
                .filter(|l| matches!(l.status, LoanStatus::Borrowed | LoanStatus::Overdue))
                .map(|l| l.fine_amount)
                .sum(),
        })
    }

    async fn top_borrowers(&self, limit: i64) -> AppResult<Vec<TopBorrower>> {
        let state = self.state.lock().await;
        let mut totals: HashMap<&str, (i64, Decimal)> = HashMap::new();
        for loan in state.loans.values() {
            let entry = totals.entry(loan.member_id.as_str()).or_default();
            entry.0 += 1;
            entry.1 += loan.fine_amount;
        }

        let mut rows: Vec<TopBorrower> = totals
            .into_iter()
            .filter_map(|(member_id, (count, fines))| {
                state.members.get(member_id).map(|m| TopBorrower {
                    member_id: m.member_id.clone(),
                    full_name: m.full_name.clone(),
                    total_borrowed: count,
                    total_fines: fines,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.total_borrowed
                .cmp(&a.total_borrowed)
                .then_with(|| a.member_id.cmp(&b.member_id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn popular_books(&self, limit: i64) -> AppResult<Vec<PopularBook>> {
        let state = self.state.lock().await;
        let mut counts: HashMap<&str, i64> = HashMap::new();
        for loan in state.loans.values() {
            *counts.entry(loan.book_id.as_str()).or_default() += 1;
        }

        let mut rows: Vec<PopularBook> = counts
            .into_iter()
            .filter_map(|(book_id, count)| {
                state.books.get(book_id).map(|b| PopularBook {
                    book_id: b.book_id.clone(),
                    title: b.title.clone(),
                    author: b.author.clone(),
                    borrow_count: count,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.borrow_count
                .cmp(&a.borrow_count)
                .then_with(|| a.book_id.cmp(&b.book_id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }
}

#[async_trait]
impl LibrarianRepository for MemoryStore {
    async fn get_by_username(&self, username: &str) -> AppResult<Option<Librarian>> {
        let state = self.state.lock().await;
        Ok(state.librarians.iter().find(|l| l.username == username).cloned())
    }

    async fn get_by_id(&self, librarian_id: i32) -> AppResult<Option<Librarian>> {
        let state = self.state.lock().await;
        Ok(state
            .librarians
            .iter()
            .find(|l| l.librarian_id == librarian_id)
            .cloned())
    }

    async fn create_if_absent(&self, username: &str, password_hash: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        if state.librarians.iter().any(|l| l.username == username) {
            return Ok(false);
        }
        let librarian = Librarian {
            librarian_id: state.librarians.len() as i32 + 1,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        state.librarians.push(librarian);
        Ok(true)
    }
}
