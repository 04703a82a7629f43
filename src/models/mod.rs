//! Data models for CurateHub

pub mod book;
pub mod librarian;
pub mod loan;
pub mod member;
pub mod stats;

// Re-export commonly used types
pub use book::{Book, BookStatus, Category};
pub use librarian::{Librarian, LibrarianClaims};
pub use loan::{Loan, LoanDetails, LoanStatus};
pub use member::{Member, MemberStatus, MemberSummary};
pub use stats::{LibrarySummary, PopularBook, TopBorrower};
