//! Pure circulation rules: identifiers, field formats and fines.
//!
//! Nothing here touches storage or the clock; callers pass in the dates they
//! want evaluated.

pub mod fines;
pub mod ids;
pub mod validation;

pub use fines::{calculate_due_date, calculate_fine, format_currency, FineSchedule};
pub use ids::{generate_id, BOOK_PREFIX, MEMBER_PREFIX};
pub use validation::{
    normalize_isbn, validate_email, validate_isbn, validate_mobile, validate_username,
};
