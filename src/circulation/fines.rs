//! Due dates and fines

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use crate::config::CirculationConfig;

pub const DEFAULT_BORROWING_PERIOD_DAYS: u32 = 14;

pub fn calculate_due_date(borrow_date: NaiveDate, period_days: u32) -> NaiveDate {
    borrow_date + Duration::days(i64::from(period_days))
}

/// Whole days between `due_date` and `as_of`, never negative.
pub fn days_overdue(due_date: NaiveDate, as_of: NaiveDate) -> i64 {
    (as_of - due_date).num_days().max(0)
}

/// Fine owed for a loan due on `due_date`.
///
/// Counted up to `return_date`, or up to `today` while the book is still out.
pub fn calculate_fine(
    due_date: NaiveDate,
    return_date: Option<NaiveDate>,
    today: NaiveDate,
    daily_rate: Decimal,
) -> Decimal {
    let as_of = return_date.unwrap_or(today);
    Decimal::from(days_overdue(due_date, as_of)) * daily_rate
}

/// The three amounts charged by the library.
///
/// The overdue sweep and the fine preview deliberately use different daily
/// rates; see DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FineSchedule {
    pub standard_daily_rate: Decimal,
    pub overdue_daily_rate: Decimal,
    pub lost_book_fine: Decimal,
}

impl Default for FineSchedule {
    fn default() -> Self {
        Self {
            standard_daily_rate: Decimal::from(50),
            overdue_daily_rate: Decimal::from(100),
            lost_book_fine: Decimal::from(1000),
        }
    }
}

impl From<&CirculationConfig> for FineSchedule {
    fn from(config: &CirculationConfig) -> Self {
        Self {
            standard_daily_rate: Decimal::from(config.standard_daily_rate),
            overdue_daily_rate: Decimal::from(config.overdue_daily_rate),
            lost_book_fine: Decimal::from(config.lost_book_fine),
        }
    }
}

impl FineSchedule {
    /// Potential fine at the standard rate
    pub fn preview(&self, due_date: NaiveDate, return_date: Option<NaiveDate>, today: NaiveDate) -> Decimal {
        calculate_fine(due_date, return_date, today, self.standard_daily_rate)
    }

    /// Fine written by the sweep when a loan turns overdue
    pub fn overdue_fine(&self, due_date: NaiveDate, today: NaiveDate) -> Decimal {
        calculate_fine(due_date, None, today, self.overdue_daily_rate)
    }

    /// Flat lost-book fine, applied only when nothing has been charged yet.
    pub fn lost_fine(&self, current: Decimal) -> Decimal {
        if current.is_zero() {
            self.lost_book_fine
        } else {
            current
        }
    }
}

/// Peso amount with thousands separators, e.g. `₱1,250.00`
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{}₱{}.{}", sign, grouped, cents)
}
