//! Statistics service

use crate::{
    error::{AppError, AppResult},
    models::stats::{LibrarySummary, PopularBook, TopBorrower},
    repository::Repository,
};

pub const DEFAULT_RANKING_LIMIT: i64 = 10;
const MAX_RANKING_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

fn ranking_limit(limit: Option<i64>) -> AppResult<i64> {
    match limit.unwrap_or(DEFAULT_RANKING_LIMIT) {
        n if (1..=MAX_RANKING_LIMIT).contains(&n) => Ok(n),
        _ => Err(AppError::Validation(format!(
            "Limit must be between 1 and {}",
            MAX_RANKING_LIMIT
        ))),
    }
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn summary(&self) -> AppResult<LibrarySummary> {
        self.repository.stats.summary().await
    }

    /// Members ranked by number of loans
    pub async fn top_borrowers(&self, limit: Option<i64>) -> AppResult<Vec<TopBorrower>> {
        self.repository.stats.top_borrowers(ranking_limit(limit)?).await
    }

    /// Books ranked by number of loans
    pub async fn popular_books(&self, limit: Option<i64>) -> AppResult<Vec<PopularBook>> {
        self.repository.stats.popular_books(ranking_limit(limit)?).await
    }
}
