//! Business logic services

pub mod auth;
pub mod catalog;
pub mod circulation;
pub mod patrons;
pub mod stats;

use std::sync::Arc;

use crate::{clock::Clock, config::AppConfig, error::AppError, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub patrons: patrons::PatronsService,
    pub circulation: circulation::CirculationService,
    pub stats: stats::StatsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let retries = config.circulation.id_retry_attempts;
        Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            catalog: catalog::CatalogService::new(repository.clone(), clock.clone(), retries),
            patrons: patrons::PatronsService::new(repository.clone(), clock.clone(), retries),
            circulation: circulation::CirculationService::new(
                repository.clone(),
                clock,
                &config.circulation,
            ),
            stats: stats::StatsService::new(repository),
        }
    }
}

/// Replace a repository `NotFound` with the message shown to the operator
pub(crate) fn not_found_as(message: &'static str) -> impl Fn(AppError) -> AppError {
    move |err| match err {
        AppError::NotFound(_) => AppError::NotFound(message.to_string()),
        other => other,
    }
}
