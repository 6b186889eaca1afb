use std::sync::Arc;

use config::Config;
use rate_limit::RateLimiter;

pub mod config;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, limiter: RateLimiter) -> Self {
        Self {
            config: Arc::new(config),
            limiter: Arc::new(limiter),
        }
    }
}
