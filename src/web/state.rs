use crate::config::AppConfig;
use crate::pipeline::QueryService;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub service: QueryService,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, service: QueryService) -> Self {
        Self {
            config,
            service,
            startup_time: chrono::Utc::now(),
        }
    }
}
