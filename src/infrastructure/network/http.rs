// HTTP client utilities
use crate::domain::error::DexError;
use crate::infrastructure::config::Config;
use reqwest::Client;
use std::time::Duration;

/// Create the shared HTTP client from config settings
pub fn create_client(config: &Config) -> Result<Client, DexError> {
    Ok(Client::builder()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(config.user_agent.as_str())
        .build()?)
}
