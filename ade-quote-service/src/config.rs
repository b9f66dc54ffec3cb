//! Environment-driven service configuration, read once at startup.

use anyhow::{anyhow, Result};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    /// When set, session contexts are persisted in Postgres.
    pub database_url: Option<String>,
    pub openrouter_api_key: String,
    pub crm_base_url: String,
    pub crm_api_key: String,
    pub pricing_base_url: String,
    pub pricing_login: String,
    pub pricing_password: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
            openrouter_api_key: required("OPENROUTER_API_KEY")?,
            crm_base_url: required("CRM_API_URL")?,
            crm_api_key: required("CRM_API_KEY")?,
            pricing_base_url: required("PRICING_API_URL")?,
            pricing_login: required("PRICING_API_LOGIN")?,
            pricing_password: required("PRICING_API_PASSWORD")?,
        })
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| anyhow!("{name} not set"))
}
