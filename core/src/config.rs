// parfum/src/config.rs

use crate::error::{CartError, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct BackendConfig {
  /// Project URL, e.g. `https://xyzcompany.supabase.co`. Stored without a trailing slash.
  pub supabase_url: String,
  pub anon_key: String,
  pub http_timeout: Duration,
  /// Only needed by the direct Postgres backend.
  pub database_url: Option<String>,
}

impl BackendConfig {
  pub fn new(supabase_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
    Self {
      supabase_url: supabase_url.into().trim_end_matches('/').to_string(),
      anon_key: anon_key.into(),
      http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
      database_url: None,
    }
  }

  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the config from an arbitrary variable source.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let require = |var_name: &str| {
      lookup(var_name)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| CartError::Config(format!("Missing environment variable '{}'", var_name)))
    };

    let supabase_url = require("SUPABASE_URL")?;
    if !supabase_url.starts_with("http://") && !supabase_url.starts_with("https://") {
      return Err(CartError::Config(format!(
        "Invalid SUPABASE_URL '{}': expected an http(s) URL",
        supabase_url
      )));
    }
    let anon_key = require("SUPABASE_ANON_KEY")?;

    let http_timeout_secs = match lookup("PARFUM_HTTP_TIMEOUT_SECS") {
      Some(raw) => raw
        .trim()
        .parse::<u64>()
        .map_err(|e| CartError::Config(format!("Invalid PARFUM_HTTP_TIMEOUT_SECS: {}", e)))?,
      None => DEFAULT_HTTP_TIMEOUT_SECS,
    };

    let database_url = lookup("DATABASE_URL").filter(|value| !value.trim().is_empty());

    tracing::debug!(supabase_url = %supabase_url, http_timeout_secs, "Backend configuration loaded.");

    let mut config = Self::new(supabase_url, anon_key);
    config.http_timeout = Duration::from_secs(http_timeout_secs);
    config.database_url = database_url;
    Ok(config)
  }

  pub(crate) fn rest_url(&self, path: &str) -> String {
    format!("{}/rest/v1/{}", self.supabase_url, path.trim_start_matches('/'))
  }

  pub(crate) fn auth_url(&self, path: &str) -> String {
    format!("{}/auth/v1/{}", self.supabase_url, path.trim_start_matches('/'))
  }
}
