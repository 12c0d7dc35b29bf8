// parfum/src/error.rs
use thiserror::Error;

/// Message shown to the user when an auth call fails for a reason the
/// backend did not describe.
pub const GENERIC_AUTH_MESSAGE: &str = "An unexpected error occurred";

/// Errors produced by the backends.
///
/// These never reach the cart state holder: `RemoteService` logs them and
/// hands back an empty or `None` result instead.
#[derive(Debug, Error)]
pub enum CartError {
  #[error("HTTP request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Database Error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Migration Error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  /// The auth backend rejected the request with a message meant for the user.
  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Backend responded with status {status}: {message}")]
  Api { status: u16, message: String },

  #[error("Failed to decode backend response: {0}")]
  Decode(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("No active session")]
  NotAuthenticated,

  #[error("Internal Error: {0}")]
  Internal(String),
}

impl From<serde_json::Error> for CartError {
  fn from(err: serde_json::Error) -> Self {
    CartError::Decode(err.to_string())
  }
}

/// User-facing failure of a sign-up, sign-in, refresh or sign-out call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthFailure {
  pub message: String,
}

impl AuthFailure {
  pub fn new(message: impl Into<String>) -> Self {
    Self { message: message.into() }
  }

  pub fn generic() -> Self {
    Self::new(GENERIC_AUTH_MESSAGE)
  }
}

impl From<CartError> for AuthFailure {
  fn from(err: CartError) -> Self {
    match err {
      CartError::Auth(message) => AuthFailure::new(message),
      _ => AuthFailure::generic(),
    }
  }
}

pub type Result<T, E = CartError> = std::result::Result<T, E>;
