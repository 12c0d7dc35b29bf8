// parfum/src/models/session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
  pub id: Uuid,
  #[serde(default)]
  pub email: Option<String>,
}

/// An authenticated session issued by the auth backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: Option<DateTime<Utc>>,
  pub user: AuthUser,
}

impl Session {
  pub fn user_id(&self) -> Uuid {
    self.user.id
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at.map(|at| at <= now).unwrap_or(false)
  }
}

// Tokens stay out of logs.
impl std::fmt::Debug for Session {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Session")
      .field("user", &self.user)
      .field("expires_at", &self.expires_at)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  #[test]
  fn debug_output_hides_tokens() {
    let session = Session {
      access_token: "secret-access".to_string(),
      refresh_token: "secret-refresh".to_string(),
      expires_at: None,
      user: AuthUser { id: Uuid::new_v4(), email: Some("a@b.c".to_string()) },
    };
    let rendered = format!("{:?}", session);
    assert!(!rendered.contains("secret"));
    assert!(rendered.contains("a@b.c"));
  }

  #[test]
  fn expiry_is_checked_against_now() {
    let now = Utc::now();
    let mut session = Session {
      access_token: String::new(),
      refresh_token: String::new(),
      expires_at: Some(now - Duration::seconds(1)),
      user: AuthUser { id: Uuid::new_v4(), email: None },
    };
    assert!(session.is_expired(now));
    session.expires_at = None;
    assert!(!session.is_expired(now));
  }
}
