//! Bearer credential

use std::fmt;

use chrono::{DateTime, Utc};

/// Bearer token good for one publish call.
///
/// Never cached: each cycle acquires a new one.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Wrap a token with no known expiry
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Attach the expiry reported by the issuer
    #[must_use]
    pub fn with_expiry(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Raw token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Expiry reported by the issuer, if any
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Value of the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_token() {
        let cred = Credential::new("t1.secret-value");
        let rendered = format!("{cred:?}");
        assert!(!rendered.contains("secret-value"));
        assert_eq!(cred.bearer(), "Bearer t1.secret-value");
    }
}
