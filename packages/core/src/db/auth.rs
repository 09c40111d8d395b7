//! Authorization credentials for remote store calls
//!
//! The token issuer is an external collaborator; the core only asks it for
//! the current credential and, when that is missing or expired, asks it to
//! start re-authentication.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn expiring_at(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(expires_at),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.token.is_empty() || self.expires_at.is_some_and(|at| at <= now)
    }
}

pub trait CredentialProvider {
    fn credential(&self) -> Option<Credential>;
    fn request_reauthentication(&self);
}

/// Holds a single credential that can be swapped or cleared
#[derive(Debug, Default)]
pub struct StaticCredentials {
    credential: Mutex<Option<Credential>>,
    reauth_requests: AtomicUsize,
}

impl StaticCredentials {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
            reauth_requests: AtomicUsize::new(0),
        }
    }

    /// A provider with no credential at all
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn set(&self, credential: Option<Credential>) {
        if let Ok(mut slot) = self.credential.lock() {
            *slot = credential;
        }
    }

    /// Number of times re-authentication was requested
    pub fn reauth_requests(&self) -> usize {
        self.reauth_requests.load(Ordering::SeqCst)
    }
}

impl CredentialProvider for StaticCredentials {
    fn credential(&self) -> Option<Credential> {
        self.credential.lock().ok().and_then(|slot| slot.clone())
    }

    fn request_reauthentication(&self) {
        self.reauth_requests.fetch_add(1, Ordering::SeqCst);
        tracing::info!("Re-authentication requested");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_credential_expiry() {
        let now = Utc::now();
        assert!(!Credential::new("tok").is_expired(now));
        assert!(Credential::new("").is_expired(now));
        assert!(Credential::expiring_at("tok", now - Duration::seconds(1)).is_expired(now));
        assert!(!Credential::expiring_at("tok", now + Duration::hours(1)).is_expired(now));
    }

    #[test]
    fn test_static_credentials() {
        let provider = StaticCredentials::anonymous();
        assert!(provider.credential().is_none());

        provider.set(Some(Credential::new("tok")));
        assert_eq!(provider.credential().unwrap().token, "tok");

        provider.request_reauthentication();
        assert_eq!(provider.reauth_requests(), 1);
    }
}
