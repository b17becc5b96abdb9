//! Session identity: one email/token pair per process lifetime.
//!
//! The token is empty until a signup exchange succeeds, then attached as a
//! bearer credential to every later pipeline call. There is no refresh or
//! expiry model and no logout beyond a whole-session reset.

use crate::client::BackendClient;
use crate::error::{Error, Result};
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct AuthSession {
    email: String,
    token: Option<String>,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Exchange an email for a token. A blank email is a silent no-op
    /// (logged only, returns `Ok(false)`). A transport failure leaves the
    /// token unset and is not retried.
    pub async fn authenticate(&mut self, client: &BackendClient, email: &str) -> Result<bool> {
        let email = email.trim();
        if email.is_empty() {
            debug!("Ignoring authentication attempt with blank email");
            return Ok(false);
        }

        let token = client
            .signup(email)
            .await
            .map_err(|e| Error::Auth(e.to_string()))?;
        self.email = email.to_string();
        self.token = Some(token);
        info!("Authenticated as {}", self.email);
        Ok(true)
    }

    pub fn reset(&mut self) {
        self.email.clear();
        self.token = None;
    }
}
