// Identity is established upstream by the auth proxy; this module only reads it.
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::Redirect;
use std::sync::Arc;

use crate::state::AppState;

pub const UID_HEADER: &str = "x-auth-uid";
pub const DISPLAY_NAME_HEADER: &str = "x-auth-display-name";
pub const EMAIL_HEADER: &str = "x-auth-email";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            uid: read(UID_HEADER)?,
            display_name: read(DISPLAY_NAME_HEADER),
            email: read(EMAIL_HEADER),
        })
    }

    /// Name printed on a certificate when the learner has not chosen one:
    /// the display name, else the local part of the email, else the email.
    pub fn default_certificate_name(&self) -> String {
        if let Some(name) = &self.display_name {
            return name.clone();
        }
        match &self.email {
            Some(email) => match email.split('@').next() {
                Some(local) if !local.is_empty() => local.to_string(),
                _ => email.clone(),
            },
            None => "Student".to_string(),
        }
    }

    pub fn greeting(&self) -> String {
        let who = self
            .display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.uid);
        format!("Welcome, {}", who)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match Identity::from_headers(&parts.headers) {
            Some(identity) => {
                tracing::debug!(uid = %identity.uid, "request identity resolved");
                Ok(identity)
            }
            None => {
                tracing::info!("no identity on request, redirecting to login");
                Err(Redirect::to(&state.config.login_url))
            }
        }
    }
}
