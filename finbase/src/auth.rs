//! Sign-in, session persistence and the gate every command passes through.

use chrono::Utc;
use serde::Serialize;
use valuable::Valuable;

use crate::{
    config::Config,
    rest::{self, RestClient},
};

mod callback;
mod client;
mod fragment;
pub mod jwt;
mod session;
mod store;

pub use callback::CallbackListener;
pub use client::{AuthClient, AuthSettings, Credentials, OAuthProvider, OtpKind};
pub use fragment::{RedirectTokens, parse_redirect};
pub use session::{REFRESH_SKEW, Session, TokenGrant, User};
pub use store::SessionStore;

#[derive(thiserror::Error, Debug, Serialize, Valuable, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AuthError {
    #[error("not signed in; run `finbase login` first")]
    NotSignedIn,
    #[error("{message}")]
    InvalidInput { message: String },
    #[error("no access token found in the link")]
    MissingToken,
    #[error("sign-in was rejected: {error}{}", description.as_ref().map(|d| format!(" ({d})")).unwrap_or_default())]
    Provider {
        error: String,
        description: Option<String>,
    },
    #[error("malformed token: {reason}")]
    MalformedToken { reason: String },
    #[error("auth API returned {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("{email} is not an administrator")]
    NotAdmin { email: String },
    #[error("session file {path}: {message}")]
    Store { path: String, message: String },
    #[error(transparent)]
    Rest {
        #[from]
        source: rest::Error,
    },
    #[error("{message}")]
    Other { message: String },
}

impl AuthError {
    fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }
}

impl From<garde::Report> for AuthError {
    fn from(report: garde::Report) -> Self {
        Self::InvalidInput {
            message: report.to_string(),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Other {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// Restores, refreshes and validates the persisted session, handing out clients that act as
/// the signed-in user.
#[derive(Clone, Debug)]
pub struct Authenticator {
    auth: AuthClient,
    rest: RestClient,
    store: SessionStore,
    admin_emails: Vec<String>,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        auth: AuthClient,
        rest: RestClient,
        store: SessionStore,
        admin_emails: Vec<String>,
    ) -> Self {
        Self {
            auth,
            rest,
            store,
            admin_emails,
        }
    }

    /// # Errors
    /// Fails when the anon key is missing or a URL is invalid.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::new();
        let anon_key = config.anon_key()?;

        Ok(Self::new(
            AuthClient::new(http.clone(), config.api_url(), anon_key)?,
            RestClient::new(http, config.api_url(), anon_key)?,
            SessionStore::new(config.session_file()?),
            config.admin_emails().to_vec(),
        ))
    }

    #[must_use]
    pub fn auth_client(&self) -> &AuthClient {
        &self.auth
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Persists a freshly obtained session, filling in its user when the auth API omitted it.
    ///
    /// # Errors
    pub async fn sign_in(&self, mut session: Session) -> Result<User> {
        let user = match session.user.take() {
            Some(user) => user,
            None => self.auth.get_user(&session.access_token).await?,
        };
        session.user = Some(user.clone());
        self.store.save(&session)?;

        tracing::info!(user = %user.email_or_id(), "signed in");

        Ok(user)
    }

    async fn refresh(&self, session: &Session) -> Result<Session> {
        let mut refreshed = match self.auth.refresh(&session.refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(err) => {
                tracing::warn!(error = err.as_value(), "session refresh failed; signing out");
                self.store.clear()?;
                let rejected =
                    err.is_unauthorized() || matches!(err, AuthError::Api { status: 400, .. });
                return Err(if rejected {
                    AuthError::NotSignedIn
                } else {
                    err
                });
            }
        };

        if refreshed.user.is_none() {
            refreshed.user.clone_from(&session.user);
        }
        self.store.save(&refreshed)?;
        tracing::debug!(expires_at = refreshed.expires_at, "refreshed session");

        Ok(refreshed)
    }

    /// Refreshes `session` when it expires within [`REFRESH_SKEW`].
    ///
    /// # Errors
    pub async fn refresh_if_needed(&self, session: Session) -> Result<Session> {
        if session.needs_refresh(Utc::now(), REFRESH_SKEW) {
            self.refresh(&session).await
        } else {
            Ok(session)
        }
    }

    /// A client acting as the signed-in user, and that user.
    ///
    /// # Errors
    /// [`AuthError::NotSignedIn`] when there is no usable session.
    pub async fn authenticate(&self) -> Result<(RestClient, User)> {
        let session = self.store.load().ok_or(AuthError::NotSignedIn)?;
        let mut session = self.refresh_if_needed(session).await?;

        let user = match self.auth.get_user(&session.access_token).await {
            Ok(user) => user,
            Err(err) if err.is_unauthorized() => {
                tracing::warn!(error = err.as_value(), "stored session was rejected");
                self.store.clear()?;
                return Err(AuthError::NotSignedIn);
            }
            Err(err) => return Err(err),
        };

        if session.user.as_ref() != Some(&user) {
            session.user = Some(user.clone());
            self.store.save(&session)?;
        }

        Ok((self.rest.with_bearer(&session.access_token), user))
    }

    /// Revokes the session server-side when possible. The local session is always removed.
    ///
    /// # Errors
    /// Fails only when the session file cannot be removed.
    pub async fn sign_out(&self) -> Result<()> {
        if let Some(session) = self.store.load() {
            if let Err(err) = self.auth.sign_out(&session.access_token).await {
                tracing::warn!(error = err.as_value(), "server-side sign-out failed");
            }
        }

        self.store.clear()
    }

    /// Sets a new password for the signed-in user. Also finishes a password-reset link sign-in.
    ///
    /// # Errors
    pub async fn change_password(&self, new_password: &str) -> Result<User> {
        let session = self.store.load().ok_or(AuthError::NotSignedIn)?;
        let mut session = self.refresh_if_needed(session).await?;

        let user = self
            .auth
            .update_password(&session.access_token, new_password)
            .await?;
        session.user = Some(user.clone());
        self.store.save(&session)?;

        tracing::info!(user = %user.email_or_id(), "password changed");

        Ok(user)
    }

    /// Runs `op` as the signed-in user. If the access token expires mid-flight, the session is
    /// refreshed and `op` is retried exactly once.
    ///
    /// # Errors
    pub async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(RestClient) -> Fut,
        Fut: Future<Output = rest::Result<T>>,
    {
        let (client, _) = self.authenticate().await?;

        match op(client).await {
            Err(rest::Error::JwtExpired) => {
                tracing::info!("access token expired during request; refreshing and retrying");
                let session = self.store.load().ok_or(AuthError::NotSignedIn)?;
                let session = self.refresh(&session).await?;

                Ok(op(self.rest.with_bearer(&session.access_token)).await?)
            }
            result => Ok(result?),
        }
    }

    /// Runs `op` once as the signed-in user, for writes that must not be repeated. The session is
    /// refreshed beforehand when it is close to expiring; an expiry mid-flight is reported, not
    /// retried.
    ///
    /// # Errors
    pub async fn with_session<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(RestClient) -> Fut,
        Fut: Future<Output = rest::Result<T>>,
    {
        let (client, _) = self.authenticate().await?;

        Ok(op(client).await?)
    }

    /// # Errors
    /// [`AuthError::NotAdmin`] unless `user`'s email is on the admin allowlist.
    pub fn require_admin(&self, user: &User) -> Result<()> {
        let is_admin = user.email.as_deref().is_some_and(|email| {
            self.admin_emails
                .iter()
                .any(|admin| admin.trim().eq_ignore_ascii_case(email.trim()))
        });

        if is_admin {
            Ok(())
        } else {
            Err(AuthError::NotAdmin {
                email: user.email_or_id(),
            })
        }
    }
}
