//! Maintenance operations that need the service-role key or a direct database connection.

use garde::Validate;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use url::Url;
use uuid::Uuid;
use valuable::Valuable;

use crate::auth::{AuthClient, AuthError, Credentials, User};

pub mod introspect;

/// Users requested per page when searching the user list.
const USERS_PER_PAGE: usize = 200;

#[derive(thiserror::Error, Debug, Serialize, Valuable, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Error {
    #[error("admin API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("{message}")]
    InvalidInput { message: String },
    #[error("database: {message}")]
    Database { message: String },
    #[error("{message}")]
    Other { message: String },
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Api {
                status, message, ..
            } => Self::Api { status, message },
            AuthError::InvalidInput { message } => Self::InvalidInput { message },
            err => Self::Other {
                message: err.to_string(),
            },
        }
    }
}

impl From<garde::Report> for Error {
    fn from(report: garde::Report) -> Self {
        Self::InvalidInput {
            message: report.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Other {
            message: err.to_string(),
        }
    }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        Self::Database {
            message: err.to_string(),
        }
    }
}

impl From<diesel::ConnectionError> for Error {
    fn from(err: diesel::ConnectionError) -> Self {
        Self::Database {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Deserialize)]
struct UserPage {
    #[serde(default)]
    users: Vec<User>,
}

/// What [`AdminClient::set_password`] had to do.
#[derive(Debug, Clone, PartialEq)]
pub enum PasswordChange {
    Updated(User),
    Created(User),
}

/// Client for the user-management half of the auth API. Only ever built from the service-role key.
#[derive(Clone, Debug)]
pub struct AdminClient {
    http: reqwest::Client,
    base_url: Url,
    service_role_key: String,
}

impl AdminClient {
    /// # Errors
    pub fn new(http: reqwest::Client, api_url: &str, service_role_key: &str) -> Result<Self> {
        let base_url = Url::parse(&format!("{}/auth/v1/admin/", api_url.trim_end_matches('/')))
            .map_err(|e| Error::InvalidInput {
                message: format!("invalid API URL: {e}"),
            })?;

        Ok(Self {
            http,
            base_url,
            service_role_key: service_role_key.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base_url.join(path).map_err(|e| Error::Other {
            message: e.to_string(),
        })?;

        Ok(self
            .http
            .request(method, url)
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key))
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AuthClient::error_from(response).await.into());
        }

        Ok(response.json().await?)
    }

    /// Pages through every user until one with a matching email (ignoring case) turns up.
    ///
    /// # Errors
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim();

        let mut page = 1;
        loop {
            let request = self
                .request(Method::GET, "users")?
                .query(&[("page", page), ("per_page", USERS_PER_PAGE)]);
            let UserPage { users } = Self::send(request).await?;
            let n_users = users.len();

            let found = users.into_iter().find(|u| {
                u.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            });
            if found.is_some() || n_users < USERS_PER_PAGE {
                return Ok(found);
            }

            page += 1;
        }
    }

    /// Creates a user whose email counts as confirmed.
    ///
    /// # Errors
    pub async fn create_user(&self, credentials: &Credentials) -> Result<User> {
        credentials.validate()?;

        let request = self.request(Method::POST, "users")?.json(&json!({
            "email": credentials.email,
            "password": credentials.password,
            "email_confirm": true
        }));

        Self::send(request).await
    }

    /// # Errors
    pub async fn update_user_password(&self, id: Uuid, password: &str) -> Result<User> {
        let request = self
            .request(Method::PUT, &format!("users/{id}"))?
            .json(&json!({"password": password}));

        Self::send(request).await
    }

    /// Sets the password of the user with this email, creating the user when there is none.
    ///
    /// # Errors
    pub async fn set_password(&self, credentials: &Credentials) -> Result<PasswordChange> {
        credentials.validate()?;

        match self.find_user_by_email(&credentials.email).await? {
            Some(user) => {
                let user = self.update_user_password(user.id, &credentials.password).await?;
                tracing::info!(user = %user.email_or_id(), "password updated");
                Ok(PasswordChange::Updated(user))
            }
            None => {
                let user = self.create_user(credentials).await?;
                tracing::info!(user = %user.email_or_id(), "user created");
                Ok(PasswordChange::Created(user))
            }
        }
    }
}
