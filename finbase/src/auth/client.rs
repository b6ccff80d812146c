use std::collections::BTreeMap;

use chrono::Utc;
use garde::Validate;
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use strum::{Display, EnumString, IntoStaticStr};
use url::Url;

use super::{
    AuthError,
    session::{Session, TokenResponse, User},
};

#[derive(Deserialize, Serialize, Validate, Debug, Clone)]
pub struct Credentials {
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 6))]
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }
}

#[derive(Validate)]
#[garde(transparent)]
struct Email(#[garde(email)] String);

#[derive(Validate)]
#[garde(transparent)]
struct Password(#[garde(length(min = 6))] String);

#[derive(
    Deserialize, Serialize, Display, EnumString, IntoStaticStr, Debug, Clone, Copy, PartialEq, Eq,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OtpKind {
    Email,
    Magiclink,
    Signup,
    Recovery,
    Invite,
    EmailChange,
}

#[derive(
    Deserialize, Serialize, Display, EnumString, IntoStaticStr, Debug, Clone, Copy, PartialEq, Eq,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
}

/// The public settings of the auth API, used as a health probe.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AuthSettings {
    pub external: BTreeMap<String, bool>,
    pub disable_signup: bool,
    pub mailer_autoconfirm: bool,
}

impl AuthSettings {
    pub fn enabled_providers(&self) -> impl Iterator<Item = &str> {
        self.external
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.as_str())
    }
}

/// The error body of the auth API. Older and newer servers use different field names.
#[derive(Deserialize, Default)]
#[serde(default)]
struct ErrorBody {
    error: Option<String>,
    error_code: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

/// Client for the auth API (`/auth/v1`).
#[derive(Clone, Debug)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl AuthClient {
    /// # Errors
    /// Fails when `api_url` is not a valid URL.
    pub fn new(http: reqwest::Client, api_url: &str, api_key: &str) -> Result<Self, AuthError> {
        let base_url = Url::parse(&format!("{}/auth/v1/", api_url.trim_end_matches('/')))
            .map_err(|e| AuthError::InvalidInput {
                message: format!("invalid API URL: {e}"),
            })?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url.join(path).map_err(|e| AuthError::Other {
            message: e.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AuthError> {
        Ok(self
            .http
            .request(method, self.endpoint(path)?)
            .header("apikey", &self.api_key))
    }

    pub(crate) async fn error_from(response: Response) -> AuthError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let ErrorBody {
            error,
            error_code,
            error_description,
            msg,
            message,
        } = serde_json::from_str(&body).unwrap_or_default();

        let message = error_description
            .or(msg)
            .or(message)
            .or_else(|| error.clone())
            .unwrap_or(body);

        AuthError::Api {
            status,
            code: error_code.or(error),
            message,
        }
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, AuthError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(response.json().await?)
    }

    async fn send_empty(request: RequestBuilder) -> Result<(), AuthError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(())
    }

    async fn token_request(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, AuthError> {
        let request = self
            .request(Method::POST, "token")?
            .query(&[("grant_type", grant_type)])
            .json(&body);
        let TokenResponse { grant, user } = Self::send(request).await?;

        Ok(Session::from_grant(grant, user, Utc::now()))
    }

    /// # Errors
    pub async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, AuthError> {
        credentials.validate()?;

        self.token_request("password", json!(credentials)).await
    }

    /// Emails a sign-in link. Unknown addresses are not signed up.
    ///
    /// # Errors
    pub async fn send_magic_link(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        Email(email.to_string()).validate()?;

        let request = self
            .request(Method::POST, "otp")?
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({"email": email, "create_user": false}));

        Self::send_empty(request).await
    }

    /// Exchanges an emailed one-time code for a session.
    ///
    /// # Errors
    pub async fn verify_otp(
        &self,
        email: &str,
        token: &str,
        kind: OtpKind,
    ) -> Result<Session, AuthError> {
        Email(email.to_string()).validate()?;

        let request = self
            .request(Method::POST, "verify")?
            .json(&json!({"email": email, "token": token.trim(), "type": kind}));
        let TokenResponse { grant, user } = Self::send(request).await?;

        Ok(Session::from_grant(grant, user, Utc::now()))
    }

    /// The URL to open in a browser to sign in with `provider`.
    ///
    /// # Errors
    pub fn oauth_url(&self, provider: OAuthProvider, redirect_to: &str) -> Result<Url, AuthError> {
        let mut url = self.endpoint("authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider.into())
            .append_pair("redirect_to", redirect_to);

        Ok(url)
    }

    /// # Errors
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        self.token_request("refresh_token", json!({"refresh_token": refresh_token}))
            .await
    }

    /// # Errors
    pub async fn get_user(&self, access_token: &str) -> Result<User, AuthError> {
        let request = self.request(Method::GET, "user")?.bearer_auth(access_token);

        Self::send(request).await
    }

    /// # Errors
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let request = self.request(Method::POST, "logout")?.bearer_auth(access_token);

        Self::send_empty(request).await
    }

    /// # Errors
    pub async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        Email(email.to_string()).validate()?;

        let request = self
            .request(Method::POST, "recover")?
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({"email": email}));

        Self::send_empty(request).await
    }

    /// # Errors
    pub async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<User, AuthError> {
        Password(new_password.to_string()).validate()?;

        let request = self
            .request(Method::PUT, "user")?
            .bearer_auth(access_token)
            .json(&json!({"password": new_password}));

        Self::send(request).await
    }

    /// # Errors
    pub async fn settings(&self) -> Result<AuthSettings, AuthError> {
        Self::send(self.request(Method::GET, "settings")?).await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path, query_param},
    };

    use super::*;

    const USER_ID: &str = "6f1c3f2e-7b8a-4c1d-9e0f-123456789abc";

    fn client(server: &MockServer) -> AuthClient {
        AuthClient::new(reqwest::Client::new(), &server.uri(), "anon").unwrap()
    }

    fn token_body() -> serde_json::Value {
        json!({
            "access_token": "access",
            "refresh_token": "refresh",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": {"id": USER_ID, "email": "a@lab.org"}
        })
    }

    #[tokio::test]
    async fn password_sign_in() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon"))
            .and(body_json(json!({"email": "a@lab.org", "password": "hunter22"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
            .expect(1)
            .mount(&server)
            .await;

        let session = client(&server)
            .sign_in_with_password(&Credentials::new(" a@lab.org ", "hunter22"))
            .await
            .unwrap();

        assert_eq!(session.access_token, "access");
        assert!(session.expires_at > Utc::now().timestamp());
        assert_eq!(session.user.unwrap().email.as_deref(), Some("a@lab.org"));
    }

    #[rstest]
    #[case("", "hunter22")]
    #[case("not-an-email", "hunter22")]
    #[case("a@lab.org", "short")]
    #[tokio::test]
    async fn invalid_credentials_never_reach_the_server(
        #[case] email: &str,
        #[case] password: &str,
    ) {
        let server = MockServer::start().await;

        let err = client(&server)
            .sign_in_with_password(&Credentials::new(email, password))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidInput { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn api_errors_keep_their_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": 400,
                "error_code": "invalid_credentials",
                "msg": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .sign_in_with_password(&Credentials::new("a@lab.org", "wrong-password"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AuthError::Api {
                status: 400,
                code: Some("invalid_credentials".to_string()),
                message: "Invalid login credentials".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn magic_link_is_invite_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/otp"))
            .and(query_param("redirect_to", "http://localhost:8501/"))
            .and(body_json(json!({"email": "a@lab.org", "create_user": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .send_magic_link("a@lab.org", "http://localhost:8501/")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn verify_otp_sends_kind() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/verify"))
            .and(body_json(json!({"email": "a@lab.org", "token": "123456", "type": "email"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
            .mount(&server)
            .await;

        let session = client(&server)
            .verify_otp("a@lab.org", " 123456 ", OtpKind::Email)
            .await
            .unwrap();

        assert_eq!(session.refresh_token, "refresh");
    }

    #[test]
    fn oauth_url_names_provider_and_redirect() {
        let client =
            AuthClient::new(reqwest::Client::new(), "https://abc.example.co/", "anon").unwrap();
        let url = client
            .oauth_url(OAuthProvider::Github, "http://localhost:8501/")
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://abc.example.co/auth/v1/authorize?provider=github&redirect_to=http%3A%2F%2Flocalhost%3A8501%2F"
        );
    }

    #[tokio::test]
    async fn password_update_and_user() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer access"))
            .and(body_json(json!({"password": "new-password"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": USER_ID, "email": "a@lab.org"})),
            )
            .mount(&server)
            .await;

        let client = client(&server);
        let user = client.update_password("access", "new-password").await.unwrap();
        assert_eq!(user.id.to_string(), USER_ID);

        assert!(matches!(
            client.update_password("access", "123").await,
            Err(AuthError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn settings_lists_enabled_providers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/settings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "external": {"email": true, "github": true, "google": false},
                "disable_signup": true
            })))
            .mount(&server)
            .await;

        let settings = client(&server).settings().await.unwrap();

        assert!(settings.disable_signup);
        assert_eq!(settings.enabled_providers().collect::<Vec<_>>(), ["email", "github"]);
    }
}
