use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::decode_claims;

/// A session is refreshed once it is this close to expiring.
pub const REFRESH_SKEW: TimeDelta = TimeDelta::seconds(300);

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

impl User {
    #[must_use]
    pub fn email_or_id(&self) -> String {
        self.email.clone().unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: i64,
    pub token_type: String,
    pub user: Option<User>,
}

/// The token payload returned by the auth API and carried in redirect fragments.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i64>,
    pub expires_at: Option<i64>,
    pub token_type: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub(super) struct TokenResponse {
    #[serde(flatten)]
    pub grant: TokenGrant,
    #[serde(default)]
    pub user: Option<User>,
}

impl Session {
    /// `expires_at` comes from the grant, else `now + expires_in`, else the token's `exp` claim.
    #[must_use]
    pub fn from_grant(grant: TokenGrant, user: Option<User>, now: DateTime<Utc>) -> Self {
        let TokenGrant {
            access_token,
            refresh_token,
            expires_in,
            expires_at,
            token_type,
        } = grant;

        let expires_at = expires_at
            .or_else(|| expires_in.map(|secs| now.timestamp() + secs))
            .or_else(|| decode_claims(&access_token).ok().and_then(|c| c.exp))
            .unwrap_or_else(|| now.timestamp());

        Self {
            access_token,
            refresh_token,
            expires_at,
            token_type: token_type.unwrap_or_else(|| "bearer".to_string()),
            user,
        }
    }

    #[must_use]
    pub fn expires_in(&self, now: DateTime<Utc>) -> TimeDelta {
        TimeDelta::seconds(self.expires_at - now.timestamp())
    }

    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>, skew: TimeDelta) -> bool {
        self.expires_in(now) <= skew
    }
}
