//! Tokens delivered in a redirect URL.
//!
//! The auth API puts the session in the URL fragment after a magic link or OAuth
//! sign-in. Some flows (and our callback page, which rewrites the fragment) use
//! the query string instead.

use std::collections::HashMap;

use url::Url;

use super::{AuthError, session::TokenGrant};

/// Tokens read from a redirect, plus the flow that produced them (`magiclink`, `recovery`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTokens {
    pub grant: TokenGrant,
    pub kind: Option<String>,
}

/// # Errors
/// Fails when the URL is invalid, carries a provider error, or has no tokens.
pub fn parse_redirect(url: &str) -> Result<RedirectTokens, AuthError> {
    let url = Url::parse(url.trim()).map_err(|e| AuthError::InvalidInput {
        message: format!("not a URL: {e}"),
    })?;

    let fragment = url.fragment().unwrap_or_default();
    let from_fragment: HashMap<String, String> =
        url::form_urlencoded::parse(fragment.as_bytes()).into_owned().collect();

    let in_fragment = ["access_token", "error"]
        .iter()
        .any(|key| from_fragment.contains_key(*key));
    let params = if in_fragment {
        from_fragment
    } else {
        url.query_pairs().into_owned().collect()
    };

    tokens_from_params(&params)
}

/// # Errors
/// Fails when the parameters carry a provider error or have no tokens.
pub fn tokens_from_params(params: &HashMap<String, String>) -> Result<RedirectTokens, AuthError> {
    let get = |key: &str| {
        params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    if let Some(error) = get("error") {
        return Err(AuthError::Provider {
            error: error.to_string(),
            description: get("error_description").map(str::to_string),
        });
    }

    let (Some(access_token), Some(refresh_token)) = (get("access_token"), get("refresh_token"))
    else {
        return Err(AuthError::MissingToken);
    };

    let number = |key: &str| get(key).and_then(|v| v.parse().ok());

    Ok(RedirectTokens {
        grant: TokenGrant {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_in: number("expires_in"),
            expires_at: number("expires_at"),
            token_type: get("token_type").map(str::to_string),
        },
        kind: get("type").map(str::to_string),
    })
}
