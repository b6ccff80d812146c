use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use url::Url;
use valuable::Valuable;

use super::AuthError;

/// The claims we read out of an access token or API key. The signature is never checked.
#[derive(Deserialize, Serialize, Valuable, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Claims {
    pub iss: Option<String>,
    pub sub: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
    pub exp: Option<i64>,
    #[serde(rename = "ref")]
    pub project_ref: Option<String>,
}

/// # Errors
/// Fails when `token` is not a three-part JWT with a base64url JSON payload.
pub fn decode_claims(token: &str) -> Result<Claims, AuthError> {
    let malformed = |reason: &str| AuthError::MalformedToken {
        reason: reason.to_string(),
    };

    let mut parts = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed("expected three dot-separated parts"));
    };

    let payload = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| malformed(&e.to_string()))?;

    serde_json::from_slice(&payload).map_err(|e| malformed(&e.to_string()))
}

/// Problems with the configured anon key, as reported by `doctor`.
#[must_use]
pub fn anon_key_problems(anon_key: &str, api_url: &str) -> Vec<String> {
    let claims = match decode_claims(anon_key) {
        Ok(claims) => claims,
        Err(err) => return vec![format!("anon key is not a JWT: {err}")],
    };

    let mut problems = Vec::new();

    match claims.role.as_deref() {
        Some("anon") => (),
        Some("service_role") => {
            problems.push("anon key is a service-role key; never ship it to clients".to_string());
        }
        other => problems.push(format!(
            "anon key has role {}, expected anon",
            other.unwrap_or("(none)")
        )),
    }

    let api_host = Url::parse(api_url).ok().and_then(|u| u.host_str().map(str::to_string));
    let issuer_host = claims
        .iss
        .as_deref()
        .and_then(|iss| Url::parse(iss).ok())
        .and_then(|u| u.host_str().map(str::to_string));

    // Locally issued keys carry a bare `supabase-demo` issuer, which is not a URL.
    if let (Some(api_host), Some(issuer_host)) = (api_host, issuer_host) {
        if api_host != issuer_host {
            problems.push(format!(
                "anon key was issued by {issuer_host} but the API is {api_host}"
            ));
        }
    }

    problems
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

    format!("{header}.{payload}.signature")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_payload_without_verifying() {
        let token = encode_test_token(&json!({
            "iss": "https://abc.example.co/auth/v1",
            "role": "authenticated",
            "exp": 1_700_000_000,
            "ref": "abc"
        }));

        let claims = decode_claims(&token).unwrap();

        assert_eq!(claims.exp, Some(1_700_000_000));
        assert_eq!(claims.role.as_deref(), Some("authenticated"));
        assert_eq!(claims.project_ref.as_deref(), Some("abc"));
    }

    #[rstest]
    #[case("not-a-token")]
    #[case("a.b")]
    #[case("a.!!!.c")]
    #[case("a.b.c.d")]
    fn rejects_malformed_tokens(#[case] token: &str) {
        assert!(matches!(
            decode_claims(token),
            Err(AuthError::MalformedToken { .. })
        ));
    }

    #[test]
    fn healthy_anon_key_has_no_problems() {
        let key = encode_test_token(
            &json!({"iss": "https://abc.example.co/auth/v1", "role": "anon"}),
        );
        assert_eq!(anon_key_problems(&key, "https://abc.example.co"), Vec::<String>::new());

        let local = encode_test_token(&json!({"iss": "supabase-demo", "role": "anon"}));
        assert!(anon_key_problems(&local, "http://127.0.0.1:54321").is_empty());
    }

    #[test]
    fn reports_wrong_role_and_issuer() {
        let key = encode_test_token(
            &json!({"iss": "https://other.example.co/auth/v1", "role": "service_role"}),
        );
        let problems = anon_key_problems(&key, "https://abc.example.co");

        assert_eq!(problems.len(), 2);
        assert!(problems[1].contains("other.example.co"));
    }
}
