//! A one-shot local listener that receives tokens from a sign-in redirect.
//!
//! Browsers never send the URL fragment to a server, so `GET /` serves a page that
//! moves the fragment into the query string of `GET /callback`.

use std::{collections::HashMap, sync::Arc};

use axum::{
    Router,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use tokio::{
    net::TcpListener,
    signal,
    sync::{Mutex, oneshot},
};
use tower_http::trace::TraceLayer;
use url::Url;

use super::{
    AuthError,
    fragment::{RedirectTokens, tokens_from_params},
};

const LANDING_PAGE: &str = r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>finbase sign-in</title></head>
  <body>
    <p id="status">Completing sign-in…</p>
    <script>
      const params = window.location.hash.substring(1) || window.location.search.substring(1);
      if (params) {
        window.location.replace("/callback?" + params);
      } else {
        document.getElementById("status").textContent = "No sign-in tokens in this link.";
      }
    </script>
  </body>
</html>
"#;

type Sender = Arc<Mutex<Option<oneshot::Sender<Result<RedirectTokens, AuthError>>>>>;

pub struct CallbackListener {
    listener: TcpListener,
    redirect_url: Url,
}

impl CallbackListener {
    /// Binds to the host and port of `redirect_url`.
    ///
    /// # Errors
    pub async fn bind(redirect_url: &str) -> Result<Self, AuthError> {
        let redirect_url = Url::parse(redirect_url).map_err(|e| AuthError::InvalidInput {
            message: format!("invalid redirect URL {redirect_url}: {e}"),
        })?;

        let host = redirect_url.host_str().unwrap_or("localhost");
        let port = redirect_url.port_or_known_default().unwrap_or(80);
        let address = format!("{host}:{port}");

        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| AuthError::Other {
                message: format!("failed to listen on {address}: {e}"),
            })?;
        tracing::info!("waiting for sign-in redirect on {address}");

        Ok(Self {
            listener,
            redirect_url,
        })
    }

    /// The URL to hand to the auth API as `redirect_to`.
    #[must_use]
    pub fn redirect_url(&self) -> &str {
        self.redirect_url.as_str()
    }

    /// Serves until one callback arrives (or Ctrl-C), then shuts down.
    ///
    /// # Errors
    /// Fails when the redirect carries an error or no tokens, or when interrupted.
    pub async fn wait_for_tokens(self) -> Result<RedirectTokens, AuthError> {
        let (tx, rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let sender: Sender = Arc::new(Mutex::new(Some(tx)));

        let app = Router::new()
            .route("/", get(async || Html(LANDING_PAGE)))
            .route("/callback", get(receive_tokens))
            .layer(TraceLayer::new_for_http())
            .with_state((sender, Arc::new(Mutex::new(Some(done_tx)))));

        let server = axum::serve(self.listener, app).with_graceful_shutdown(async move {
            tokio::select! {
                _ = done_rx => (),
                _ = signal::ctrl_c() => (),
            }
        });

        server.await.map_err(|e| AuthError::Other {
            message: format!("callback listener failed: {e}"),
        })?;

        rx.await.unwrap_or(Err(AuthError::Other {
            message: "interrupted before a sign-in redirect arrived".to_string(),
        }))
    }
}

async fn receive_tokens(
    State((sender, done)): State<(Sender, Arc<Mutex<Option<oneshot::Sender<()>>>>)>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<String> {
    let result = tokens_from_params(&params);
    let page = match &result {
        Ok(_) => "Signed in. You can close this tab.".to_string(),
        Err(err) => format!("Sign-in failed: {err}")
            .replace('&', "&amp;")
            .replace('<', "&lt;"),
    };

    if let Some(tx) = sender.lock().await.take() {
        // The receiver only goes away once the listener has stopped.
        let _ = tx.send(result);
    }
    if let Some(done) = done.lock().await.take() {
        let _ = done.send(());
    }

    Html(format!("<!doctype html><p>{page}</p>"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    async fn listener() -> CallbackListener {
        CallbackListener::bind("http://127.0.0.1:0/").await.unwrap()
    }

    fn base_url(listener: &CallbackListener) -> String {
        format!("http://{}", listener.listener.local_addr().unwrap())
    }

    #[tokio::test]
    async fn landing_page_rewrites_fragment() {
        let listener = listener().await;
        let base = base_url(&listener);
        let handle = tokio::spawn(listener.wait_for_tokens());

        let page = reqwest::get(&base).await.unwrap().text().await.unwrap();
        assert!(page.contains("window.location.hash"));

        reqwest::get(format!("{base}/callback?access_token=a&refresh_token=r"))
            .await
            .unwrap();
        let tokens = handle.await.unwrap().unwrap();

        assert_eq!(tokens.grant.access_token, "a");
    }

    #[tokio::test]
    async fn provider_error_ends_the_wait() {
        let listener = listener().await;
        let base = base_url(&listener);
        let handle = tokio::spawn(listener.wait_for_tokens());

        let page = reqwest::get(format!("{base}/callback?error=access_denied"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(page.contains("Sign-in failed"));

        assert!(matches!(
            handle.await.unwrap(),
            Err(AuthError::Provider { .. })
        ));
    }
}
