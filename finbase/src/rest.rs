//! Client for the REST-over-Postgres layer of the hosted backend (`/rest/v1`).

use reqwest::{Method, RequestBuilder, Response, header};
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

pub mod error;
mod query;

pub use error::{Error, Result};
pub use query::Select;

/// Rows fetched per request when reading a whole table.
pub const CHUNK_SIZE: i64 = 1000;
/// Upper bound on rows returned by [`RestClient::select_all`].
pub const DEFAULT_ROW_CAP: usize = 200_000;

#[derive(Clone, Debug)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    bearer: String,
}

impl RestClient {
    /// A client acting with the privileges of `api_key` itself.
    ///
    /// # Errors
    /// Fails when `api_url` is not a valid URL.
    pub fn new(http: reqwest::Client, api_url: &str, api_key: &str) -> Result<Self> {
        let base_url = Url::parse(&format!("{}/rest/v1/", api_url.trim_end_matches('/')))
            .map_err(Error::from_other_error)?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
            bearer: api_key.to_string(),
        })
    }

    /// The same client acting as the user who owns `access_token`.
    #[must_use]
    pub fn with_bearer(&self, access_token: &str) -> Self {
        Self {
            bearer: access_token.to_string(),
            ..self.clone()
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base_url.join(path).map_err(Error::from_other_error)?;

        Ok(self
            .http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer))
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder, entity: &str) -> Result<T> {
        let response = request.send().await?;
        let body = Self::checked_body(response, entity).await?;

        Ok(serde_json::from_str(&body)?)
    }

    async fn checked_body(response: Response, entity: &str) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(body)
        } else {
            let err = Error::from_response(status, &body, entity);
            tracing::debug!(%status, entity, error = valuable::Valuable::as_value(&err));
            Err(err)
        }
    }

    /// # Errors
    pub async fn select<T: DeserializeOwned>(&self, select: &Select) -> Result<Vec<T>> {
        let request = self
            .request(Method::GET, select.table())?
            .query(&select.query_pairs());

        Self::send(request, select.table()).await
    }

    /// Exactly one row, or [`Error::RecordNotFound`].
    ///
    /// # Errors
    pub async fn select_one<T: DeserializeOwned>(&self, select: &Select) -> Result<T> {
        let request = self
            .request(Method::GET, select.table())?
            .query(&select.query_pairs())
            .header(header::ACCEPT, "application/vnd.pgrst.object+json");

        Self::send(request, select.table()).await
    }

    /// Pages through every matching row in chunks of [`CHUNK_SIZE`], stopping at `cap` rows.
    ///
    /// # Errors
    pub async fn select_all<T: DeserializeOwned>(
        &self,
        select: &Select,
        cap: usize,
    ) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        let mut offset = 0;

        while rows.len() < cap {
            let chunk: Vec<T> = self
                .select(&select.clone().limit(CHUNK_SIZE).offset(offset))
                .await?;
            let n_fetched = chunk.len();
            rows.extend(chunk);

            if i64::try_from(n_fetched).unwrap_or(CHUNK_SIZE) < CHUNK_SIZE {
                break;
            }
            offset += CHUNK_SIZE;
        }

        rows.truncate(cap);
        Ok(rows)
    }

    /// Inserts `body` (one object or an array) and returns the inserted rows.
    ///
    /// # Errors
    pub async fn insert<B, T>(&self, table: &str, body: &B, columns: &str) -> Result<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::POST, table)?
            .query(&[("select", columns)])
            .header("Prefer", "return=representation")
            .json(body);

        Self::send(request, table).await
    }

    /// Patches every row matched by `filter` and returns the updated rows.
    ///
    /// # Errors
    pub async fn update<B, T>(&self, filter: &Select, body: &B) -> Result<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        if !filter.has_filters() {
            return Err(Error::Other {
                message: format!("refusing to update every row of {}", filter.table()),
            });
        }

        let request = self
            .request(Method::PATCH, filter.table())?
            .query(&filter.query_pairs())
            .header("Prefer", "return=representation")
            .json(body);

        Self::send(request, filter.table()).await
    }

    /// Deletes every row matched by `filter`, returning how many were removed.
    ///
    /// # Errors
    pub async fn delete(&self, filter: &Select) -> Result<usize> {
        if !filter.has_filters() {
            return Err(Error::Other {
                message: format!("refusing to delete every row of {}", filter.table()),
            });
        }

        let request = self
            .request(Method::DELETE, filter.table())?
            .query(&filter.filter_pairs())
            .query(&[("select", "*")])
            .header("Prefer", "return=representation");

        let deleted: Vec<serde_json::Value> = Self::send(request, filter.table()).await?;
        Ok(deleted.len())
    }

    /// Calls a database function.
    ///
    /// # Errors
    pub async fn rpc<A, T>(&self, function: &str, args: &A) -> Result<T>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::POST, &format!("rpc/{function}"))?
            .json(args);

        Self::send(request, function).await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path, query_param},
    };

    use super::*;

    async fn client(server: &MockServer) -> RestClient {
        RestClient::new(reqwest::Client::new(), &server.uri(), "anon").unwrap()
    }

    #[tokio::test]
    async fn select_sends_key_token_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/fish"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer user-token"))
            .and(query_param("select", "id,name"))
            .and(query_param("id", "eq.4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 4, "name": "a"}])))
            .expect(1)
            .mount(&server)
            .await;

        let rows: Vec<Value> = client(&server)
            .await
            .with_bearer("user-token")
            .select(&Select::from("fish").columns("id,name").eq("id", 4))
            .await
            .unwrap();

        assert_eq!(rows, vec![json!({"id": 4, "name": "a"})]);
    }

    #[tokio::test]
    async fn select_all_pages_until_short_chunk() {
        let server = MockServer::start().await;
        let full: Vec<Value> = (0..CHUNK_SIZE).map(|i| json!({"id": i})).collect();

        Mock::given(method("GET"))
            .and(path("/rest/v1/fish"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&full))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/fish"))
            .and(query_param("offset", "1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1000}])))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let rows: Vec<Value> = client
            .select_all(&Select::from("fish"), DEFAULT_ROW_CAP)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1001);

        let capped: Vec<Value> = client.select_all(&Select::from("fish"), 10).await.unwrap();
        assert_eq!(capped.len(), 10);
    }

    #[tokio::test]
    async fn insert_asks_for_representation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/notes"))
            .and(header("prefer", "return=representation"))
            .and(body_json(json!({"title": "t"})))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!([{"id": 1, "title": "t"}])),
            )
            .mount(&server)
            .await;

        let rows: Vec<Value> = client(&server)
            .await
            .insert("notes", &json!({"title": "t"}), "*")
            .await
            .unwrap();

        assert_eq!(rows[0]["id"], 1);
    }

    #[tokio::test]
    async fn unfiltered_writes_are_refused() {
        let server = MockServer::start().await;
        let client = client(&server).await;

        assert!(client.delete(&Select::from("fish")).await.is_err());
        assert!(
            client
                .update::<_, Value>(&Select::from("fish"), &json!({"name": "x"}))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn missing_function_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/create_fish_with_links"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": "PGRST202",
                "message": "Could not find the function public.create_fish_with_links"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .rpc::<_, Value>("create_fish_with_links", &json!({}))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            Error::FunctionNotFound {
                function: "create_fish_with_links".to_string()
            }
        );
    }
}
