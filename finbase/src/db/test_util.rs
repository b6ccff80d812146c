use serde_json::{Value, json};
use wiremock::MockServer;

use crate::rest::RestClient;

pub(crate) struct MockBackend {
    pub server: MockServer,
    pub client: RestClient,
}

pub(crate) async fn mock_backend() -> MockBackend {
    let server = MockServer::start().await;
    let client = RestClient::new(reqwest::Client::new(), &server.uri(), "anon")
        .unwrap()
        .with_bearer("user-token");

    MockBackend { server, client }
}

pub(crate) fn fish_json(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "date_birth": "2024-03-01",
        "notes": null,
        "mother_fish_id": null,
        "father_fish_id": null,
        "line_building_stage": "F1",
        "fish_code": format!("FC-{id}"),
        "created_at": "2024-03-02T10:00:00Z",
        "created_by": null
    })
}
