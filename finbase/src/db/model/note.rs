use finbase_core::model::{
    Endpoint, Selection,
    note::{NewNote, Note, NoteQuery},
};
use garde::Validate;

use crate::{
    db::model,
    rest::{self, RestClient, Select},
};

impl model::Write for NewNote {
    type Returns = Note;

    async fn write(self, client: &RestClient) -> rest::Result<Self::Returns> {
        self.validate()?;

        let inserted: Vec<Note> = client
            .insert(&Self::endpoint(), &self, &Note::selection())
            .await?;

        inserted.into_iter().next().ok_or(rest::Error::RecordNotFound)
    }
}

impl model::FetchByQuery for Note {
    type QueryParams = NoteQuery;

    async fn fetch_by_query(
        query: &Self::QueryParams,
        client: &RestClient,
    ) -> rest::Result<Vec<Self>> {
        let NoteQuery {
            user_id,
            pagination,
        } = query;

        let mut select = Select::from(Self::endpoint()).columns(Self::selection());
        if let Some(user_id) = user_id {
            select = select.eq("user_id", user_id);
        }

        client
            .select(&select.order("created_at", true).paginate(*pagination))
            .await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::{
        Mock, ResponseTemplate,
        matchers::{body_json, method, path, query_param},
    };

    use super::*;
    use crate::db::{
        model::{FetchByQuery, Write},
        test_util::{MockBackend, mock_backend},
    };

    const USER_ID: &str = "6f1c3f2e-7b8a-4c1d-9e0f-123456789abc";

    #[tokio::test]
    async fn notes_of_one_user_newest_first() {
        let MockBackend { server, client } = mock_backend().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/notes"))
            .and(query_param("user_id", format!("eq.{USER_ID}").as_str()))
            .and(query_param("order", "created_at.desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 2, "user_id": USER_ID, "title": "feeding", "body": "", "created_at": "2024-05-01T08:00:00Z"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let query = NoteQuery {
            user_id: Some(Uuid::parse_str(USER_ID).unwrap()),
            ..Default::default()
        };
        let notes = Note::fetch_by_query(&query, &client).await.unwrap();

        assert_eq!(notes[0].title_or_placeholder(), "feeding");
    }

    #[tokio::test]
    async fn add_note() {
        let MockBackend { server, client } = mock_backend().await;
        let user_id = Uuid::parse_str(USER_ID).unwrap();
        Mock::given(method("POST"))
            .and(path("/rest/v1/notes"))
            .and(body_json(json!({"user_id": USER_ID, "title": "tank 4", "body": "cloudy"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                {"id": 3, "user_id": USER_ID, "title": "tank 4", "body": "cloudy"}
            ])))
            .mount(&server)
            .await;

        let note = NewNote::new(user_id, "tank 4 ", Some(" cloudy"))
            .write(&client)
            .await
            .unwrap();

        assert_eq!(note.id, 3);
    }
}
