use finbase_core::model::{
    Endpoint, RowId, Selection,
    plasmid::{Plasmid, PlasmidElementLink, PlasmidElementRow, PlasmidQuery},
};

use crate::{
    db::model,
    rest::{self, DEFAULT_ROW_CAP, RestClient, Select},
};

impl model::FetchByQuery for Plasmid {
    type QueryParams = PlasmidQuery;

    async fn fetch_by_query(
        query: &Self::QueryParams,
        client: &RestClient,
    ) -> rest::Result<Vec<Self>> {
        let PlasmidQuery { name, notes, id } = query;
        fn non_blank(s: &Option<String>) -> Option<&str> {
            s.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }

        let mut select = Select::from(Self::endpoint()).columns(Self::selection());

        if let Some(name) = non_blank(name) {
            select = select.ilike("name", name);
        }
        if let Some(notes) = non_blank(notes) {
            select = select.ilike("notes", notes);
        }
        if let Some(id) = id {
            select = select.eq("id", id);
        }

        client
            .select_all(&select.order("name", false), DEFAULT_ROW_CAP)
            .await
    }
}

/// The elements of a plasmid in position order.
impl model::FetchRelatives<PlasmidElementRow> for Plasmid {
    type Id = RowId;

    async fn fetch_relatives(
        id: &Self::Id,
        client: &RestClient,
    ) -> rest::Result<Vec<PlasmidElementRow>> {
        let select = Select::from(PlasmidElementLink::endpoint())
            .columns(PlasmidElementLink::selection())
            .eq("plasmid_id", id)
            .order("position", false);

        let links: Vec<PlasmidElementLink> = client.select(&select).await?;

        Ok(links.into_iter().map(PlasmidElementRow::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::{
        Mock, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    use super::*;
    use crate::db::{
        model::{FetchByQuery, FetchRelatives},
        test_util::{MockBackend, mock_backend},
    };

    #[tokio::test]
    async fn query_by_name_notes_and_id() {
        let MockBackend { server, client } = mock_backend().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/plasmids"))
            .and(query_param("name", "ilike.*pT2*"))
            .and(query_param("notes", "ilike.*tol2*"))
            .and(query_param("id", "eq.12"))
            .and(query_param("order", "name.asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 12, "name": "pT2-kdrl", "notes": "tol2 backbone", "backbone_size": 4200}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let query = PlasmidQuery {
            name: Some("pT2".to_string()),
            notes: Some("tol2".to_string()),
            ..Default::default()
        }
        .with_id_text(Some(" 12 "));
        let plasmids = Plasmid::fetch_by_query(&query, &client).await.unwrap();

        assert_eq!(plasmids[0].other["backbone_size"], json!(4200));
    }

    #[tokio::test]
    async fn elements_are_flattened() {
        let MockBackend { server, client } = mock_backend().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/plasmids_plasmid_elements"))
            .and(query_param("plasmid_id", "eq.12"))
            .and(query_param("order", "position.asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "plasmid_id": 12,
                "element_id": 3,
                "position": 1,
                "notes": null,
                "created_at": null,
                "created_by": null,
                "element": {"id": 3, "name": "kdrl promoter", "element_type": "promoter", "notes": null, "value": "6.8kb"},
                "plasmid": {"id": 12, "name": "pT2-kdrl"}
            }])))
            .mount(&server)
            .await;

        let rows: Vec<PlasmidElementRow> = Plasmid::fetch_relatives(&12, &client).await.unwrap();

        assert_eq!(rows[0].element_meta.as_deref(), Some("6.8kb"));
        assert_eq!(rows[0].plasmid_name.as_deref(), Some("pT2-kdrl"));
    }
}
