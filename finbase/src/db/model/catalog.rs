//! The four catalogs a fish links to, and the link rows themselves.

use finbase_core::model::{
    Endpoint, RowId, Selection,
    feature::CatalogQuery,
    link::NewFishLink,
    mutation::{Mutation, NewMutation},
    strain::{NewStrain, Strain},
    transgene::{NewTransgene, Transgene},
    treatment::{NewTreatment, Treatment},
};
use garde::Validate;
use itertools::Itertools;

use crate::{
    db::model,
    rest::{self, RestClient, Select},
};

fn catalog_select(table: &str, columns: &str, query: &CatalogQuery) -> Select {
    let CatalogQuery {
        ids,
        name,
        pagination,
    } = query;

    let mut select = Select::from(table).columns(columns);

    if !ids.is_empty() {
        select = select.is_in("id", ids);
    }

    if let Some(name) = name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        select = select.ilike("name", name);
    }

    select.order("name", false).paginate(*pagination)
}

macro_rules! catalog {
    ($row:ident, $new_row:ident) => {
        impl model::Write for $new_row {
            type Returns = $row;

            async fn write(self, client: &RestClient) -> rest::Result<Self::Returns> {
                self.validate()?;

                let inserted: Vec<$row> = client
                    .insert(&Self::endpoint(), &self, &$row::selection())
                    .await?;
                let inserted = inserted
                    .into_iter()
                    .next()
                    .ok_or(rest::Error::RecordNotFound)?;
                tracing::info!(
                    table = %Self::endpoint(),
                    id = inserted.id,
                    "created catalog entry"
                );

                Ok(inserted)
            }
        }

        impl model::FetchById for $row {
            type Id = RowId;

            async fn fetch_by_id(id: &Self::Id, client: &RestClient) -> rest::Result<Self> {
                let select = Select::from(Self::endpoint())
                    .columns(Self::selection())
                    .eq("id", id);

                client.select_one(&select).await
            }
        }

        impl model::FetchByQuery for $row {
            type QueryParams = CatalogQuery;

            async fn fetch_by_query(
                query: &Self::QueryParams,
                client: &RestClient,
            ) -> rest::Result<Vec<Self>> {
                client
                    .select(&catalog_select(&Self::endpoint(), &Self::selection(), query))
                    .await
            }
        }
    };
}

catalog!(Transgene, NewTransgene);
catalog!(Mutation, NewMutation);
catalog!(Treatment, NewTreatment);
catalog!(Strain, NewStrain);

/// Inserts the links one request per link table. Returns how many rows were written.
impl model::Write for Vec<NewFishLink> {
    type Returns = usize;

    async fn write(self, client: &RestClient) -> rest::Result<Self::Returns> {
        // Every object of a bulk insert must have the same keys.
        let groups = self
            .into_iter()
            .into_group_map_by(|link| (link.kind, link.notes.is_some()));

        let mut n_written = 0;
        for ((kind, _), links) in groups.into_iter().sorted_by_key(|(key, _)| *key) {
            let inserted: Vec<serde_json::Value> = client
                .insert(kind.link_table(), &links, "fish_id")
                .await?;
            n_written += inserted.len();
        }

        Ok(n_written)
    }
}

#[cfg(test)]
mod tests {
    use finbase_core::model::feature::FeatureKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::{
        Mock, ResponseTemplate,
        matchers::{body_json, method, path, query_param},
    };

    use super::*;
    use crate::db::{
        model::{FetchByQuery, Write},
        test_util::{MockBackend, mock_backend},
    };

    #[tokio::test]
    async fn list_filters_by_name_and_orders() {
        let MockBackend { server, client } = mock_backend().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/mutations"))
            .and(query_param("select", "id,name,gene,notes"))
            .and(query_param("name", "ilike.*nacre*"))
            .and(query_param("order", "name.asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "name": "nacre", "gene": "mitfa", "notes": null}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let query = CatalogQuery {
            name: Some(" nacre".to_string()),
            ..Default::default()
        };
        let mutations = Mutation::fetch_by_query(&query, &client).await.unwrap();

        assert_eq!(mutations[0].gene.as_deref(), Some("mitfa"));
    }

    #[tokio::test]
    async fn blank_name_is_not_a_filter() {
        let MockBackend { server, client } = mock_backend().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/strains"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let query = CatalogQuery {
            name: Some("  ".to_string()),
            ..Default::default()
        };
        Strain::fetch_by_query(&query, &client).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(!requests[0].url.query().unwrap_or_default().contains("name="));
    }

    #[tokio::test]
    async fn create_treatment() {
        let MockBackend { server, client } = mock_backend().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/treatments"))
            .and(body_json(json!({"name": "heat shock", "type": "stress"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                {"id": 8, "name": "heat shock", "type": "stress", "description": null}
            ])))
            .mount(&server)
            .await;

        let treatment = NewTreatment::new(" heat shock ", Some("stress"), Some(" "))
            .write(&client)
            .await
            .unwrap();

        assert_eq!(treatment.id, 8);
    }

    #[tokio::test]
    async fn nameless_entry_is_rejected() {
        let MockBackend { server, client } = mock_backend().await;

        let err = NewStrain {
            name: String::new(),
            description: None,
        }
        .write(&client)
        .await
        .unwrap_err();

        assert!(matches!(err, rest::Error::InvalidData { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn links_are_written_per_table() {
        let MockBackend { server, client } = mock_backend().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/fish_transgenes"))
            .and(body_json(json!([
                {"fish_id": 1, "transgene_id": 4},
                {"fish_id": 1, "transgene_id": 5}
            ])))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!([{"fish_id": 1}, {"fish_id": 1}])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/fish_strains"))
            .and(body_json(json!([{"fish_id": 1, "strain_id": 2, "notes": "AB"}])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"fish_id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let links = vec![
            NewFishLink::new(FeatureKind::Transgene, 1, 4),
            NewFishLink::new(FeatureKind::Strain, 1, 2).with_notes("AB"),
            NewFishLink::new(FeatureKind::Transgene, 1, 5),
        ];

        assert_eq!(links.write(&client).await.unwrap(), 3);
    }
}
