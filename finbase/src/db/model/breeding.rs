use finbase_core::{
    breeding::{CREATE_FISH_WITH_LINKS, NewOffspring, ParentPair},
    model::{feature::FeatureSet, fish::Fish},
};
use garde::Validate;
use valuable::Valuable;

use crate::{
    db::model::{self, Delete, FetchById, Write},
    rest::{self, RestClient},
};

/// The features of both parents, fetched together.
///
/// # Errors
pub async fn parent_features(
    parents: &ParentPair,
    client: &RestClient,
) -> rest::Result<(FeatureSet, FeatureSet)> {
    futures::try_join!(
        FeatureSet::fetch_by_id(&parents.mother.id, client),
        FeatureSet::fetch_by_id(&parents.father.id, client)
    )
}

/// Inserts the fish and its links in one transaction through [`CREATE_FISH_WITH_LINKS`].
/// Databases without that function get sequential inserts, undone if any link fails.
impl model::Write for NewOffspring {
    type Returns = Fish;

    async fn write(self, client: &RestClient) -> rest::Result<Self::Returns> {
        self.fish.validate()?;

        match client.rpc::<_, Fish>(CREATE_FISH_WITH_LINKS, &self).await {
            Err(rest::Error::FunctionNotFound { function }) => {
                tracing::warn!(
                    %function,
                    "database function missing; inserting fish and links separately"
                );
                write_sequentially(self, client).await
            }
            Ok(fish) => {
                tracing::info!(id = fish.id, "created offspring");
                Ok(fish)
            }
            Err(err) => Err(err),
        }
    }
}

async fn write_sequentially(offspring: NewOffspring, client: &RestClient) -> rest::Result<Fish> {
    let fish = offspring.fish.clone().write(client).await?;

    if let Err(err) = offspring.links(fish.id).write(client).await {
        tracing::warn!(
            id = fish.id,
            error = err.as_value(),
            "linking the new fish failed; removing it"
        );
        if let Err(cleanup) = Fish::delete(&fish.id, client).await {
            tracing::error!(
                id = fish.id,
                error = cleanup.as_value(),
                "failed to remove partially created fish"
            );
            return Err(rest::Error::Other {
                message: format!(
                    "fish {} was created but not linked ({err}), and removing it failed \
                     ({cleanup})",
                    fish.id
                ),
            });
        }

        return Err(err);
    }

    tracing::info!(id = fish.id, "created offspring");

    Ok(fish)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use finbase_core::{breeding::OffspringPlan, model::feature::Feature};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::{
        Mock, ResponseTemplate,
        matchers::{body_json, method, path},
    };

    use super::*;
    use crate::db::test_util::{MockBackend, fish_json, mock_backend};

    fn offspring() -> NewOffspring {
        let mother: Fish = serde_json::from_value(fish_json(1, "mom")).unwrap();
        let father: Fish = serde_json::from_value(fish_json(2, "dad")).unwrap();
        let parents = ParentPair::new(mother, father).unwrap();
        let features = FeatureSet {
            transgenes: vec![Feature {
                id: 4,
                name: Some("Tg(mpx:GFP)".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };

        let mut plan = OffspringPlan::new(
            &parents,
            &features,
            &FeatureSet::default(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        );
        plan.details.name = Some("pup".to_string());

        plan.build()
    }

    fn rpc_body() -> serde_json::Value {
        json!({
            "fish": {
                "name": "pup",
                "date_birth": "2024-06-01",
                "mother_fish_id": 1,
                "father_fish_id": 2
            },
            "transgene_ids": [4],
            "mutation_ids": [],
            "treatment_ids": []
        })
    }

    #[tokio::test]
    async fn created_in_one_call() {
        let MockBackend { server, client } = mock_backend().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/create_fish_with_links"))
            .and(body_json(rpc_body()))
            .respond_with(ResponseTemplate::new(200).set_body_json(fish_json(10, "pup")))
            .expect(1)
            .mount(&server)
            .await;

        let fish = offspring().write(&client).await.unwrap();

        assert_eq!(fish.id, 10);
    }

    async fn mount_missing_function(server: &wiremock::MockServer) {
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/create_fish_with_links"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": "PGRST202",
                "message": "Could not find the function public.create_fish_with_links"
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/fish"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([fish_json(11, "pup")])))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn falls_back_to_separate_inserts() {
        let MockBackend { server, client } = mock_backend().await;
        mount_missing_function(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/fish_transgenes"))
            .and(body_json(json!([{"fish_id": 11, "transgene_id": 4}])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"fish_id": 11}])))
            .expect(1)
            .mount(&server)
            .await;

        let fish = offspring().write(&client).await.unwrap();

        assert_eq!(fish.id, 11);
    }

    #[tokio::test]
    async fn failed_link_removes_the_new_fish() {
        let MockBackend { server, client } = mock_backend().await;
        mount_missing_function(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/fish_transgenes"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23503",
                "message": "violates foreign key constraint",
                "details": "Key (transgene_id)=(4) is not present in table \"transgenes\"."
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/delete_fish_with_links"))
            .and(body_json(json!({"fish_id": 11})))
            .respond_with(ResponseTemplate::new(200).set_body_json(fish_json(11, "pup")))
            .expect(1)
            .mount(&server)
            .await;

        let err = offspring().write(&client).await.unwrap_err();

        assert_eq!(
            err,
            rest::Error::ReferenceNotFound {
                entity: "fish_transgenes".to_string(),
                referenced_entity: "transgenes".to_string(),
                value: Some("4".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn failed_cleanup_names_the_stranded_fish() {
        let MockBackend { server, client } = mock_backend().await;
        mount_missing_function(&server).await;
        let expired = ResponseTemplate::new(401).set_body_json(json!({
            "code": "PGRST303",
            "message": "JWT expired"
        }));
        Mock::given(method("POST"))
            .and(path("/rest/v1/fish_transgenes"))
            .respond_with(expired.clone())
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/delete_fish_with_links"))
            .respond_with(expired)
            .expect(1)
            .mount(&server)
            .await;

        let err = offspring().write(&client).await.unwrap_err();

        let rest::Error::Other { message } = &err else {
            panic!("expected a combined error, got {err:?}");
        };
        assert!(message.starts_with("fish 11 was created but not linked (session expired)"));
    }
}
