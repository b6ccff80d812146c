use finbase_core::model::{
    Endpoint, RowId, Selection,
    feature::{FeatureKind, FeatureSet, LinkedFeature},
    fish::{
        DELETE_FISH_WITH_LINKS, Fish, FishOrdering, FishQuery, FishUpdate, NewFish,
        SEARCH_COLUMNS,
    },
    search_terms,
};
use futures::future::try_join_all;
use garde::Validate;
use serde_json::json;
use strum::IntoEnumIterator;

use crate::{
    db::model::{self, FetchById},
    rest::{self, RestClient, Select},
};

fn base() -> Select {
    Select::from(Fish::endpoint()).columns(Fish::selection())
}

fn first<T>(rows: Vec<T>) -> rest::Result<T> {
    rows.into_iter().next().ok_or(rest::Error::RecordNotFound)
}

impl model::Write for NewFish {
    type Returns = Fish;

    async fn write(self, client: &RestClient) -> rest::Result<Self::Returns> {
        let new_fish = self.normalized();
        new_fish.validate()?;

        let inserted = client
            .insert(&Self::endpoint(), &new_fish, &Fish::selection())
            .await?;
        let inserted: Fish = first(inserted)?;
        tracing::info!(id = inserted.id, "created fish");

        Ok(inserted)
    }
}

impl model::FetchById for Fish {
    type Id = RowId;

    async fn fetch_by_id(id: &Self::Id, client: &RestClient) -> rest::Result<Self> {
        client.select_one(&base().eq("id", id)).await
    }
}

impl model::FetchByQuery for Fish {
    type QueryParams = FishQuery;

    async fn fetch_by_query(
        query: &Self::QueryParams,
        client: &RestClient,
    ) -> rest::Result<Vec<Self>> {
        let FishQuery {
            ids,
            search,
            order_by,
            pagination,
        } = query;

        let mut select = base();

        if !ids.is_empty() {
            select = select.is_in("id", ids);
        }

        if let Some(search) = search {
            select = select.search(&SEARCH_COLUMNS, &search_terms(search));
        }

        for FishOrdering { column, descending } in order_by {
            let column: &str = (*column).into();
            select = select.order(column, *descending);
        }

        client.select(&select.paginate(*pagination)).await
    }
}

/// Offspring: every fish with this one as mother or father.
impl model::FetchRelatives<Fish> for Fish {
    type Id = RowId;

    async fn fetch_relatives(id: &Self::Id, client: &RestClient) -> rest::Result<Vec<Fish>> {
        let select = base()
            .or(&format!("mother_fish_id.eq.{id},father_fish_id.eq.{id}"))
            .order("date_birth", true)
            .order("id", false);

        client.select(&select).await
    }
}

impl model::Update for FishUpdate {
    type Returns = Fish;

    async fn update(self, client: &RestClient) -> rest::Result<Self::Returns> {
        self.validate()?;

        if self.is_empty() {
            return Fish::fetch_by_id(&self.id, client).await;
        }

        let updated = client.update(&base().eq("id", self.id), &self).await?;
        let updated: Fish = first(updated)?;
        tracing::info!(id = updated.id, "updated fish");

        Ok(updated)
    }
}

/// Deletes the fish and its link rows in one transaction through [`DELETE_FISH_WITH_LINKS`].
/// Without that function, a fish that still has offspring is refused before any link is removed.
impl model::Delete for Fish {
    type Id = RowId;

    async fn delete(id: &Self::Id, client: &RestClient) -> rest::Result<()> {
        let args = json!({ "fish_id": id });

        match client.rpc::<_, Fish>(DELETE_FISH_WITH_LINKS, &args).await {
            Ok(deleted) => {
                tracing::info!(id = deleted.id, "deleted fish");
                Ok(())
            }
            Err(rest::Error::FunctionNotFound { function }) => {
                tracing::warn!(
                    %function,
                    "database function missing; deleting links and fish separately"
                );
                delete_sequentially(*id, client).await
            }
            Err(err) => Err(err),
        }
    }
}

async fn delete_sequentially(id: RowId, client: &RestClient) -> rest::Result<()> {
    Fish::fetch_by_id(&id, client).await?;

    let children = <Fish as model::FetchRelatives<Fish>>::fetch_relatives(&id, client).await?;
    if !children.is_empty() {
        return Err(rest::Error::StillReferenced {
            entity: Fish::endpoint(),
            referencing_entity: Fish::endpoint(),
            value: Some(id.to_string()),
        });
    }

    let links: Vec<_> = FeatureKind::iter()
        .map(|kind| Select::from(kind.link_table()).eq("fish_id", id))
        .collect();
    let unlinked: usize = try_join_all(links.iter().map(|link| client.delete(link)))
        .await?
        .into_iter()
        .sum();

    let deleted = client
        .delete(&Select::from(Fish::endpoint()).eq("id", id))
        .await?;
    if deleted == 0 {
        return Err(rest::Error::RecordNotFound);
    }
    tracing::info!(id, unlinked, "deleted fish");

    Ok(())
}

async fn linked_features(
    kind: FeatureKind,
    fish_id: RowId,
    client: &RestClient,
) -> rest::Result<Vec<LinkedFeature>> {
    let select = Select::from(kind.link_table())
        .columns(LinkedFeature::selection(kind))
        .eq("fish_id", fish_id);

    client.select(&select).await
}

/// Every catalog entry linked to a fish, keyed by the fish id. Each kind is sorted by name.
impl model::FetchById for FeatureSet {
    type Id = RowId;

    async fn fetch_by_id(id: &Self::Id, client: &RestClient) -> rest::Result<Self> {
        let (transgenes, mutations, treatments, strains) = futures::try_join!(
            linked_features(FeatureKind::Transgene, *id, client),
            linked_features(FeatureKind::Mutation, *id, client),
            linked_features(FeatureKind::Treatment, *id, client),
            linked_features(FeatureKind::Strain, *id, client),
        )?;

        let sorted = |links: Vec<LinkedFeature>| {
            let mut features: Vec<_> = links.into_iter().filter_map(|l| l.feature).collect();
            features.sort_by_key(|f| f.name.clone().unwrap_or_default().to_lowercase());
            features
        };

        Ok(Self {
            transgenes: sorted(transgenes),
            mutations: sorted(mutations),
            treatments: sorted(treatments),
            strains: sorted(strains),
        })
    }
}
