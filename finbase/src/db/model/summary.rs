use finbase_core::{
    model::{
        RowId,
        feature::FeatureSet,
        fish::{Fish, FishQuery},
    },
    summary::{FeatureRow, ParentSummary},
};
use futures::future::try_join_all;

use crate::{
    db::model::{self, FetchById, FetchByQuery},
    rest::{self, RestClient},
};

impl model::FetchById for ParentSummary {
    type Id = RowId;

    async fn fetch_by_id(id: &Self::Id, client: &RestClient) -> rest::Result<Self> {
        let (fish, features) = futures::try_join!(
            Fish::fetch_by_id(id, client),
            FeatureSet::fetch_by_id(id, client)
        )?;

        Ok(Self::new(&fish, &features))
    }
}

/// The fish matched by a query, each with its features collapsed into cells.
impl model::FetchByQuery for FeatureRow {
    type QueryParams = FishQuery;

    async fn fetch_by_query(
        query: &Self::QueryParams,
        client: &RestClient,
    ) -> rest::Result<Vec<Self>> {
        let fish = Fish::fetch_by_query(query, client).await?;
        let features =
            try_join_all(fish.iter().map(|f| FeatureSet::fetch_by_id(&f.id, client))).await?;

        Ok(fish
            .iter()
            .zip(&features)
            .map(|(fish, features)| FeatureRow::new(fish, features))
            .collect())
    }
}
