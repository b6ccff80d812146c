use crate::rest::{self, RestClient};

pub mod breeding;
pub mod catalog;
pub mod fish;
pub mod note;
pub mod plasmid;
pub mod summary;

pub trait Write {
    type Returns;

    fn write(self, client: &RestClient) -> impl Future<Output = rest::Result<Self::Returns>> + Send;
}

pub trait FetchById: Sized {
    type Id;

    fn fetch_by_id(
        id: &Self::Id,
        client: &RestClient,
    ) -> impl Future<Output = rest::Result<Self>> + Send;
}

pub trait FetchByQuery: Sized {
    type QueryParams;

    fn fetch_by_query(
        query: &Self::QueryParams,
        client: &RestClient,
    ) -> impl Future<Output = rest::Result<Vec<Self>>> + Send;
}

pub trait FetchRelatives<R>: Sized {
    type Id;

    fn fetch_relatives(
        id: &Self::Id,
        client: &RestClient,
    ) -> impl Future<Output = rest::Result<Vec<R>>> + Send;
}

pub trait Update {
    type Returns;

    fn update(self, client: &RestClient)
    -> impl Future<Output = rest::Result<Self::Returns>> + Send;
}

pub trait Delete {
    type Id;

    fn delete(id: &Self::Id, client: &RestClient) -> impl Future<Output = rest::Result<()>> + Send;
}
