//! Typed access to the tables of the hosted database, over [`crate::rest::RestClient`].

pub mod model;

#[cfg(test)]
pub(crate) mod test_util;
