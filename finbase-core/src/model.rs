use serde::{Deserialize, Serialize};
use valuable::Valuable;

pub mod feature;
pub mod fish;
pub mod link;
pub mod mutation;
pub mod note;
pub mod plasmid;
pub mod strain;
pub mod transgene;
pub mod treatment;

pub type RowId = i64;

/// A table (or view) exposed by the REST layer.
pub trait Endpoint {
    fn endpoint() -> String;
}

/// The `select` clause used when reading a type back from its endpoint.
pub trait Selection {
    fn selection() -> String;
}

#[derive(Deserialize, Serialize, Valuable, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 500,
            offset: 0,
        }
    }
}

/// Splits free-text search input on commas and whitespace.
#[must_use]
pub fn search_terms(value: &str) -> Vec<String> {
    value
        .split(',')
        .flat_map(str::split_whitespace)
        .map(str::to_string)
        .collect()
}

/// Wraps a term for a case-insensitive contains match.
pub trait AsIlike {
    fn as_ilike(&self) -> String;
}

impl AsIlike for str {
    fn as_ilike(&self) -> String {
        format!("*{}*", self.trim())
    }
}

impl AsIlike for String {
    fn as_ilike(&self) -> String {
        self.as_str().as_ilike()
    }
}
