use std::fmt::Display;

use finbase_core::model::{AsIlike, Pagination};
use itertools::Itertools;

/// A read (or the filter half of an update/delete) against one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    table: String,
    columns: String,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Quotes a value inside an `or=(...)`/`in.(...)` list so reserved characters survive.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

impl Select {
    #[must_use]
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    fn filter(mut self, column: &str, expression: String) -> Self {
        self.filters.push((column.to_string(), expression));
        self
    }

    #[must_use]
    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, format!("eq.{value}"))
    }

    #[must_use]
    pub fn is_in<I>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let values = values.into_iter().map(|v| quote(&v.to_string())).join(",");
        self.filter(column, format!("in.({values})"))
    }

    /// Case-insensitive contains match.
    #[must_use]
    pub fn ilike(self, column: &str, term: &str) -> Self {
        self.filter(column, format!("ilike.{}", term.as_ilike()))
    }

    #[must_use]
    pub fn is_null(self, column: &str) -> Self {
        self.filter(column, "is.null".to_string())
    }

    /// Raw disjunction, e.g. `mother_fish_id.eq.1,father_fish_id.eq.1`.
    #[must_use]
    pub fn or(self, conditions: &str) -> Self {
        self.filter("or", format!("({conditions})"))
    }

    /// Every term must match at least one of `columns`.
    #[must_use]
    pub fn search(self, columns: &[&str], terms: &[String]) -> Self {
        let groups: Vec<String> = terms
            .iter()
            .map(|term| {
                columns
                    .iter()
                    .map(|c| format!("{c}.ilike.{}", quote(&term.as_ilike())))
                    .join(",")
            })
            .collect();

        match groups.as_slice() {
            [] => self,
            [single] => self.or(single),
            _ => {
                let conditions = groups.iter().map(|g| format!("or({g})")).join(",");
                self.filter("and", format!("({conditions})"))
            }
        }
    }

    #[must_use]
    pub fn order(mut self, column: &str, descending: bool) -> Self {
        let direction = if descending { "desc" } else { "asc" };
        self.order.push(format!("{column}.{direction}"));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn paginate(self, Pagination { limit, offset }: Pagination) -> Self {
        self.limit(limit).offset(offset)
    }

    #[must_use]
    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Query-string pairs for a read.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.columns.clone())];
        pairs.extend(self.filter_pairs());

        if !self.order.is_empty() {
            pairs.push(("order".to_string(), self.order.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }

        pairs
    }

    /// Only the filters, for updates and deletes.
    #[must_use]
    pub fn filter_pairs(&self) -> Vec<(String, String)> {
        self.filters.clone()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn builds_filters_ordering_and_pagination() {
        let select = Select::from("fish")
            .columns("id,name")
            .is_in("id", [3, 1])
            .ilike("name", " casper ")
            .is_null("father_fish_id")
            .order("created_at", true)
            .order("id", false)
            .paginate(Pagination::default());

        assert_eq!(
            select.query_pairs(),
            owned(&[
                ("select", "id,name"),
                ("id", r#"in.("3","1")"#),
                ("name", "ilike.*casper*"),
                ("father_fish_id", "is.null"),
                ("order", "created_at.desc,id.asc"),
                ("limit", "500"),
                ("offset", "0"),
            ])
        );
    }

    #[test]
    fn single_term_search_is_one_or_group() {
        let select = Select::from("fish").search(&["name", "notes"], &["gfp".to_string()]);

        assert_eq!(
            select.filter_pairs(),
            vec![(
                "or".to_string(),
                r#"(name.ilike."*gfp*",notes.ilike."*gfp*")"#.to_string()
            )]
        );
    }

    #[test]
    fn several_terms_must_all_match() {
        let select = Select::from("fish").search(&["name"], &["a".to_string(), "b\"".to_string()]);

        assert_eq!(
            select.filter_pairs(),
            vec![(
                "and".to_string(),
                r#"(or(name.ilike."*a*"),or(name.ilike."*b\"*"))"#.to_string()
            )]
        );
    }

    #[test]
    fn empty_search_adds_nothing() {
        let select = Select::from("fish").search(&["name"], &[]);
        assert!(!select.has_filters());
        assert_eq!(select.table(), "fish");
    }
}
