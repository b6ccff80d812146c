use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// One row of `information_schema.columns`, in ordinal order.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
}

/// A column that belongs to a table's primary key.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyColumn {
    pub table_name: String,
    pub column_name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ForeignKey {
    pub child_table: String,
    pub child_column: String,
    pub parent_table: String,
    pub parent_column: String,
}

fn mermaid_type(data_type: &str) -> String {
    data_type.replace([' ', '(', ')'], "_")
}

/// Renders a mermaid `erDiagram` with tables and relations in a stable order.
#[must_use]
pub fn render_mermaid(
    columns: &[ColumnInfo],
    primary_keys: &[KeyColumn],
    foreign_keys: &[ForeignKey],
) -> String {
    let primary_keys: HashSet<(&str, &str)> = primary_keys
        .iter()
        .map(|k| (k.table_name.as_str(), k.column_name.as_str()))
        .collect();

    let mut tables: BTreeMap<&str, Vec<&ColumnInfo>> = BTreeMap::new();
    for column in columns {
        tables.entry(column.table_name.as_str()).or_default().push(column);
    }

    let mut lines = vec!["erDiagram".to_string()];
    for (table, columns) in tables {
        lines.push(format!("  {table} {{"));
        for column in columns {
            let suffix = if primary_keys.contains(&(table, column.column_name.as_str())) {
                " PK"
            } else {
                ""
            };
            lines.push(format!(
                "    {} {}{suffix}",
                mermaid_type(&column.data_type),
                column.column_name
            ));
        }
        lines.push("  }".to_string());
    }

    let mut foreign_keys: Vec<_> = foreign_keys.iter().collect();
    foreign_keys.sort();
    for ForeignKey {
        child_table,
        child_column,
        parent_table,
        ..
    } in foreign_keys
    {
        lines.push(format!("  {parent_table} ||--o{{ {child_table} : {child_column}"));
    }

    lines.join("\n")
}
