use clap::ValueEnum;
use serde::Serialize;
use strum::Display;

#[derive(ValueEnum, Display, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Format {
    #[default]
    Table,
    Csv,
    Json,
}

fn to_csv<T: Serialize>(rows: &[T]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }

    Ok(writer.into_inner()?)
}

/// Left-aligned columns separated by two spaces, with the header underlined.
fn to_table(csv: &[u8]) -> anyhow::Result<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(csv);
    let records: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.map(|record| record.iter().map(|cell| cell.replace('\n', " ")).collect()))
        .collect::<Result<_, _>>()?;

    let n_columns = records.iter().map(Vec::len).max().unwrap_or_default();
    let widths: Vec<usize> = (0..n_columns)
        .map(|i| {
            records
                .iter()
                .filter_map(|r| r.get(i))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or_default()
        })
        .collect();

    let format_line = |cells: &[String]| {
        let line = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        line.trim_end().to_string()
    };

    let mut lines = Vec::with_capacity(records.len() + 1);
    if let Some((header, body)) = records.split_first() {
        lines.push(format_line(header));
        lines.push(widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
        lines.extend(body.iter().map(|r| format_line(r)));
    }

    Ok(lines.join("\n"))
}

/// Renders rows for the terminal. Rows must be flat records for `table` and `csv`.
///
/// # Errors
/// Fails when a row cannot be represented in the chosen format.
pub fn render<T: Serialize>(rows: &[T], format: Format) -> anyhow::Result<String> {
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(rows)?),
        Format::Csv => Ok(String::from_utf8(to_csv(rows)?)?),
        Format::Table => {
            if rows.is_empty() {
                return Ok("(no rows)".to_string());
            }
            to_table(&to_csv(rows)?)
        }
    }
}
