//! Terminal rendering of query results.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table as TermTable};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::graph::Table;

pub(super) fn print_json<T: Serialize>(value: &T) -> color_eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(super) fn print_table(table: &Table) {
    println!("{}", render_table(table));
    println!("({} rows)", table.len());
}

fn render_table(table: &Table) -> TermTable {
    let mut rendered = TermTable::new();
    rendered
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(table.columns.iter());
    for row in &table.rows {
        rendered.add_row(row.iter().map(cell_text));
    }
    rendered
}

fn cell_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
