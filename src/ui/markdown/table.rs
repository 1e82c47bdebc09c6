use crate::core::payload::TablePayload;

use super::{spans_text, Cell, RenderNode};

/// Splits a pipe table row into trimmed cell texts. The field before the
/// first `|` is dropped, as is the field after the last `|` when empty.
pub fn split_cells(line: &str) -> Vec<String> {
    let mut fields: Vec<&str> = line.trim().split('|').skip(1).collect();
    if fields.last().is_some_and(|last| last.trim().is_empty()) {
        fields.pop();
    }
    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

pub(crate) fn is_separator_row(line: &str) -> bool {
    line.contains("---")
}

fn cell_text(cell: &Cell) -> String {
    spans_text(cell)
}

/// Plain-text view of a rendered table, for export when the answer carried
/// no structured table data.
pub fn table_payload(node: &RenderNode) -> Option<TablePayload> {
    let RenderNode::TableBlock { header, rows } = node else {
        return None;
    };
    Some(TablePayload::new(
        header.iter().map(cell_text).collect(),
        rows.iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect(),
    ))
}
