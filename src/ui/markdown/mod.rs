//! Line-oriented markdown renderer for model answers.
//!
//! Only the subset the model is asked to produce is recognized: `##`/`###`
//! headings, bold label lines, `-`/`*` lists, pipe tables and paragraphs
//! with bold and image inline spans. Rendering is a pure function of the
//! input text.

mod inline;
mod parser;
mod table;


pub use inline::parse_inline;
pub use parser::render;
pub use table::{split_cells, table_payload};

/// Inline content of a paragraph, list item or table cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineSpan {
    Plain(String),
    Bold(String),
    Image { alt: String, url: String },
}

impl InlineSpan {
    /// Text shown for the span when painted without styling.
    pub fn display_text(&self) -> String {
        match self {
            InlineSpan::Plain(text) | InlineSpan::Bold(text) => text.clone(),
            InlineSpan::Image { alt, .. } => image_placeholder(alt),
        }
    }
}

pub type Cell = Vec<InlineSpan>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderNode {
    Paragraph(Vec<InlineSpan>),
    Heading { level: u8, text: String },
    /// A line wrapped entirely in `**`, shown as a subheader.
    Label(String),
    ListBlock(Vec<Vec<InlineSpan>>),
    TableBlock { header: Vec<Cell>, rows: Vec<Vec<Cell>> },
}

/// Bounded placeholder painted in place of an inline image.
pub fn image_placeholder(alt: &str) -> String {
    let alt = alt.trim();
    if alt.is_empty() {
        "[image]".to_string()
    } else {
        format!("[image: {alt}]")
    }
}

/// Concatenated display text of a run of spans.
pub fn spans_text(spans: &[InlineSpan]) -> String {
    spans.iter().map(InlineSpan::display_text).collect()
}
