use super::inline::parse_inline;
use super::table::{is_separator_row, split_cells};
use super::{Cell, InlineSpan, RenderNode};

enum Block {
    None,
    List(Vec<Vec<InlineSpan>>),
    Table {
        header: Vec<Cell>,
        rows: Vec<Vec<Cell>>,
        expect_separator: bool,
    },
}

struct Parser {
    nodes: Vec<RenderNode>,
    block: Block,
}

impl Parser {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            block: Block::None,
        }
    }

    fn flush(&mut self) {
        match std::mem::replace(&mut self.block, Block::None) {
            Block::None => {}
            Block::List(items) => self.nodes.push(RenderNode::ListBlock(items)),
            Block::Table { header, rows, .. } => {
                self.nodes.push(RenderNode::TableBlock { header, rows })
            }
        }
    }

    fn line(&mut self, line: &str) {
        let trimmed = line.trim();

        if let Block::Table {
            expect_separator, ..
        } = &mut self.block
        {
            if std::mem::take(expect_separator) && is_separator_row(trimmed) {
                return;
            }
        }

        if trimmed.starts_with('|') {
            self.table_line(trimmed);
            return;
        }
        if matches!(self.block, Block::Table { .. }) {
            self.flush();
        }

        if trimmed.is_empty() {
            self.flush();
            return;
        }

        if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            let spans = parse_inline(item.trim());
            match &mut self.block {
                Block::List(items) => items.push(spans),
                _ => {
                    self.flush();
                    self.block = Block::List(vec![spans]);
                }
            }
            return;
        }

        self.flush();
        let node = if let Some(text) = trimmed.strip_prefix("### ") {
            RenderNode::Heading {
                level: 3,
                text: text.trim().to_string(),
            }
        } else if let Some(text) = trimmed.strip_prefix("## ") {
            RenderNode::Heading {
                level: 2,
                text: text.trim().to_string(),
            }
        } else if is_label(trimmed) {
            RenderNode::Label(trimmed.replace("**", "").trim().to_string())
        } else {
            RenderNode::Paragraph(parse_inline(trimmed))
        };
        self.nodes.push(node);
    }

    fn table_line(&mut self, trimmed: &str) {
        if let Block::Table { rows, .. } = &mut self.block {
            rows.push(cells(trimmed));
            return;
        }

        self.flush();
        self.block = Block::Table {
            header: cells(trimmed),
            rows: Vec::new(),
            expect_separator: true,
        };
    }

    fn finish(mut self) -> Vec<RenderNode> {
        self.flush();
        self.nodes
    }
}

fn cells(line: &str) -> Vec<Cell> {
    split_cells(line)
        .iter()
        .map(|cell| parse_inline(cell))
        .collect()
}

fn is_label(trimmed: &str) -> bool {
    trimmed.len() >= 4 && trimmed.starts_with("**") && trimmed.ends_with("**")
}

/// Renders sanitized answer text into block nodes in one pass over its
/// lines.
pub fn render(text: &str) -> Vec<RenderNode> {
    let mut parser = Parser::new();
    for line in text.lines() {
        parser.line(line);
    }
    parser.finish()
}
