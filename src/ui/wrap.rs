//! Word wrapping for styled spans.
//!
//! Lines are broken ahead of time and painted without ratatui's own
//! wrapping, so the number of printed rows is known before drawing.

use ratatui::style::Style;
use ratatui::text::{Line, Span};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

struct Token {
    text: String,
    style: Style,
    is_space: bool,
}

fn tokenize(spans: &[Span<'_>]) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    for span in spans {
        for ch in span.content.chars() {
            let is_space = ch.is_whitespace();
            let ch = if is_space { ' ' } else { ch };
            match tokens.last_mut() {
                Some(last) if last.is_space == is_space && last.style == span.style => {
                    last.text.push(ch)
                }
                _ => tokens.push(Token {
                    text: ch.to_string(),
                    style: span.style,
                    is_space,
                }),
            }
        }
    }
    tokens
}

struct LineBuilder<'p> {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    used: usize,
    has_content: bool,
    rest_prefix: &'p [Span<'static>],
}

impl LineBuilder<'_> {
    fn push(&mut self, text: String, style: Style) {
        self.used += text.width();
        self.has_content = true;
        self.current.push(Span::styled(text, style));
    }

    fn break_line(&mut self) {
        while self
            .current
            .last()
            .is_some_and(|span| span.content.trim().is_empty())
        {
            self.current.pop();
        }
        let line = std::mem::take(&mut self.current);
        self.lines.push(Line::from(line));
        self.current = self.rest_prefix.to_vec();
        self.used = self.rest_prefix.iter().map(|s| s.content.width()).sum();
        self.has_content = false;
    }
}

/// Wraps `spans` at word boundaries to `width` columns. The first line
/// starts with `first_prefix`, continuation lines with `rest_prefix`.
/// Words wider than a whole line are split by character.
pub fn wrap_spans(
    spans: &[Span<'_>],
    width: usize,
    first_prefix: Vec<Span<'static>>,
    rest_prefix: &[Span<'static>],
) -> Vec<Line<'static>> {
    let width = width.max(1);
    let used = first_prefix.iter().map(|s| s.content.width()).sum();
    let mut builder = LineBuilder {
        lines: Vec::new(),
        current: first_prefix,
        used,
        has_content: false,
        rest_prefix,
    };

    for token in tokenize(spans) {
        let token_width = token.text.width();
        if token.is_space {
            if !builder.has_content {
                continue;
            }
            if builder.used + token_width >= width {
                builder.break_line();
                continue;
            }
            builder.push(token.text, token.style);
            continue;
        }

        if builder.used + token_width > width && builder.has_content {
            builder.break_line();
        }
        if builder.used + token_width <= width {
            builder.push(token.text, token.style);
            continue;
        }

        let mut chunk = String::new();
        for ch in token.text.chars() {
            let ch_width = ch.width().unwrap_or(0);
            if builder.used + chunk.width() + ch_width > width
                && (builder.has_content || !chunk.is_empty())
            {
                if !chunk.is_empty() {
                    builder.push(std::mem::take(&mut chunk), token.style);
                }
                builder.break_line();
            }
            chunk.push(ch);
        }
        if !chunk.is_empty() {
            builder.push(chunk, token.style);
        }
    }

    if builder.has_content || builder.lines.is_empty() {
        let line = std::mem::take(&mut builder.current);
        builder.lines.push(Line::from(line));
    }
    builder.lines
}
