use super::InlineSpan;

/// Splits `text` into spans, scanning left to right. At each position an
/// image `![alt](url)` is tried first, then a bold run `**text**`; anything
/// else accumulates as plain text.
pub fn parse_inline(text: &str) -> Vec<InlineSpan> {
    let mut spans = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while !rest.is_empty() {
        if let Some((span, consumed)) = match_image(rest).or_else(|| match_bold(rest)) {
            flush_plain(&mut plain, &mut spans);
            spans.push(span);
            rest = &rest[consumed..];
            continue;
        }

        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            plain.push(ch);
        }
        rest = chars.as_str();
    }

    flush_plain(&mut plain, &mut spans);
    spans
}

fn flush_plain(plain: &mut String, spans: &mut Vec<InlineSpan>) {
    if !plain.is_empty() {
        spans.push(InlineSpan::Plain(std::mem::take(plain)));
    }
}

fn match_image(text: &str) -> Option<(InlineSpan, usize)> {
    let after_bang = text.strip_prefix("![")?;
    // Shortest alt followed by "](", then the shortest url up to ")".
    let alt_end = after_bang.find("](")?;
    let alt = &after_bang[..alt_end];
    let after_alt = &after_bang[alt_end + 2..];
    let url_end = after_alt.find(')')?;
    let url = &after_alt[..url_end];
    if alt.contains('\n') || url.contains('\n') {
        return None;
    }

    // "![" + alt + "](" + url + ")"
    let consumed = 2 + alt_end + 2 + url_end + 1;
    Some((
        InlineSpan::Image {
            alt: alt.to_string(),
            url: url.to_string(),
        },
        consumed,
    ))
}

fn match_bold(text: &str) -> Option<(InlineSpan, usize)> {
    let inner = text.strip_prefix("**")?;
    let end = inner.find("**")?;
    if end == 0 {
        return None;
    }
    Some((InlineSpan::Bold(inner[..end].to_string()), end + 4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_spans_keep_order() {
        assert_eq!(
            parse_inline("Price: **12k** per box ![box](https://x.example/b.png)"),
            vec![
                InlineSpan::Plain("Price: ".into()),
                InlineSpan::Bold("12k".into()),
                InlineSpan::Plain(" per box ".into()),
                InlineSpan::Image {
                    alt: "box".into(),
                    url: "https://x.example/b.png".into()
                },
            ]
        );
    }

    #[test]
    fn unclosed_markers_stay_plain() {
        assert_eq!(
            parse_inline("**open and ![alt](no-close"),
            vec![InlineSpan::Plain("**open and ![alt](no-close".into())]
        );
        assert_eq!(parse_inline("****"), vec![InlineSpan::Plain("****".into())]);
    }

    #[test]
    fn multibyte_text_is_preserved() {
        assert_eq!(
            parse_inline("Bánh **ngọt** ✓"),
            vec![
                InlineSpan::Plain("Bánh ".into()),
                InlineSpan::Bold("ngọt".into()),
                InlineSpan::Plain(" ✓".into()),
            ]
        );
    }

    #[test]
    fn image_alt_and_url_take_the_shortest_match() {
        assert_eq!(
            parse_inline("![box [large]](https://x.example/my box.png) tail"),
            vec![
                InlineSpan::Image {
                    alt: "box [large]".into(),
                    url: "https://x.example/my box.png".into()
                },
                InlineSpan::Plain(" tail".into()),
            ]
        );
        assert_eq!(
            parse_inline("![a](b) and (c)"),
            vec![
                InlineSpan::Image {
                    alt: "a".into(),
                    url: "b".into()
                },
                InlineSpan::Plain(" and (c)".into()),
            ]
        );
    }
}
