//! Fenced JSON block scanning, payload extraction and display sanitizing.
//!
//! The model appends chart and table data to its markdown answer as
//! ```` ```json ```` fences. While a response is streaming those fences may be
//! half written, so every pass re-scans the whole cumulative buffer and treats
//! anything unparsable as "not available yet".
//!
//! A block is the shortest span of the form: the opening ```` ```json ````
//! marker, optional whitespace, `{`, anything, `}`, optional whitespace and a
//! closing ```` ``` ````.

use memchr::memmem;

use super::payload::{ChartPayload, EmbeddedPayload, TablePayload, KNOWN_PAYLOAD_TYPES};

const JSON_FENCE_OPEN: &str = "```json";
const FENCE: &str = "```";

/// Location of one complete fenced JSON block inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// Byte range of the whole block, fences included.
    pub start: usize,
    pub end: usize,
    /// The brace-delimited JSON text.
    pub body: &'a str,
}

/// Iterator over complete fenced JSON blocks in scan order.
pub struct FencedBlocks<'a> {
    text: &'a str,
    pos: usize,
}

pub fn fenced_blocks(text: &str) -> FencedBlocks<'_> {
    FencedBlocks { text, pos: 0 }
}

impl<'a> Iterator for FencedBlocks<'a> {
    type Item = FencedBlock<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() {
            let open = self.pos + memmem::find(&bytes[self.pos..], JSON_FENCE_OPEN.as_bytes())?;
            let body_start = skip_whitespace(bytes, open + JSON_FENCE_OPEN.len());
            if bytes.get(body_start) != Some(&b'{') {
                self.pos = open + 1;
                continue;
            }
            match find_closing(bytes, body_start) {
                Some((body_end, block_end)) => {
                    self.pos = block_end;
                    return Some(FencedBlock {
                        start: open,
                        end: block_end,
                        body: &self.text[body_start..body_end],
                    });
                }
                // No later `}` + fence exists, so no later opening can close either.
                None => {
                    self.pos = bytes.len();
                    return None;
                }
            }
        }
        None
    }
}

fn skip_whitespace(bytes: &[u8], mut index: usize) -> usize {
    while index < bytes.len() && bytes[index].is_ascii_whitespace() {
        index += 1;
    }
    index
}

/// Finds the earliest `}` after `body_start` that is followed only by
/// whitespace and a closing fence. Returns (end of body, end of block).
fn find_closing(bytes: &[u8], body_start: usize) -> Option<(usize, usize)> {
    let mut search_from = body_start + 1;
    while let Some(offset) = memmem::find(&bytes[search_from..], FENCE.as_bytes()) {
        let fence = search_from + offset;
        let mut cursor = fence;
        while cursor > body_start && bytes[cursor - 1].is_ascii_whitespace() {
            cursor -= 1;
        }
        if cursor > body_start + 1 && bytes[cursor - 1] == b'}' {
            return Some((cursor, fence + FENCE.len()));
        }
        search_from = fence + 1;
    }
    None
}

/// Returns the `type` discriminator a block declares, found by a plain
/// string scan so that unparsable blocks can still be recognized.
pub fn declared_type(body: &str) -> Option<&str> {
    let mut rest = body;
    while let Some(index) = rest.find("\"type\"") {
        let after = rest[index + "\"type\"".len()..].trim_start();
        if let Some(value) = after.strip_prefix(':') {
            let value = value.trim_start();
            if let Some(quoted) = value.strip_prefix('"') {
                if let Some(close) = quoted.find('"') {
                    return Some(&quoted[..close]);
                }
            }
        }
        rest = &rest[index + 1..];
    }
    None
}

fn is_known_block(block: &FencedBlock<'_>) -> bool {
    declared_type(block.body).is_some_and(|kind| KNOWN_PAYLOAD_TYPES.contains(&kind))
}

/// Remembers the latest valid chart and table payloads seen in a buffer.
///
/// A payload is only ever replaced by another valid payload of the same
/// family, never cleared, so a malformed later fragment cannot erase it.
#[derive(Debug, Clone, Default)]
pub struct PayloadExtractor {
    chart: Option<ChartPayload>,
    table: Option<TablePayload>,
}

impl PayloadExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from previously cached payloads.
    pub fn seeded(chart: Option<ChartPayload>, table: Option<TablePayload>) -> Self {
        Self { chart, table }
    }

    /// Scans the full buffer; later blocks of the same family win.
    pub fn scan(&mut self, buffer: &str) {
        for block in fenced_blocks(buffer) {
            match EmbeddedPayload::from_json(block.body) {
                Some(EmbeddedPayload::Chart(chart)) => self.chart = Some(chart),
                Some(EmbeddedPayload::Table(table)) => self.table = Some(table),
                None => {}
            }
        }
    }

    pub fn chart(&self) -> Option<&ChartPayload> {
        self.chart.as_ref()
    }

    pub fn table(&self) -> Option<&TablePayload> {
        self.table.as_ref()
    }
}

/// Removes every recognized payload block and trims the result.
///
/// Fenced JSON blocks declaring any other `type` (or none) stay visible.
pub fn sanitize(buffer: &str) -> String {
    strip_known_blocks(buffer).trim().to_string()
}

/// Like [`sanitize`], but also withholds a trailing ```` ```json ```` fence
/// that has not been closed yet, or the start of one still arriving.
pub fn sanitize_streaming(buffer: &str) -> String {
    let stripped = strip_known_blocks(buffer);
    let visible = match unterminated_json_fence(&stripped) {
        Some(start) => &stripped[..start],
        None => strip_partial_fence_open(&stripped),
    };
    visible.trim().to_string()
}

/// Drops a tail such as ```` `` ```` or ```` ```js ```` that may grow into an
/// opening fence.
fn strip_partial_fence_open(text: &str) -> &str {
    (1..JSON_FENCE_OPEN.len())
        .rev()
        .find(|&len| text.ends_with(&JSON_FENCE_OPEN[..len]))
        .map_or(text, |len| &text[..text.len() - len])
}

fn strip_known_blocks(buffer: &str) -> String {
    let mut output = String::with_capacity(buffer.len());
    let mut copied_to = 0;
    for block in fenced_blocks(buffer).filter(is_known_block) {
        output.push_str(&buffer[copied_to..block.start]);
        copied_to = block.end;
    }
    output.push_str(&buffer[copied_to..]);
    output
}

/// Start of the last ```` ```json ```` opening when no fence follows it.
fn unterminated_json_fence(text: &str) -> Option<usize> {
    let open = text.rfind(JSON_FENCE_OPEN)?;
    let after = &text[open + JSON_FENCE_OPEN.len()..];
    if after.contains(FENCE) {
        None
    } else {
        Some(open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payload::ChartKind;

    const BAR_A: &str = "```json\n{\"type\":\"bar\",\"title\":\"First\",\"categories\":[\"Price\"],\"series\":[{\"label\":\"A\",\"data\":[1]}]}\n```";
    const BAR_B: &str = "```json\n{\"type\":\"bar\",\"title\":\"Second\",\"categories\":[\"Price\"],\"series\":[{\"label\":\"B\",\"data\":[2]}]}\n```";
    const TABLE: &str = "```json\n{\"type\":\"comparison_data\",\"headers\":[\"Product\",\"Price\"],\"rows\":[[\"A\",\"1\"],[\"B\",\"2\"]]}\n```";

    #[test]
    fn scanner_finds_nested_objects_and_stops_at_first_close() {
        let text = "intro\n```json\n{\"a\":{\"b\":1}}\n```\nmiddle\n```json {\"c\":2}```";
        let bodies: Vec<&str> = fenced_blocks(text).map(|block| block.body).collect();
        assert_eq!(bodies, vec!["{\"a\":{\"b\":1}}", "{\"c\":2}"]);
    }

    #[test]
    fn scanner_skips_openings_without_braces() {
        let text = "```json\n[1,2]\n```\n```json\n{\"x\":1}\n```";
        let blocks: Vec<_> = fenced_blocks(text).collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].body, "{\"x\":1}");
    }

    #[test]
    fn declared_type_reads_spaced_discriminator() {
        assert_eq!(declared_type("{ \"type\" :  \"radar\", \"x\": 1"), Some("radar"));
        assert_eq!(declared_type("{\"kind\":\"bar\"}"), None);
    }

    #[test]
    fn later_chart_block_wins() {
        let buffer = format!("text\n{BAR_A}\nmore\n{BAR_B}");
        let mut extractor = PayloadExtractor::new();
        extractor.scan(&buffer);
        let chart = extractor.chart().expect("chart");
        assert_eq!(chart.title.as_deref(), Some("Second"));
        assert_eq!(chart.kind, ChartKind::Bar);
    }

    #[test]
    fn streaming_prefixes_never_lose_a_payload() {
        let buffer = format!("## Compare\n\n{BAR_A}\n\n{TABLE}\n\n{BAR_B}\nbye");
        let mut extractor = PayloadExtractor::new();
        let mut saw_chart = false;
        let mut saw_table = false;
        let mut end = 0;
        while end < buffer.len() {
            end += 1;
            while !buffer.is_char_boundary(end) {
                end += 1;
            }
            extractor.scan(&buffer[..end]);
            if saw_chart {
                assert!(extractor.chart().is_some(), "chart vanished at {end}");
            }
            if saw_table {
                assert!(extractor.table().is_some(), "table vanished at {end}");
            }
            saw_chart |= extractor.chart().is_some();
            saw_table |= extractor.table().is_some();
        }
        assert_eq!(
            extractor.chart().and_then(|c| c.title.as_deref()),
            Some("Second")
        );
        assert_eq!(extractor.table().map(|t| t.rows.len()), Some(2));
    }

    #[test]
    fn unterminated_block_keeps_cached_payload() {
        let mut extractor = PayloadExtractor::new();
        extractor.scan(BAR_A);
        let partial = format!("{BAR_A}\n```json\n{{\"type\":\"bar\",\"title\":\"Broken\",\"categ");
        extractor.scan(&partial);
        assert_eq!(
            extractor.chart().and_then(|c| c.title.as_deref()),
            Some("First")
        );
    }

    #[test]
    fn malformed_closed_block_is_ignored() {
        let mut extractor = PayloadExtractor::new();
        extractor.scan("```json\n{\"type\":\"bar\", oops}\n```");
        assert!(extractor.chart().is_none());
    }

    #[test]
    fn sanitize_strips_known_blocks_only() {
        let other = "```json\n{\"name\":\"config\"}\n```";
        let buffer = format!("Hello\n\n{BAR_A}\n\n{other}\n\n{TABLE}\n");
        let clean = sanitize(&buffer);
        assert!(clean.starts_with("Hello"));
        assert!(clean.contains("\"name\":\"config\""));
        assert!(!clean.contains("\"type\":\"bar\""));
        assert!(!clean.contains("comparison_data"));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let samples = [
            String::new(),
            "plain text only".to_string(),
            format!("  lead\n{BAR_A}\n{TABLE}\ntrail  "),
            format!("{BAR_A}{BAR_B}"),
            format!("a\n```json\n{{\"x\":1}}\n```\n{TABLE}"),
        ];
        for sample in samples {
            let once = sanitize(&sample);
            assert_eq!(sanitize(&once), once);
        }
    }

    #[test]
    fn streaming_sanitize_hides_open_fence() {
        let buffer = "Answer text\n\n```json\n{\"type\":\"bar\",\"cat";
        assert_eq!(sanitize_streaming(buffer), "Answer text");
        assert_eq!(sanitize(buffer), buffer.trim());
    }

    #[test]
    fn streaming_sanitize_hides_partial_fence_opening() {
        assert_eq!(sanitize_streaming("Answer\n``"), "Answer");
        assert_eq!(sanitize_streaming("Answer\n```js"), "Answer");
        assert_eq!(sanitize_streaming("Answer\n```json"), "Answer");
        assert_eq!(sanitize_streaming("Answer ok"), "Answer ok");
    }
}
