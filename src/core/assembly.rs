//! Per-response assembly of streamed fragments into publishable state.

use super::accumulator::TextAccumulator;
use super::extract::{sanitize, sanitize_streaming, PayloadExtractor};
use super::message::{Source, SourceList};
use super::payload::{ChartPayload, TablePayload};

/// Everything the UI needs to paint one model message at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSnapshot {
    pub display_text: String,
    pub sources: Vec<Source>,
    pub chart: Option<ChartPayload>,
    pub table: Option<TablePayload>,
    pub is_streaming: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseAssembly {
    text: TextAccumulator,
    extractor: PayloadExtractor,
    sources: SourceList,
}

impl ResponseAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new buffer but keeps payloads cached from an earlier
    /// response to the same message.
    pub fn seeded(chart: Option<ChartPayload>, table: Option<TablePayload>) -> Self {
        Self {
            extractor: PayloadExtractor::seeded(chart, table),
            ..Self::default()
        }
    }

    /// Accumulates one fragment and its citations, then re-extracts payloads
    /// from the whole buffer.
    pub fn push_fragment(&mut self, fragment: &str, sources: impl IntoIterator<Item = Source>) {
        let buffer = self.text.push(fragment);
        self.extractor.scan(buffer);
        self.sources.extend(sources);
    }

    pub fn raw_text(&self) -> &str {
        self.text.as_str()
    }

    pub fn chart(&self) -> Option<&ChartPayload> {
        self.extractor.chart()
    }

    pub fn table(&self) -> Option<&TablePayload> {
        self.extractor.table()
    }

    pub fn sources(&self) -> &[Source] {
        self.sources.as_slice()
    }

    pub fn snapshot(&self, is_streaming: bool) -> ResponseSnapshot {
        let display_text = if is_streaming {
            sanitize_streaming(self.text.as_str())
        } else {
            sanitize(self.text.as_str())
        };
        ResponseSnapshot {
            display_text,
            sources: self.sources.as_slice().to_vec(),
            chart: self.extractor.chart().cloned(),
            table: self.extractor.table().cloned(),
            is_streaming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_accumulate_and_sources_dedupe() {
        let mut assembly = ResponseAssembly::new();
        assembly.push_fragment(
            "Hello ",
            vec![Source::new("https://a.example", Some("A".into()))],
        );
        assembly.push_fragment(
            "world",
            vec![
                Source::new("https://a.example", Some("A".into())),
                Source::new("https://b.example", Some("B".into())),
            ],
        );

        let snapshot = assembly.snapshot(false);
        assert_eq!(snapshot.display_text, "Hello world");
        assert_eq!(snapshot.sources.len(), 2);
        assert!(!snapshot.is_streaming);
    }

    #[test]
    fn payload_split_across_fragments_appears_when_closed() {
        let mut assembly = ResponseAssembly::new();
        assembly.push_fragment("Intro\n```json\n{\"type\":\"radar\",", Vec::new());
        assert!(assembly.chart().is_none());
        assert_eq!(assembly.snapshot(true).display_text, "Intro");

        assembly.push_fragment(
            "\"categories\":[\"Flavor\"],\"series\":[{\"label\":\"A\",\"data\":[7]}]}\n```",
            Vec::new(),
        );
        assert!(assembly.chart().is_some());
        assert_eq!(assembly.snapshot(true).display_text, "Intro");
    }

    #[test]
    fn seeded_payloads_survive_until_replaced() {
        let table = TablePayload::new(vec!["A".into()], vec![vec!["1".into()]]);
        let mut assembly = ResponseAssembly::seeded(None, Some(table.clone()));
        assembly.push_fragment("no blocks here", Vec::new());
        assert_eq!(assembly.table(), Some(&table));
    }
}
