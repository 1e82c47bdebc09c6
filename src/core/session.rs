//! Explicit chat session with the model endpoint.
//!
//! The session owns the turn history the endpoint needs for multi-turn
//! context. A turn is only committed once its response finished streaming;
//! failed exchanges leave the history untouched.

use crate::api::{Content, GenerateContentRequest, GoogleSearch, Part, Tool};
use crate::core::prompt::{self, PromptSettings};

#[derive(Debug, Clone)]
pub struct ChatSession {
    system_instruction: String,
    search_enabled: bool,
    history: Vec<Content>,
    pending_turn: Option<Content>,
}

impl ChatSession {
    pub fn new(search_enabled: bool) -> Self {
        Self::with_instruction(prompt::SYSTEM_INSTRUCTION, search_enabled)
    }

    pub fn with_instruction(system_instruction: impl Into<String>, search_enabled: bool) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            search_enabled,
            history: Vec::new(),
            pending_turn: None,
        }
    }

    /// Forgets all turns, as if the session had just been created.
    pub fn reset(&mut self) {
        self.history.clear();
        self.pending_turn = None;
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    #[cfg(test)]
    pub fn has_pending_turn(&self) -> bool {
        self.pending_turn.is_some()
    }

    /// Builds the request for a new user turn and remembers the turn until
    /// [`commit`](Self::commit) or [`discard_pending`](Self::discard_pending).
    pub fn begin_turn(
        &mut self,
        message: &str,
        image: Option<&str>,
        settings: &PromptSettings,
    ) -> GenerateContentRequest {
        let inline = image.and_then(prompt::parse_data_uri);
        let text = prompt::build_turn_text(message, inline.is_some(), settings);

        let mut parts = Vec::with_capacity(2);
        if let Some(image) = inline {
            parts.push(Part::inline(image.mime_type, image.data));
        }
        parts.push(Part::text(text));
        let turn = Content::user(parts);

        let mut contents = self.history.clone();
        contents.push(turn.clone());
        self.pending_turn = Some(turn);

        GenerateContentRequest {
            contents,
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(self.system_instruction.clone())],
            }),
            tools: self.search_enabled.then(|| {
                vec![Tool {
                    google_search: GoogleSearch::default(),
                }]
            }),
        }
    }

    /// Records the pending turn and the model's full raw answer.
    pub fn commit(&mut self, model_text: &str) {
        if let Some(turn) = self.pending_turn.take() {
            self.history.push(turn);
            self.history.push(Content::model(model_text));
        }
    }

    pub fn discard_pending(&mut self) {
        self.pending_turn = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::prompt::to_data_uri;

    #[test]
    fn committed_turns_feed_following_requests() {
        let mut session = ChatSession::new(true);
        let settings = PromptSettings::default();

        let first = session.begin_turn("Hello", None, &settings);
        assert_eq!(first.contents.len(), 1);
        assert!(first.tools.is_some());
        session.commit("Hi there");

        let second = session.begin_turn("Compare A and B", None, &settings);
        assert_eq!(second.contents.len(), 3);
        assert_eq!(second.contents[1].role.as_deref(), Some("model"));
    }

    #[test]
    fn discarded_turn_is_not_recorded() {
        let mut session = ChatSession::new(false);
        let request = session.begin_turn("Hello", None, &PromptSettings::default());
        assert!(request.tools.is_none());
        assert!(session.has_pending_turn());
        session.discard_pending();
        session.commit("ignored");
        assert!(session.history().is_empty());
    }

    #[test]
    fn image_becomes_inline_part_before_text() {
        let mut session = ChatSession::new(true);
        let image = to_data_uri("image/jpeg", b"jpeg");
        let request = session.begin_turn("", Some(&image), &PromptSettings::default());
        let parts = &request.contents[0].parts;
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0].inline_data.as_ref().map(|d| d.mime_type.as_str()),
            Some("image/jpeg")
        );
        assert!(parts[1]
            .text
            .as_deref()
            .is_some_and(|text| text.starts_with(prompt::IMAGE_ONLY_PROMPT)));
    }

    #[test]
    fn reset_clears_history() {
        let mut session = ChatSession::new(true);
        session.begin_turn("Hello", None, &PromptSettings::default());
        session.commit("Hi");
        session.reset();
        assert!(session.history().is_empty());
        assert!(!session.has_pending_turn());
    }
}
