//! Conversation controller: drives one request/response exchange at a time
//! and keeps the message list in sync with the streamed response.
//!
//! The controller never performs I/O. Callers feed it user actions and
//! [`StreamMessage`]s and execute the [`ExchangeStart`] it hands back, which
//! keeps the whole state machine testable without a network.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::GenerateContentRequest;
use crate::core::assembly::{ResponseAssembly, ResponseSnapshot};
use crate::core::chat_stream::{ExchangeError, StreamMessage};
use crate::core::extract::{sanitize, sanitize_streaming};
use crate::core::message::{Message, Role, Source};
use crate::core::prompt::{PromptSettings, REGENERATE_PROMPT};
use crate::core::session::ChatSession;

pub const DEFAULT_REGENERATE_DEBOUNCE: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Sending,
    Streaming,
    Done,
    Failed,
}

/// A request the caller must hand to the streaming endpoint.
#[derive(Debug)]
pub struct ExchangeStart {
    pub stream_id: u64,
    pub message_id: String,
    pub request: GenerateContentRequest,
    pub cancel_token: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejected {
    /// Another exchange is still streaming.
    Busy,
    /// Neither text nor image was provided.
    Empty,
}

/// What changed after handling a stream message.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerUpdate {
    /// The streaming message has new content.
    Snapshot {
        message_id: String,
        snapshot: ResponseSnapshot,
    },
    /// Streaming finished; `snapshot` is the final sanitized state.
    Finished {
        message_id: String,
        snapshot: ResponseSnapshot,
    },
    /// The exchange failed; the message now shows `text`.
    Failed {
        message_id: String,
        text: String,
        show_setup_help: bool,
    },
}

struct InFlight {
    stream_id: u64,
    message_id: String,
    assembly: ResponseAssembly,
    cancel_token: CancellationToken,
}

/// Debounce state for settings-triggered regeneration. At most one deadline
/// is pending; a new change replaces it.
#[derive(Debug, Clone)]
struct RegenerationTimer {
    debounce: Duration,
    deadline: Option<Instant>,
}

impl RegenerationTimer {
    fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.debounce);
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }

    fn take_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

pub struct ConversationController {
    messages: Vec<Message>,
    session: ChatSession,
    settings: PromptSettings,
    state: ExchangeState,
    in_flight: Option<InFlight>,
    next_stream_id: u64,
    regeneration: RegenerationTimer,
    setup_help_requested: bool,
}

impl ConversationController {
    pub fn new(session: ChatSession, settings: PromptSettings) -> Self {
        Self {
            messages: Vec::new(),
            session,
            settings,
            state: ExchangeState::Idle,
            in_flight: None,
            next_stream_id: 0,
            regeneration: RegenerationTimer {
                debounce: DEFAULT_REGENERATE_DEBOUNCE,
                deadline: None,
            },
            setup_help_requested: false,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.regeneration.debounce = debounce;
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn settings(&self) -> &PromptSettings {
        &self.settings
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Returns `true` once after a credential failure asked for the setup
    /// help surface.
    pub fn take_setup_help_request(&mut self) -> bool {
        std::mem::take(&mut self.setup_help_requested)
    }

    /// Starts a new exchange for a user prompt, with an optional image given
    /// as a `data:` URI.
    pub fn send(
        &mut self,
        text: &str,
        image: Option<String>,
    ) -> Result<ExchangeStart, SendRejected> {
        if self.is_loading() {
            return Err(SendRejected::Busy);
        }
        if text.trim().is_empty() && image.is_none() {
            return Err(SendRejected::Empty);
        }

        self.regeneration.cancel();
        let request = self
            .session
            .begin_turn(text, image.as_deref(), &self.settings);
        self.messages.push(Message::user(text, image));

        let placeholder = Message::model_placeholder();
        let message_id = placeholder.id.clone();
        self.messages.push(placeholder);

        Ok(self.begin_exchange(message_id, request, ResponseAssembly::new()))
    }

    fn begin_exchange(
        &mut self,
        message_id: String,
        request: GenerateContentRequest,
        assembly: ResponseAssembly,
    ) -> ExchangeStart {
        self.next_stream_id += 1;
        let stream_id = self.next_stream_id;
        let cancel_token = CancellationToken::new();
        self.in_flight = Some(InFlight {
            stream_id,
            message_id: message_id.clone(),
            assembly,
            cancel_token: cancel_token.clone(),
        });
        self.state = ExchangeState::Sending;
        debug!(stream_id, %message_id, "exchange started");

        ExchangeStart {
            stream_id,
            message_id,
            request,
            cancel_token,
        }
    }

    fn is_current_stream(&self, stream_id: u64) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|flight| flight.stream_id == stream_id)
    }

    fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|message| message.id == id)
    }

    /// Applies one message from the streaming endpoint. Messages for stale
    /// streams are ignored.
    pub fn handle_stream_message(
        &mut self,
        stream_id: u64,
        message: StreamMessage,
    ) -> Option<ControllerUpdate> {
        if !self.is_current_stream(stream_id) {
            debug!(stream_id, "ignoring message for stale stream");
            return None;
        }
        match message {
            StreamMessage::Fragment { text, sources } => self.apply_fragment(&text, sources),
            StreamMessage::Error(error) => Some(self.fail(error)),
            StreamMessage::End => self.finish(),
        }
    }

    fn apply_fragment(
        &mut self,
        fragment: &str,
        sources: Vec<Source>,
    ) -> Option<ControllerUpdate> {
        let flight = self.in_flight.as_mut()?;
        flight.assembly.push_fragment(fragment, sources);
        let snapshot = flight.assembly.snapshot(true);
        let raw_text = flight.assembly.raw_text().to_string();
        let message_id = flight.message_id.clone();
        self.state = ExchangeState::Streaming;

        let message = self.message_mut(&message_id)?;
        message.text = raw_text;
        message.sources = snapshot.sources.clone();
        if snapshot.chart.is_some() {
            message.chart = snapshot.chart.clone();
        }
        if snapshot.table.is_some() {
            message.table = snapshot.table.clone();
        }

        Some(ControllerUpdate::Snapshot {
            message_id,
            snapshot,
        })
    }

    fn finish(&mut self) -> Option<ControllerUpdate> {
        let flight = self.in_flight.take()?;
        self.state = ExchangeState::Done;
        self.session.commit(flight.assembly.raw_text());
        let snapshot = flight.assembly.snapshot(false);
        if let Some(message) = self.message_mut(&flight.message_id) {
            message.is_streaming = false;
        }
        debug!(stream_id = flight.stream_id, "exchange finished");

        Some(ControllerUpdate::Finished {
            message_id: flight.message_id,
            snapshot,
        })
    }

    fn fail(&mut self, error: ExchangeError) -> ControllerUpdate {
        warn!("exchange failed: {error}");
        let show_setup_help = error.is_missing_credential();
        let text = if show_setup_help {
            self.settings.language.missing_key_error()
        } else {
            self.settings.language.generic_error()
        }
        .to_string();

        self.state = ExchangeState::Failed;
        self.session.discard_pending();
        self.setup_help_requested |= show_setup_help;

        let message_id = match self.in_flight.take() {
            Some(flight) => flight.message_id,
            None => String::new(),
        };
        if let Some(message) = self.message_mut(&message_id) {
            message.text = text.clone();
            message.is_streaming = false;
        }

        ControllerUpdate::Failed {
            message_id,
            text,
            show_setup_help,
        }
    }

    /// Applies new display settings. When the last message is a model answer
    /// and nothing is streaming, a regeneration is scheduled after the
    /// debounce window, replacing any earlier pending one. Returns whether a
    /// regeneration is now pending.
    pub fn update_settings(&mut self, settings: PromptSettings, now: Instant) -> bool {
        if settings == self.settings {
            return self.regeneration.deadline.is_some();
        }
        self.settings = settings;

        let last_is_model = self.messages.last().is_some_and(Message::is_model);
        if last_is_model && !self.is_loading() {
            self.regeneration.schedule(now);
            true
        } else {
            false
        }
    }

    pub fn regeneration_deadline(&self) -> Option<Instant> {
        self.regeneration.deadline
    }

    /// Starts the pending regeneration once its deadline has passed. The last
    /// model message is rewritten in place.
    pub fn poll_regeneration(&mut self, now: Instant) -> Option<ExchangeStart> {
        if !self.regeneration.take_if_due(now) {
            return None;
        }
        if self.is_loading() {
            return None;
        }

        let settings = self.settings.clone();
        let message = self.messages.last_mut().filter(|m| m.role == Role::Model)?;
        message.text.clear();
        message.is_streaming = true;
        let message_id = message.id.clone();
        let assembly = ResponseAssembly::seeded(message.chart.clone(), message.table.clone());

        let request = self.session.begin_turn(REGENERATE_PROMPT, None, &settings);
        Some(self.begin_exchange(message_id, request, assembly))
    }

    /// Tears down any running stream task. Used when the client exits.
    pub fn cancel_in_flight(&mut self) {
        if let Some(flight) = self.in_flight.take() {
            flight.cancel_token.cancel();
            self.session.discard_pending();
            if let Some(message) = self.message_mut(&flight.message_id) {
                message.is_streaming = false;
            }
            self.state = ExchangeState::Idle;
        }
    }

    /// Starts a fresh conversation with an empty session.
    pub fn reset(&mut self) {
        self.cancel_in_flight();
        self.messages.clear();
        self.session.reset();
        self.regeneration.cancel();
        self.state = ExchangeState::Idle;
    }
}

/// Paintable state of any message in the history.
pub fn message_snapshot(message: &Message) -> ResponseSnapshot {
    let display_text = match message.role {
        Role::User => message.text.clone(),
        Role::Model if message.is_streaming => sanitize_streaming(&message.text),
        Role::Model => sanitize(&message.text),
    };
    ResponseSnapshot {
        display_text,
        sources: message.sources.clone(),
        chart: message.chart.clone(),
        table: message.table.clone(),
        is_streaming: message.is_streaming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::prompt::{ComparisonAttribute, Language};

    fn controller() -> ConversationController {
        ConversationController::new(ChatSession::new(true), PromptSettings::default())
    }

    fn fragment(text: &str) -> StreamMessage {
        StreamMessage::Fragment {
            text: text.to_string(),
            sources: Vec::new(),
        }
    }

    fn complete_exchange(controller: &mut ConversationController, prompt: &str, answer: &str) {
        let start = controller.send(prompt, None).expect("send accepted");
        controller.handle_stream_message(start.stream_id, fragment(answer));
        controller.handle_stream_message(start.stream_id, StreamMessage::End);
    }

    #[test]
    fn send_creates_user_and_streaming_model_messages() {
        let mut controller = controller();
        let start = controller.send("Hello", None).expect("send accepted");

        assert_eq!(controller.state(), ExchangeState::Sending);
        assert!(controller.is_loading());
        let messages = controller.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_user());
        assert!(messages[1].is_model() && messages[1].is_streaming);
        assert_eq!(messages[1].id, start.message_id);
        assert_eq!(
            messages.iter().filter(|m| m.is_streaming).count(),
            1,
            "exactly one streaming message"
        );
    }

    #[test]
    fn send_is_rejected_while_busy_or_empty() {
        let mut controller = controller();
        assert_eq!(controller.send("   ", None).err(), Some(SendRejected::Empty));
        controller.send("Hello", None).expect("send accepted");
        assert_eq!(controller.send("Again", None).err(), Some(SendRejected::Busy));
    }

    #[test]
    fn fragments_update_message_and_end_commits_turn() {
        let mut controller = controller();
        let start = controller.send("Hello", None).expect("send accepted");

        let update = controller.handle_stream_message(
            start.stream_id,
            StreamMessage::Fragment {
                text: "Hi ".into(),
                sources: vec![Source::new("https://a.example", Some("A".into()))],
            },
        );
        assert!(matches!(update, Some(ControllerUpdate::Snapshot { .. })));
        assert_eq!(controller.state(), ExchangeState::Streaming);

        controller.handle_stream_message(
            start.stream_id,
            StreamMessage::Fragment {
                text: "there".into(),
                sources: vec![Source::new("https://a.example", Some("A".into()))],
            },
        );
        let Some(ControllerUpdate::Finished { snapshot, .. }) =
            controller.handle_stream_message(start.stream_id, StreamMessage::End)
        else {
            panic!("expected finished update");
        };

        assert_eq!(snapshot.display_text, "Hi there");
        assert_eq!(snapshot.sources.len(), 1);
        assert_eq!(controller.state(), ExchangeState::Done);
        assert!(!controller.is_loading());
        assert!(!controller.messages()[1].is_streaming);
        assert_eq!(controller.session().history().len(), 2);
    }

    #[test]
    fn stale_stream_messages_are_ignored() {
        let mut controller = controller();
        let start = controller.send("Hello", None).expect("send accepted");
        assert!(controller
            .handle_stream_message(start.stream_id + 1, fragment("nope"))
            .is_none());
        assert!(controller.messages()[1].text.is_empty());
    }

    #[test]
    fn failure_replaces_text_and_keeps_history_usable() {
        let mut controller = controller();
        complete_exchange(&mut controller, "First", "First answer");

        let start = controller.send("Second", None).expect("send accepted");
        controller.handle_stream_message(start.stream_id, fragment("partial"));
        let update = controller.handle_stream_message(
            start.stream_id,
            StreamMessage::Error(ExchangeError::Http("connection reset".into())),
        );
        assert_eq!(
            update,
            Some(ControllerUpdate::Failed {
                message_id: start.message_id.clone(),
                text: Language::Vn.generic_error().to_string(),
                show_setup_help: false,
            })
        );
        // The trailing End of a failed stream is stale.
        assert!(controller
            .handle_stream_message(start.stream_id, StreamMessage::End)
            .is_none());

        assert_eq!(controller.state(), ExchangeState::Failed);
        assert_eq!(controller.messages()[1].text, "First answer");
        assert_eq!(controller.messages()[3].text, Language::Vn.generic_error());
        assert!(!controller.take_setup_help_request());
        assert_eq!(controller.session().history().len(), 2);
        assert!(controller.send("Retry", None).is_ok());
    }

    #[test]
    fn missing_credential_requests_setup_help() {
        let mut controller = ConversationController::new(
            ChatSession::new(true),
            PromptSettings {
                language: Language::En,
                attributes: Vec::new(),
            },
        );
        let start = controller.send("Hello", None).expect("send accepted");
        controller.handle_stream_message(
            start.stream_id,
            StreamMessage::Error(ExchangeError::MissingCredential),
        );
        assert_eq!(
            controller.messages()[1].text,
            Language::En.missing_key_error()
        );
        assert!(controller.take_setup_help_request());
        assert!(!controller.take_setup_help_request());
    }

    #[test]
    fn settings_changes_debounce_into_one_regeneration() {
        let mut controller = controller();
        complete_exchange(&mut controller, "Compare A and B", "old answer");

        let t0 = Instant::now();
        let mut english = controller.settings().clone();
        english.language = Language::En;
        assert!(controller.update_settings(english.clone(), t0));

        let mut fewer = english;
        fewer.attributes = vec![ComparisonAttribute::Price];
        assert!(controller.update_settings(fewer, t0 + Duration::from_millis(400)));

        // The first deadline was replaced by the second change.
        assert!(controller
            .poll_regeneration(t0 + Duration::from_millis(700))
            .is_none());
        let start = controller
            .poll_regeneration(t0 + Duration::from_millis(1000))
            .expect("regeneration due");
        assert!(controller
            .poll_regeneration(t0 + Duration::from_millis(2000))
            .is_none());

        assert_eq!(controller.messages().len(), 2);
        assert_eq!(start.message_id, controller.messages()[1].id);
        assert!(controller.messages()[1].text.is_empty());
        assert!(controller.messages()[1].is_streaming);

        let last_turn = start.request.contents.last().expect("turn");
        let text = last_turn.parts[0].text.as_deref().unwrap_or_default();
        assert!(text.starts_with(REGENERATE_PROMPT));
        assert!(text.contains("strictly in English"));

        controller.handle_stream_message(start.stream_id, fragment("new answer"));
        controller.handle_stream_message(start.stream_id, StreamMessage::End);
        assert_eq!(controller.messages().len(), 2);
        assert_eq!(controller.messages()[1].text, "new answer");
    }

    #[test]
    fn settings_change_without_model_answer_does_not_regenerate() {
        let mut controller = controller();
        let mut settings = controller.settings().clone();
        settings.language = Language::Kr;
        assert!(!controller.update_settings(settings.clone(), Instant::now()));

        controller.send("Hello", None).expect("send accepted");
        settings.language = Language::En;
        assert!(!controller.update_settings(settings, Instant::now()));
        assert!(controller.regeneration_deadline().is_none());
    }

    #[test]
    fn sending_cancels_pending_regeneration() {
        let mut controller = controller();
        complete_exchange(&mut controller, "Hi", "Hello");
        let mut settings = controller.settings().clone();
        settings.language = Language::En;
        let now = Instant::now();
        controller.update_settings(settings, now);
        controller.send("Next", None).expect("send accepted");
        assert!(controller.regeneration_deadline().is_none());
    }

    #[test]
    fn reset_starts_a_fresh_session() {
        let mut controller = controller();
        complete_exchange(&mut controller, "Hi", "Hello");
        let start = controller.send("Again", None).expect("send accepted");
        controller.reset();
        assert!(start.cancel_token.is_cancelled());
        assert!(controller.messages().is_empty());
        assert!(controller.session().history().is_empty());
        assert_eq!(controller.state(), ExchangeState::Idle);
    }

    #[test]
    fn message_snapshot_hides_payload_blocks() {
        let mut message = Message::model_placeholder();
        message.text = "Answer\n```json\n{\"type\":\"bar\",\"categories\":[]".into();
        assert_eq!(message_snapshot(&message).display_text, "Answer");
        message.is_streaming = false;
        message.text = "Answer\n```json\n{\"type\":\"bar\",\"categories\":[],\"series\":[]}\n```".into();
        assert_eq!(message_snapshot(&message).display_text, "Answer");
    }
}
