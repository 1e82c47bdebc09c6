//! Interactive line-oriented chat.
//!
//! Reads prompts and slash commands from stdin while the current answer
//! streams, and fires debounced regenerations when settings change.

use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use ratatui::text::{Line, Span};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::sleep_until;
use tracing::{debug, warn};

use crate::cli::output::Printer;
use crate::cli::{export_table, load_image, print_setup_help, ExchangeRunner};
use crate::core::chat_stream::StreamMessage;
use crate::core::config::Config;
use crate::core::conversation::{
    message_snapshot, ControllerUpdate, ConversationController, ExchangeStart, SendRejected,
};
use crate::core::export::ExportFormat;
use crate::core::prompt::{parse_attribute_list, Language, PromptSettings};
use crate::core::session::ChatSession;
use crate::ui::paint::{paint_response, paint_user};
use crate::ui::theme::Theme;
use crate::utils::logging::TranscriptLog;

const HELP: &[&str] = &[
    "/lang VN|EN|KR      change the answer language",
    "/attrs a,b,...      change comparison columns (price, flavor, ingredients, audience,",
    "                    reviews, pros_cons, product_image, product_profile, social_reviews)",
    "/image PATH [TEXT]  send TEXT with an attached image",
    "/export csv|json    export the last comparison table",
    "/reset              start a new conversation",
    "/quit               leave",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChatInput {
    Message { text: String, image: Option<PathBuf> },
    Language(Language),
    Attributes(String),
    Export(ExportFormat),
    Reset,
    Help,
    Quit,
    Invalid(String),
    Blank,
}

fn parse_input(line: &str) -> ChatInput {
    let line = line.trim();
    if line.is_empty() {
        return ChatInput::Blank;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ChatInput::Message {
            text: line.to_string(),
            image: None,
        };
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));
    match name {
        "lang" | "language" => rest
            .parse()
            .map(ChatInput::Language)
            .unwrap_or_else(ChatInput::Invalid),
        "attrs" | "attributes" => ChatInput::Attributes(rest.to_string()),
        "image" => {
            let (path, text) = rest
                .split_once(char::is_whitespace)
                .map(|(path, text)| (path, text.trim()))
                .unwrap_or((rest, ""));
            if path.is_empty() {
                ChatInput::Invalid("usage: /image PATH [TEXT]".into())
            } else {
                ChatInput::Message {
                    text: text.to_string(),
                    image: Some(PathBuf::from(path)),
                }
            }
        }
        "export" => rest
            .parse()
            .map(ChatInput::Export)
            .unwrap_or_else(ChatInput::Invalid),
        "reset" | "new" => ChatInput::Reset,
        "help" | "?" => ChatInput::Help,
        "quit" | "exit" | "q" => ChatInput::Quit,
        other => ChatInput::Invalid(format!("unknown command '/{other}', try /help")),
    }
}

struct ChatLoop<'a> {
    controller: ConversationController,
    runner: ExchangeRunner,
    printer: Printer,
    theme: Theme,
    config: &'a Config,
    transcript: &'a TranscriptLog,
    /// Message being rewritten by a settings-triggered regeneration.
    regenerating: Option<String>,
}

impl ChatLoop<'_> {
    fn language(&self) -> Language {
        self.controller.settings().language
    }

    fn system(&mut self, text: impl Into<String>) -> Result<(), Box<dyn Error>> {
        let line = Line::from(Span::styled(text.into(), self.theme.system_text_style));
        self.printer.print(vec![line])?;
        Ok(())
    }

    fn start(&mut self, start: ExchangeStart) {
        debug!(stream_id = start.stream_id, "starting exchange");
        self.runner.start(start);
    }

    /// Returns false when the user asked to leave.
    fn handle_input(&mut self, input: ChatInput) -> Result<bool, Box<dyn Error>> {
        match input {
            ChatInput::Blank => {}
            ChatInput::Quit => return Ok(false),
            ChatInput::Help => {
                let lines = HELP
                    .iter()
                    .map(|text| Line::from(Span::styled(*text, self.theme.system_text_style)))
                    .collect();
                self.printer.print(lines)?;
            }
            ChatInput::Invalid(reason) => self.system(format!("⚠️  {reason}"))?,
            ChatInput::Reset => {
                self.controller.reset();
                self.regenerating = None;
                self.transcript.start_conversation()?;
                self.system("Started a new conversation.")?;
            }
            ChatInput::Language(language) => {
                let mut settings = self.controller.settings().clone();
                settings.language = language;
                self.apply_settings(settings, format!("Language: {}", language.display_name()))?;
            }
            ChatInput::Attributes(raw) => match parse_attribute_list(&raw) {
                Ok(attributes) => {
                    let mut settings = self.controller.settings().clone();
                    settings.attributes = attributes;
                    let summary = settings
                        .attributes
                        .iter()
                        .map(|attr| attr.key())
                        .collect::<Vec<_>>()
                        .join(", ");
                    self.apply_settings(settings, format!("Comparison columns: {summary}"))?;
                }
                Err(reason) => self.system(format!("⚠️  {reason}"))?,
            },
            ChatInput::Export(format) => {
                let last_answer = self
                    .controller
                    .messages()
                    .iter()
                    .rev()
                    .find(|message| message.is_model() && !message.is_streaming)
                    .map(message_snapshot);
                match last_answer {
                    Some(snapshot) => export_table(&snapshot, format, self.config)?,
                    None => self.system("⚠️  No answer to export yet")?,
                }
            }
            ChatInput::Message { text, image } => self.send(&text, image)?,
        }
        Ok(true)
    }

    fn apply_settings(
        &mut self,
        settings: PromptSettings,
        summary: String,
    ) -> Result<(), Box<dyn Error>> {
        let pending = self.controller.update_settings(settings, Instant::now());
        if pending {
            self.system(format!("{summary} (the last answer will be regenerated)"))
        } else {
            self.system(summary)
        }
    }

    fn send(&mut self, text: &str, image: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
        let image = match image.as_deref().map(load_image).transpose() {
            Ok(image) => image,
            Err(e) => return self.system(format!("⚠️  {e}")),
        };
        match self.controller.send(text, image) {
            Ok(start) => {
                self.regenerating = None;
                let width = self.printer.width();
                let user = &self.controller.messages()[self.controller.messages().len() - 2];
                self.transcript.log_message(user)?;
                let lines = paint_user(&user.text, user.image.is_some(), width, &self.theme);
                self.printer.print(lines)?;
                self.start(start);
                Ok(())
            }
            Err(SendRejected::Busy) => self.system("⏳ Still answering, please wait."),
            Err(SendRejected::Empty) => Ok(()),
        }
    }

    fn handle_stream(&mut self, message: StreamMessage, stream_id: u64) -> Result<(), Box<dyn Error>> {
        let Some(update) = self.controller.handle_stream_message(stream_id, message) else {
            return Ok(());
        };
        let width = self.printer.width();
        let language = self.language();
        match update {
            ControllerUpdate::Snapshot { snapshot, .. } => {
                self.printer
                    .preview(&paint_response(&snapshot, language, width, &self.theme))?;
            }
            ControllerUpdate::Finished { message_id, snapshot } => {
                self.printer
                    .print(paint_response(&snapshot, language, width, &self.theme))?;
                if self.regenerating.take().as_deref() == Some(message_id.as_str()) {
                    self.transcript.rewrite(self.controller.messages())?;
                } else if let Some(message) = self.controller.messages().last() {
                    self.transcript.log_message(message)?;
                }
            }
            ControllerUpdate::Failed {
                text,
                show_setup_help,
                ..
            } => {
                self.regenerating = None;
                self.printer.discard_preview()?;
                let line = Line::from(Span::styled(text, self.theme.error_text_style));
                self.printer.print(vec![line])?;
                if show_setup_help && self.controller.take_setup_help_request() {
                    print_setup_help();
                }
            }
        }
        Ok(())
    }

    fn regenerate(&mut self) -> Result<(), Box<dyn Error>> {
        if let Some(start) = self.controller.poll_regeneration(Instant::now()) {
            self.regenerating = Some(start.message_id.clone());
            self.system("↻ Regenerating the last answer…")?;
            self.start(start);
        }
        Ok(())
    }
}

pub async fn run_chat(config: &Config, transcript: &TranscriptLog) -> Result<(), Box<dyn Error>> {
    let controller = ConversationController::new(
        ChatSession::new(config.search_enabled()),
        config.prompt_settings(),
    )
    .with_debounce(config.regenerate_debounce());
    let (runner, mut rx) = ExchangeRunner::new(config);
    let mut chat = ChatLoop {
        controller,
        runner,
        printer: Printer::new(),
        theme: Theme::for_current_terminal(),
        config,
        transcript,
        regenerating: None,
    };

    if Config::api_key_from_env().is_none() {
        warn!("no API key in the environment");
    }
    chat.system(format!(
        "SweetScout chat ({}, {}). Type /help for commands.",
        config.model(),
        chat.language().display_name()
    ))?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let deadline = chat.controller.regeneration_deadline();
        let wake_at = tokio::time::Instant::from_std(deadline.unwrap_or_else(Instant::now));
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !chat.handle_input(parse_input(&line))? {
                            break;
                        }
                    }
                    None => break,
                }
            }
            Some((message, stream_id)) = rx.recv() => {
                chat.handle_stream(message, stream_id)?;
            }
            _ = sleep_until(wake_at), if deadline.is_some() => {
                chat.regenerate()?;
            }
        }
    }

    chat.controller.cancel_in_flight();
    chat.printer.discard_preview()?;
    Ok(())
}
