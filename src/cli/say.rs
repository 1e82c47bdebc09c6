//! Single-question "say" command

use std::error::Error;
use std::path::PathBuf;

use ratatui::text::{Line, Span};
use tracing::debug;

use crate::cli::output::Printer;
use crate::cli::{export_table, load_image, print_setup_help, ExchangeRunner};
use crate::core::config::Config;
use crate::core::conversation::{ControllerUpdate, ConversationController};
use crate::core::export::ExportFormat;
use crate::core::prompt::{parse_attribute_list, Language};
use crate::core::session::ChatSession;
use crate::ui::paint::{paint_response, paint_user};
use crate::ui::theme::Theme;
use crate::utils::logging::TranscriptLog;

pub struct SayOptions {
    pub prompt: String,
    pub image: Option<PathBuf>,
    pub language: Option<Language>,
    pub attributes: Option<String>,
    pub export: Option<ExportFormat>,
}

pub async fn run_say(
    options: SayOptions,
    config: &Config,
    transcript: &TranscriptLog,
) -> Result<(), Box<dyn Error>> {
    let mut settings = config.prompt_settings();
    if let Some(language) = options.language {
        settings.language = language;
    }
    if let Some(raw) = options.attributes.as_deref() {
        settings.attributes = parse_attribute_list(raw)?;
    }
    let language = settings.language;
    let image = options.image.as_deref().map(load_image).transpose()?;

    let mut controller =
        ConversationController::new(ChatSession::new(config.search_enabled()), settings);
    let start = match controller.send(&options.prompt, image) {
        Ok(start) => start,
        Err(_) => {
            eprintln!("Usage: sweetscout say <prompt>");
            std::process::exit(1);
        }
    };

    let theme = Theme::for_current_terminal();
    let mut printer = Printer::new();
    let width = printer.width();
    let user_message = controller.messages()[0].clone();
    transcript.log_message(&user_message)?;
    printer.print(paint_user(
        &user_message.text,
        user_message.image.is_some(),
        width,
        &theme,
    ))?;

    let (runner, mut rx) = ExchangeRunner::new(config);
    runner.start(start);

    while let Some((message, stream_id)) = rx.recv().await {
        let Some(update) = controller.handle_stream_message(stream_id, message) else {
            continue;
        };
        match update {
            ControllerUpdate::Snapshot { snapshot, .. } => {
                printer.preview(&paint_response(&snapshot, language, width, &theme))?;
            }
            ControllerUpdate::Finished { message_id, snapshot } => {
                debug!(%message_id, "answer complete");
                printer.print(paint_response(&snapshot, language, width, &theme))?;
                if let Some(message) = controller.messages().last() {
                    transcript.log_message(message)?;
                }
                if let Some(format) = options.export {
                    export_table(&snapshot, format, config)?;
                }
                return Ok(());
            }
            ControllerUpdate::Failed {
                text,
                show_setup_help,
                ..
            } => {
                printer.discard_preview()?;
                printer.print(vec![Line::from(Span::styled(text, theme.error_text_style))])?;
                if show_setup_help {
                    print_setup_help();
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
