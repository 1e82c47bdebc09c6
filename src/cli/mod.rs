//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod output;
pub mod render;
pub mod say;

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use crate::cli::chat::run_chat;
use crate::cli::render::run_render;
use crate::cli::say::{run_say, SayOptions};
use crate::core::assembly::ResponseSnapshot;
use crate::core::chat_stream::{ChatStreamService, StreamMessage, StreamParams};
use crate::core::config::Config;
use crate::core::conversation::ExchangeStart;
use crate::core::export::{write_export, ExportFormat};
use crate::core::payload::TablePayload;
use crate::core::prompt::{image_mime_for_path, to_data_uri, Language};
use crate::ui::markdown;
use crate::utils::logging::{init_tracing, TranscriptLog};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("VERGEN_GIT_SHA"),
    "\nbuilt: ",
    env!("VERGEN_BUILD_DATE"),
    "\nrustc: ",
    env!("VERGEN_RUSTC_SEMVER"),
);

#[derive(Parser)]
#[command(name = "sweetscout")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Confectionery market research chat in the terminal")]
#[command(
    long_about = "SweetScout asks a Gemini model about candies, cakes, desserts and snacks, \
and renders its streamed answers as formatted text, comparison tables and charts.\n\n\
Environment Variables:\n\
  GEMINI_API_KEY    API key for the Gemini endpoint (API_KEY is also accepted)\n\
  SWEETSCOUT_LOG    Diagnostics filter, e.g. 'debug' (defaults to 'warn')\n\n\
Chat commands:\n\
  /lang VN|EN|KR    Change the answer language and regenerate the last answer\n\
  /attrs a,b,...    Change comparison columns and regenerate the last answer\n\
  /image PATH TEXT  Send TEXT with an attached image\n\
  /export csv|json  Export the last comparison table\n\
  /reset            Start a new conversation\n\
  /quit             Leave"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use instead of the configured one
    #[arg(short = 'm', long, global = true)]
    pub model: Option<String>,

    /// Append the conversation transcript to this file
    #[arg(short = 'l', long, global = true)]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a single question and print the rendered answer
    Say {
        /// The question
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
        /// Attach an image file
        #[arg(short = 'i', long)]
        image: Option<PathBuf>,
        /// Answer language (VN, EN or KR)
        #[arg(long)]
        lang: Option<Language>,
        /// Comparison columns, e.g. price,flavor,reviews
        #[arg(long)]
        attrs: Option<String>,
        /// Export the comparison table after the answer
        #[arg(long, value_name = "csv|json")]
        export: Option<ExportFormat>,
    },
    /// Start the interactive chat (default)
    Chat,
    /// Render a saved raw answer without contacting the model
    Render {
        /// File holding the raw model text
        file: PathBuf,
        /// Language for labels
        #[arg(long)]
        lang: Option<Language>,
        /// Export the comparison table found in the file
        #[arg(long, value_name = "csv|json")]
        export: Option<ExportFormat>,
    },
    /// Set configuration values, or print them when no value is given
    Set {
        /// Configuration key: model, base-url, language, attributes, search,
        /// regenerate-debounce-ms or export-dir
        key: Option<String>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let mut config = Config::load()?;
    if let Some(model) = args.model.filter(|m| !m.trim().is_empty()) {
        config.model = Some(model);
    }
    let transcript = TranscriptLog::new(args.log)?;

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Say {
            prompt,
            image,
            lang,
            attrs,
            export,
        } => {
            run_say(
                SayOptions {
                    prompt: prompt.join(" "),
                    image,
                    language: lang,
                    attributes: attrs,
                    export,
                },
                &config,
                &transcript,
            )
            .await
        }
        Commands::Chat => run_chat(&config, &transcript).await,
        Commands::Render { file, lang, export } => run_render(&file, lang, export, &config),
        Commands::Set { key, value } => {
            let mut stored = Config::load()?;
            match key {
                Some(key) if !value.is_empty() => {
                    let value = value.join(" ");
                    if let Err(e) = stored.set_value(&key, &value) {
                        eprintln!("❌ {e}");
                        std::process::exit(1);
                    }
                    stored.save()?;
                    println!("✅ Set {key} to: {value}");
                }
                _ => stored.print_all(),
            }
            Ok(())
        }
        Commands::Unset { key } => {
            let mut stored = Config::load()?;
            if let Err(e) = stored.unset_value(&key) {
                eprintln!("❌ {e}");
                std::process::exit(1);
            }
            stored.save()?;
            println!("✅ Unset {key}");
            Ok(())
        }
    }
}

/// Runs the streaming requests the conversation controller asks for.
pub(crate) struct ExchangeRunner {
    service: ChatStreamService,
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl ExchangeRunner {
    pub(crate) fn new(config: &Config) -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (service, rx) = ChatStreamService::new();
        let runner = Self {
            service,
            client: reqwest::Client::new(),
            base_url: config.base_url().to_string(),
            model: config.model().to_string(),
            api_key: Config::api_key_from_env(),
        };
        (runner, rx)
    }

    pub(crate) fn start(&self, start: ExchangeStart) {
        self.service.spawn_stream(StreamParams {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            request: start.request,
            cancel_token: start.cancel_token,
            stream_id: start.stream_id,
        });
    }
}

pub(crate) fn load_image(path: &Path) -> Result<String, Box<dyn Error>> {
    let mime = image_mime_for_path(path)
        .ok_or_else(|| format!("unsupported image type: {}", path.display()))?;
    let bytes = std::fs::read(path)?;
    Ok(to_data_uri(mime, &bytes))
}

/// Table to export for an answer: its structured comparison data, else the
/// first markdown table in the visible text.
pub(crate) fn exportable_table(snapshot: &ResponseSnapshot) -> Option<TablePayload> {
    snapshot.table.clone().or_else(|| {
        markdown::render(&snapshot.display_text)
            .iter()
            .find_map(markdown::table_payload)
    })
}

pub(crate) fn export_table(
    snapshot: &ResponseSnapshot,
    format: ExportFormat,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    match exportable_table(snapshot) {
        Some(table) => {
            let path = write_export(&table, format, &config.export_dir(), chrono::Utc::now())?;
            println!("✅ Exported comparison table to {}", path.display());
        }
        None => eprintln!("⚠️  No comparison table to export"),
    }
    Ok(())
}

pub(crate) fn print_setup_help() {
    eprintln!();
    eprintln!("💡 Setup:");
    eprintln!("  • Create a key at https://aistudio.google.com/apikey");
    eprintln!("  • export GEMINI_API_KEY=\"your-api-key\"");
    eprintln!("  • Optionally pick a model: sweetscout set model gemini-2.5-flash");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn say_parses_options() {
        let args = Args::try_parse_from([
            "sweetscout",
            "say",
            "--lang",
            "en",
            "--export",
            "csv",
            "Compare",
            "A",
            "and",
            "B",
        ])
        .expect("parse");
        match args.command {
            Some(Commands::Say {
                prompt,
                lang,
                export,
                ..
            }) => {
                assert_eq!(prompt.join(" "), "Compare A and B");
                assert_eq!(lang, Some(Language::En));
                assert_eq!(export, Some(ExportFormat::Csv));
            }
            _ => panic!("expected say"),
        }
    }

    #[test]
    fn markdown_table_is_exported_when_no_data_block() {
        let snapshot = ResponseSnapshot {
            display_text: "Intro\n| A | B |\n|---|---|\n| 1 | 2 |".into(),
            sources: Vec::new(),
            chart: None,
            table: None,
            is_streaming: false,
        };
        let table = exportable_table(&snapshot).expect("table");
        assert_eq!(table.headers, vec!["A", "B"]);
        assert_eq!(table.rows.len(), 1);
    }
}
