use std::cell::Cell;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

use crate::core::conversation::message_snapshot;
use crate::core::message::{Message, Role};

/// Environment variable holding the tracing filter, e.g. `sweetscout=debug`.
pub const LOG_FILTER_ENV: &str = "SWEETSCOUT_LOG";

/// Installs the stderr diagnostics subscriber. Stdout stays reserved for
/// painted output. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Plain-text transcript of a conversation, appended to as messages
/// complete. Model answers are written as their sanitized display text.
pub struct TranscriptLog {
    file_path: Option<PathBuf>,
    /// Byte length of the transcript written before the current conversation.
    conversation_start: Cell<u64>,
}

impl TranscriptLog {
    pub fn new(log_file: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(path) = &log_file {
            test_file_access(path)?;
        }
        Ok(TranscriptLog {
            file_path: log_file,
            conversation_start: Cell::new(0),
        })
    }

    /// Marks everything written so far as belonging to earlier
    /// conversations, so [`rewrite`](Self::rewrite) keeps it.
    pub fn start_conversation(&self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = &self.file_path else {
            return Ok(());
        };
        let len = match fs::metadata(file_path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        self.conversation_start.set(len);
        Ok(())
    }

    pub fn log_message(&self, message: &Message) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = &self.file_path else {
            return Ok(());
        };
        let Some(entry) = transcript_entry(message) else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);
        write_entry(&mut writer, &entry)?;
        writer.flush()?;
        Ok(())
    }

    /// Replaces the current conversation's part of the transcript, used after
    /// the last answer was regenerated in place.
    pub fn rewrite(&self, messages: &[Message]) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = &self.file_path else {
            return Ok(());
        };
        let parent = file_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut earlier = match fs::read(file_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let keep = usize::try_from(self.conversation_start.get())
            .unwrap_or(usize::MAX)
            .min(earlier.len());
        earlier.truncate(keep);

        let mut temp_file = NamedTempFile::new_in(parent)?;
        temp_file.write_all(&earlier)?;
        for entry in messages.iter().filter_map(transcript_entry) {
            write_entry(&mut temp_file, &entry)?;
        }
        temp_file.flush()?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(file_path)?;
        Ok(())
    }
}

fn transcript_entry(message: &Message) -> Option<String> {
    match message.role {
        Role::User => {
            let image = if message.image.is_some() { " [image]" } else { "" };
            Some(format!("You: {}{image}", message.text))
        }
        Role::Model if message.is_streaming => None,
        Role::Model => {
            let text = message_snapshot(message).display_text;
            (!text.is_empty()).then_some(text)
        }
    }
}

fn write_entry(writer: &mut impl Write, entry: &str) -> std::io::Result<()> {
    for line in entry.lines() {
        writeln!(writer, "{line}")?;
    }
    writeln!(writer)
}

fn test_file_access(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.flush()?;
    Ok(())
}
