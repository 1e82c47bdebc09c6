//! Styled line output for the line-oriented commands.
//!
//! On a terminal, painted lines are pushed into the scrollback above a small
//! inline viewport that previews the answer while it streams. Anything else
//! (pipes, files) receives the plain text once the answer is complete.

use std::io::{self, IsTerminal, Stdout, Write};

use ratatui::backend::CrosstermBackend;
use ratatui::crossterm::terminal;
use ratatui::text::Line;
use ratatui::widgets::{Paragraph, Widget};
use ratatui::{Terminal, TerminalOptions, Viewport};

const PREVIEW_HEIGHT: u16 = 12;
const FALLBACK_WIDTH: u16 = 80;

type InlineTerminal = Terminal<CrosstermBackend<Stdout>>;

pub struct Printer {
    styled: bool,
    preview: Option<InlineTerminal>,
}

impl Printer {
    pub fn new() -> Self {
        Self {
            styled: io::stdout().is_terminal(),
            preview: None,
        }
    }

    pub fn width(&self) -> u16 {
        terminal::size()
            .ok()
            .map(|(w, _)| w)
            .filter(|w| *w > 0)
            .unwrap_or(FALLBACK_WIDTH)
    }

    fn inline_terminal(height: u16) -> io::Result<InlineTerminal> {
        Terminal::with_options(
            CrosstermBackend::new(io::stdout()),
            TerminalOptions {
                viewport: Viewport::Inline(height),
            },
        )
    }

    /// Shows the tail of a partial answer. Does nothing off a terminal.
    pub fn preview(&mut self, lines: &[Line<'static>]) -> io::Result<()> {
        if !self.styled {
            return Ok(());
        }
        if self.preview.is_none() {
            self.preview = Some(Self::inline_terminal(PREVIEW_HEIGHT)?);
        }
        let Some(preview) = self.preview.as_mut() else {
            return Ok(());
        };
        let skip = lines.len().saturating_sub(usize::from(PREVIEW_HEIGHT));
        let tail: Vec<Line<'static>> = lines[skip..].to_vec();
        preview.draw(|frame| {
            frame.render_widget(Paragraph::new(tail), frame.area());
        })?;
        Ok(())
    }

    /// Prints finished lines and removes any live preview.
    pub fn print(&mut self, lines: Vec<Line<'static>>) -> io::Result<()> {
        if !self.styled {
            let mut out = io::stdout().lock();
            for line in &lines {
                writeln!(out, "{line}")?;
            }
            return out.flush();
        }

        let mut terminal = match self.preview.take() {
            Some(preview) => preview,
            None => Self::inline_terminal(1)?,
        };
        let screen_rows = terminal::size().map(|(_, h)| h).unwrap_or(24);
        let chunk_rows = usize::from(screen_rows.saturating_sub(PREVIEW_HEIGHT).max(1));
        for chunk in lines.chunks(chunk_rows) {
            let paragraph = Paragraph::new(chunk.to_vec());
            terminal.insert_before(chunk.len() as u16, |buf| {
                paragraph.render(buf.area, buf);
            })?;
        }
        terminal.clear()?;
        Ok(())
    }

    /// Drops the live preview without printing anything.
    pub fn discard_preview(&mut self) -> io::Result<()> {
        if let Some(mut preview) = self.preview.take() {
            preview.clear()?;
        }
        Ok(())
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}
