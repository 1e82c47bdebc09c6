//! SweetScout is a terminal chat client for confectionery market research,
//! backed by a Gemini model.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation state machine, prompt shaping, the
//!   streaming transport, payload extraction and table export.
//! - [`ui`] turns a response snapshot into styled terminal lines: markdown
//!   blocks, comparison tables, and bar or radar charts.
//! - [`api`] defines the Gemini request and streaming response payloads.
//! - [`utils`] holds URL handling, color quantization and logging.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
