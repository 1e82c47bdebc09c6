//! Domain logic: response assembly, the model session and the conversation
//! state machine. Nothing here paints or reads the terminal.

pub mod accumulator;
pub mod assembly;
pub mod chat_stream;
pub mod config;
pub mod conversation;
pub mod export;
pub mod extract;
pub mod message;
pub mod payload;
pub mod prompt;
pub mod session;
