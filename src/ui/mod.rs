//! Terminal presentation of conversation state.
//!
//! - [`markdown`]: line-oriented renderer producing [`markdown::RenderNode`]s.
//! - [`chart`]: bar and radar chart models built from chart payloads.
//! - [`paint`] and [`wrap`]: conversion into styled ratatui lines.
//! - [`theme`]: the fixed color policy.
//!
//! Ownership boundary: this layer never mutates conversation state, which
//! [`crate::core`] owns.

pub mod chart;
pub mod markdown;
pub mod paint;
pub mod theme;
pub mod wrap;
