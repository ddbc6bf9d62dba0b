//! Keyword and pattern heuristics for the chat channel.
//!
//! Nothing here performs I/O. Intent detection and slot extraction are deliberately simple
//! ordered pattern tables; they will misfire on unusual phrasing and are not a language model.

pub mod datetime;
pub mod intent;
pub mod slots;
