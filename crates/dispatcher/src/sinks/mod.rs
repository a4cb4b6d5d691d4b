//! Sink implementations
//!
//! Contains LogSink and DisplaySink.

mod display;
mod log;

pub use self::display::{DisplayFrame, DisplayOptions, DisplaySelection, DisplaySink};
pub use self::log::LogSink;
