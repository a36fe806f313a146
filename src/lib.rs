//! Colorized, human-readable console output for structured log records.
//!
//! [`PrettyHandler`] wraps a structured [`Encoder`] (JSON by default),
//! captures what it would write, and prints a terminal-friendly line
//! instead. [`PrettyLayer`] plugs it into `tracing_subscriber`.

pub mod color;
pub mod encoder;
pub mod env;
pub mod error;
pub mod handler;
pub mod init;
pub mod json;
pub mod layer;
pub mod level;
pub mod record;

pub use encoder::{Encoder, HandlerOptions, ReplaceAttr};
pub use error::HandlerError;
pub use handler::PrettyHandler;
pub use json::JsonEncoder;
pub use layer::PrettyLayer;
pub use level::{Level, LevelVar, Leveler};
pub use record::{Attr, Record, Source, Value};
