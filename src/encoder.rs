use crate::level::{Level, Leveler};
use crate::record::{Attr, Record};
use std::error::Error;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// Key of the built-in timestamp attribute.
pub const TIME_KEY: &str = "time";
/// Key of the built-in level attribute.
pub const LEVEL_KEY: &str = "level";
/// Key of the built-in message attribute.
pub const MESSAGE_KEY: &str = "msg";
/// Key of the built-in call-site attribute.
pub const SOURCE_KEY: &str = "source";

/// Per-attribute rewriting hook.
///
/// Receives the group path the attribute lives under and the attribute
/// itself. Returning `None` drops the attribute from the output.
pub type ReplaceAttr = Arc<dyn Fn(&[String], Attr) -> Option<Attr> + Send + Sync>;

/// Structured encoder that a [`PrettyHandler`](crate::handler::PrettyHandler)
/// wraps and captures output from.
///
/// Implementations serialize one record, together with whatever
/// attributes and groups were attached through [`Encoder::with_attrs`]
/// and [`Encoder::with_group`], into the provided byte sink.
pub trait Encoder: Send + Sync {
    /// Whether records at `level` should be handled at all.
    fn enabled(&self, level: Level) -> bool;

    /// Serialize `record` into `out`.
    ///
    /// **Returns**
    /// - `Ok(())` once the complete record has been written.
    /// - `Err(..)` if the record could not be serialized. `out` may hold
    ///   partial output in that case; callers are expected to discard it.
    fn handle(
        &self,
        record: &Record,
        out: &mut dyn Write,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// A new encoder that also emits `attrs` with every record.
    fn with_attrs(&self, attrs: Vec<Attr>) -> Self
    where
        Self: Sized;

    /// A new encoder that nests subsequently added attributes under `name`.
    fn with_group(&self, name: &str) -> Self
    where
        Self: Sized;
}

/// Options shared by the pretty handler and the JSON encoder it builds.
///
/// **Fields**
/// - `level`: minimum level let through; a fixed [`Level`] or a
///   [`LevelVar`](crate::level::LevelVar) for runtime changes.
/// - `add_source`: emit the record's call site under the `source` key.
/// - `replace_attr`: optional rewriting hook applied to each attribute.
#[derive(Clone)]
pub struct HandlerOptions {
    pub level: Arc<dyn Leveler>,
    pub add_source: bool,
    pub replace_attr: Option<ReplaceAttr>,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            level: Arc::new(Level::INFO),
            add_source: false,
            replace_attr: None,
        }
    }
}

impl HandlerOptions {
    pub fn level(mut self, level: impl Leveler + 'static) -> Self {
        self.level = Arc::new(level);
        self
    }

    pub fn add_source(mut self, add_source: bool) -> Self {
        self.add_source = add_source;
        self
    }

    pub fn replace_attr<F>(mut self, f: F) -> Self
    where
        F: Fn(&[String], Attr) -> Option<Attr> + Send + Sync + 'static,
    {
        self.replace_attr = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for HandlerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerOptions")
            .field("level", &format_args!("{}", self.level.level()))
            .field("add_source", &self.add_source)
            .field("replace_attr", &self.replace_attr.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Wrap `next` so that the positional keys (`time`, `level`, `msg`) are
/// dropped before it ever sees them.
///
/// Applies at every group depth, so caller attributes that reuse those
/// names are dropped as well.
pub fn suppress_defaults(next: Option<ReplaceAttr>) -> ReplaceAttr {
    Arc::new(move |groups: &[String], attr: Attr| {
        if attr.key == TIME_KEY || attr.key == LEVEL_KEY || attr.key == MESSAGE_KEY {
            return None;
        }
        match &next {
            Some(next) => next(groups, attr),
            None => Some(attr),
        }
    })
}
