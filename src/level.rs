use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI8, Ordering};
use std::sync::Arc;

/// Severity of a [`Record`](crate::record::Record).
///
/// Levels are plain integers so that custom severities can sit between
/// (or beyond) the four named ones. Larger means more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(i8);

impl Level {
    pub const DEBUG: Level = Level(-4);
    pub const INFO: Level = Level(0);
    pub const WARN: Level = Level(4);
    pub const ERROR: Level = Level(8);

    pub const fn new(value: i8) -> Self {
        Level(value)
    }

    pub const fn value(self) -> i8 {
        self.0
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::INFO
    }
}

impl fmt::Display for Level {
    /// Renders the nearest lower named level plus an offset, e.g.
    /// `INFO`, `WARN+2`, `DEBUG-4`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (base, name) = if *self < Level::INFO {
            (Level::DEBUG, "DEBUG")
        } else if *self < Level::WARN {
            (Level::INFO, "INFO")
        } else if *self < Level::ERROR {
            (Level::WARN, "WARN")
        } else {
            (Level::ERROR, "ERROR")
        };

        let offset = i16::from(self.0) - i16::from(base.0);
        if offset == 0 {
            f.write_str(name)
        } else {
            write!(f, "{}{:+}", name, offset)
        }
    }
}

/// Error returned when a level string cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseLevelError {
    #[error("unknown level name: {0:?}")]
    UnknownName(String),

    #[error("invalid level offset in {0:?}")]
    InvalidOffset(String),
}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Accepts a case-insensitive level name with an optional signed
    /// offset: `"warn"`, `"INFO+1"`, `"debug-4"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (name, offset) = match trimmed.find(['+', '-']) {
            Some(idx) => {
                let offset: i8 = trimmed[idx..]
                    .parse()
                    .map_err(|_| ParseLevelError::InvalidOffset(s.to_string()))?;
                (&trimmed[..idx], offset)
            }
            None => (trimmed, 0),
        };

        let base = match name.to_ascii_uppercase().as_str() {
            "DEBUG" => Level::DEBUG,
            "INFO" => Level::INFO,
            "WARN" => Level::WARN,
            "ERROR" => Level::ERROR,
            _ => return Err(ParseLevelError::UnknownName(s.to_string())),
        };

        base.0
            .checked_add(offset)
            .map(Level)
            .ok_or_else(|| ParseLevelError::InvalidOffset(s.to_string()))
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level(Level::DEBUG.0 - 4),
            tracing::Level::DEBUG => Level::DEBUG,
            tracing::Level::INFO => Level::INFO,
            tracing::Level::WARN => Level::WARN,
            tracing::Level::ERROR => Level::ERROR,
        }
    }
}

/// Source of the minimum level an encoder lets through.
pub trait Leveler: Send + Sync {
    fn level(&self) -> Level;
}

impl Leveler for Level {
    fn level(&self) -> Level {
        *self
    }
}

/// A minimum level that can be changed at runtime.
///
/// Clones share the same underlying value, so a handle kept by the
/// application can raise or lower verbosity of an already installed
/// handler.
#[derive(Debug, Clone, Default)]
pub struct LevelVar {
    inner: Arc<AtomicI8>,
}

impl LevelVar {
    pub fn new(level: Level) -> Self {
        LevelVar {
            inner: Arc::new(AtomicI8::new(level.0)),
        }
    }

    pub fn set(&self, level: Level) {
        self.inner.store(level.0, Ordering::Relaxed);
    }
}

impl Leveler for LevelVar {
    fn level(&self) -> Level {
        Level(self.inner.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_levels_are_ordered() {
        assert!(Level::DEBUG < Level::INFO);
        assert!(Level::INFO < Level::WARN);
        assert!(Level::WARN < Level::ERROR);
    }

    #[test]
    fn display_uses_offsets_for_custom_levels() {
        assert_eq!(Level::INFO.to_string(), "INFO");
        assert_eq!(Level::ERROR.to_string(), "ERROR");
        assert_eq!(Level::new(6).to_string(), "WARN+2");
        assert_eq!(Level::new(-8).to_string(), "DEBUG-4");
        assert_eq!(Level::new(12).to_string(), "ERROR+4");
    }

    #[test]
    fn parses_names_and_offsets() {
        assert_eq!("warn".parse::<Level>(), Ok(Level::WARN));
        assert_eq!(" INFO+1 ".parse::<Level>(), Ok(Level::new(1)));
        assert_eq!("debug-4".parse::<Level>(), Ok(Level::new(-8)));
        assert!(matches!(
            "verbose".parse::<Level>(),
            Err(ParseLevelError::UnknownName(_))
        ));
        assert!(matches!(
            "info+x".parse::<Level>(),
            Err(ParseLevelError::InvalidOffset(_))
        ));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for value in [-9, -4, 0, 3, 4, 8, 11] {
            let level = Level::new(value);
            assert_eq!(level.to_string().parse::<Level>(), Ok(level));
        }
    }

    #[test]
    fn trace_maps_below_debug() {
        let trace = Level::from(tracing::Level::TRACE);
        assert!(trace < Level::DEBUG);
        assert_eq!(trace.to_string(), "DEBUG-4");
        assert_eq!(Level::from(tracing::Level::WARN), Level::WARN);
    }

    #[test]
    fn level_var_clones_share_state() {
        let var = LevelVar::new(Level::WARN);
        let handle = var.clone();
        handle.set(Level::DEBUG);
        assert_eq!(var.level(), Level::DEBUG);
    }
}
