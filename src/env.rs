//! Environment variable names used by [`LayerConfig::from_env`].
//!
//! These are purely helpers; handlers and layers never read the
//! environment on their own.
//!
//! [`LayerConfig::from_env`]: crate::init::LayerConfig::from_env

/// Minimum level, e.g. `debug`, `info`, `warn+2`.
pub const PRETTY_LOG_LEVEL_ENV: &str = "PRETTY_LOG_LEVEL";

/// Emit the call site of each event under `source`.
pub const PRETTY_LOG_SOURCE_ENV: &str = "PRETTY_LOG_SOURCE";

/// Nest span fields under a group named after the span.
pub const PRETTY_LOG_GROUP_SPANS_ENV: &str = "PRETTY_LOG_GROUP_SPANS";

/// Print the attribute block (on by default).
pub const PRETTY_LOG_ATTRS_ENV: &str = "PRETTY_LOG_ATTRS";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a boolean flag. `1`, `true`, `yes` and `on` count as set,
/// `0`, `false`, `no` and `off` as unset; anything else (or an unset
/// variable) yields `default`.
pub fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => parse_flag(&value).unwrap_or(default),
        Err(_) => default,
    }
}

/// `1`, `true`, `yes`, `on` and `0`, `false`, `no`, `off`, case-insensitive.
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
