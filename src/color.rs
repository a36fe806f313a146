//! ANSI palette used for console rendering.

use crate::level::Level;

pub const RESET: &str = "\x1b[0m";

pub const CYAN: u8 = 36;
pub const LIGHT_GRAY: u8 = 37;
pub const DARK_GRAY: u8 = 90;
pub const LIGHT_RED: u8 = 91;
pub const LIGHT_YELLOW: u8 = 93;
pub const WHITE: u8 = 97;

/// Color for the timestamp segment.
pub const TIME: u8 = LIGHT_GRAY;
/// Color for the message segment.
pub const MESSAGE: u8 = WHITE;
/// Color for the attribute block.
pub const ATTRS: u8 = DARK_GRAY;

/// Color of the level tag, `None` for custom levels which are printed plain.
pub fn level_color(level: Level) -> Option<u8> {
    match level {
        Level::DEBUG => Some(DARK_GRAY),
        Level::INFO => Some(CYAN),
        Level::WARN => Some(LIGHT_YELLOW),
        Level::ERROR => Some(LIGHT_RED),
        _ => None,
    }
}

/// Wrap `text` in the escape sequence for `code` followed by a reset.
pub fn colorize(code: u8, text: &str) -> String {
    format!("\x1b[{}m{}{}", code, text, RESET)
}
