#![allow(dead_code)]

use chrono::{DateTime, FixedOffset};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// In-memory writer shared between the handler and the test.
#[derive(Clone, Default)]
pub struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Capture {
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).to_string()
    }

    /// Captured output with ANSI color sequences removed.
    pub fn plain(&self) -> String {
        strip_ansi(&self.output())
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "Mutex poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for c in chars.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// One rendered record: level tag, message and decoded attribute block.
#[derive(Debug)]
pub struct Entry {
    pub level: String,
    pub message: String,
    pub attrs: serde_json::Value,
}

/// Split plain output into entries. Messages must not contain spaces.
pub fn entries(plain: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut current = String::new();
    for line in plain.lines() {
        if line.starts_with('[') && !current.is_empty() {
            entries.push(parse_entry(&current));
            current.clear();
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.is_empty() {
        entries.push(parse_entry(&current));
    }
    entries
}

fn parse_entry(text: &str) -> Entry {
    let (_time, rest) = text.split_once("] ").expect("timestamp");
    let (level, rest) = rest.split_once(": ").expect("level");
    let (message, block) = rest.split_once(' ').expect("message");
    Entry {
        level: level.to_string(),
        message: message.to_string(),
        attrs: serde_json::from_str(block.trim()).expect("attribute block"),
    }
}

pub fn at() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-01-01T15:04:05.123Z").unwrap()
}
