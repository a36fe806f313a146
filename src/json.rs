use crate::encoder::{Encoder, HandlerOptions, ReplaceAttr, LEVEL_KEY, MESSAGE_KEY, TIME_KEY};
use crate::level::{Level, Leveler};
use crate::record::{Attr, Record, Value};
use chrono::SecondsFormat;
use serde_json::{Map, Number};
use std::error::Error;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

/// Error produced while serializing a record to JSON.
#[derive(thiserror::Error, Debug)]
pub enum JsonEncodeError {
    #[error("unsupported float value for key {key:?}: {value}")]
    UnsupportedFloat { key: String, value: f64 },

    #[error("write failed: {0}")]
    Io(#[from] io::Error),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
enum Segment {
    Attrs(Vec<Attr>),
    Group(String),
}

/// Encoder that writes every record as one JSON object per line.
///
/// Built-in keys come first (`time`, `level`, `msg`, and `source` when
/// enabled), followed by attributes attached through
/// [`Encoder::with_attrs`] and finally the record's own attributes, all
/// nested under any groups opened with [`Encoder::with_group`]. Later
/// keys replace earlier ones with the same name.
#[derive(Clone)]
pub struct JsonEncoder {
    level: Arc<dyn Leveler>,
    add_source: bool,
    replace_attr: Option<ReplaceAttr>,
    segments: Vec<Segment>,
}

impl JsonEncoder {
    pub fn new(options: HandlerOptions) -> Self {
        JsonEncoder {
            level: options.level,
            add_source: options.add_source,
            replace_attr: options.replace_attr,
            segments: Vec::new(),
        }
    }

    fn encode(&self, record: &Record, out: &mut dyn Write) -> Result<(), JsonEncodeError> {
        let mut root = Map::new();
        let mut groups = Vec::new();

        self.add_attr(&mut root, &mut groups, Attr::new(TIME_KEY, record.time))?;
        self.add_attr(&mut root, &mut groups, Attr::new(LEVEL_KEY, record.level.to_string()))?;
        self.add_attr(&mut root, &mut groups, Attr::new(MESSAGE_KEY, record.message.as_str()))?;

        if self.add_source {
            if let Some(source) = &record.source {
                // The rewriter sees the call site as one attribute, not its members.
                if let Some(attr) = self.rewrite(&groups, source.to_attr()) {
                    let value = to_json(&attr.key, attr.value)?;
                    root.insert(attr.key, value);
                }
            }
        }

        self.fill(&mut root, &mut groups, &self.segments, &record.attrs)?;

        serde_json::to_writer(&mut *out, &root)?;
        out.write_all(b"\n")?;
        Ok(())
    }

    fn fill(
        &self,
        map: &mut Map<String, serde_json::Value>,
        groups: &mut Vec<String>,
        segments: &[Segment],
        record_attrs: &[Attr],
    ) -> Result<(), JsonEncodeError> {
        for (idx, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Attrs(attrs) => {
                    for attr in attrs {
                        self.add_attr(map, groups, attr.clone())?;
                    }
                }
                Segment::Group(name) if is_reserved(groups, name) => {}
                Segment::Group(name) => {
                    groups.push(name.clone());
                    let mut nested = Map::new();
                    self.fill(&mut nested, groups, &segments[idx + 1..], record_attrs)?;
                    groups.pop();
                    if !nested.is_empty() {
                        map.insert(name.clone(), serde_json::Value::Object(nested));
                    }
                    return Ok(());
                }
            }
        }

        for attr in record_attrs {
            self.add_attr(map, groups, attr.clone())?;
        }
        Ok(())
    }

    fn add_attr(
        &self,
        map: &mut Map<String, serde_json::Value>,
        groups: &mut Vec<String>,
        attr: Attr,
    ) -> Result<(), JsonEncodeError> {
        match attr.value {
            Value::Group(members) => {
                if attr.key.is_empty() || is_reserved(groups, &attr.key) {
                    for member in members {
                        self.add_attr(map, groups, member)?;
                    }
                    return Ok(());
                }

                groups.push(attr.key.clone());
                let mut nested = Map::new();
                for member in members {
                    self.add_attr(&mut nested, groups, member)?;
                }
                groups.pop();

                if !nested.is_empty() {
                    map.insert(attr.key, serde_json::Value::Object(nested));
                }
            }
            value => {
                if let Some(attr) = self.rewrite(groups, Attr { key: attr.key, value }) {
                    let value = to_json(&attr.key, attr.value)?;
                    map.insert(attr.key, value);
                }
            }
        }
        Ok(())
    }

    fn rewrite(&self, groups: &[String], attr: Attr) -> Option<Attr> {
        match &self.replace_attr {
            Some(replace) => replace(groups, attr),
            None => Some(attr),
        }
    }
}

/// Top-level group names that would collide with a built-in key. Their
/// members are inlined into the parent instead.
fn is_reserved(groups: &[String], key: &str) -> bool {
    groups.is_empty() && (key == TIME_KEY || key == LEVEL_KEY || key == MESSAGE_KEY)
}

fn to_json(key: &str, value: Value) -> Result<serde_json::Value, JsonEncodeError> {
    let json = match value {
        Value::String(s) => serde_json::Value::String(s),
        Value::Int(i) => serde_json::Value::from(i),
        Value::Uint(u) => serde_json::Value::from(u),
        Value::Float(f) => match Number::from_f64(f) {
            Some(n) => serde_json::Value::Number(n),
            None => {
                return Err(JsonEncodeError::UnsupportedFloat {
                    key: key.to_string(),
                    value: f,
                })
            }
        },
        Value::Bool(b) => serde_json::Value::Bool(b),
        Value::Time(t) => serde_json::Value::String(t.to_rfc3339_opts(SecondsFormat::Millis, true)),
        Value::Duration(d) => {
            serde_json::Value::from(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        }
        Value::Group(members) => {
            // Groups returned by a rewriter are rendered as-is.
            let mut nested = Map::new();
            for member in members {
                let value = to_json(&member.key, member.value)?;
                nested.insert(member.key, value);
            }
            serde_json::Value::Object(nested)
        }
        Value::Null => serde_json::Value::Null,
    };
    Ok(json)
}

impl Encoder for JsonEncoder {
    fn enabled(&self, level: Level) -> bool {
        level >= self.level.level()
    }

    fn handle(
        &self,
        record: &Record,
        out: &mut dyn Write,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(self.encode(record, out)?)
    }

    fn with_attrs(&self, attrs: Vec<Attr>) -> Self {
        let mut next = self.clone();
        if !attrs.is_empty() {
            next.segments.push(Segment::Attrs(attrs));
        }
        next
    }

    fn with_group(&self, name: &str) -> Self {
        let mut next = self.clone();
        if !name.is_empty() {
            next.segments.push(Segment::Group(name.to_string()));
        }
        next
    }
}

impl fmt::Debug for JsonEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonEncoder")
            .field("level", &format_args!("{}", self.level.level()))
            .field("add_source", &self.add_source)
            .field("segments", &self.segments)
            .finish()
    }
}
