use crate::color::{self, colorize};
use crate::encoder::{suppress_defaults, Encoder, HandlerOptions};
use crate::error::HandlerError;
use crate::json::JsonEncoder;
use crate::level::Level;
use crate::record::{Attr, Record};
use serde_json::{Map, Value};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing_subscriber::fmt::MakeWriter;

const TIME_FORMAT: &str = "[%H:%M:%S%.3f]";
const HANDLE_OP: &str = "PrettyHandler::handle";

/// Writer factory used when no other output is configured.
pub type Stdout = fn() -> io::Stdout;

/// Renders structured records as colorized, human-readable console lines.
///
/// The handler wraps an [`Encoder`] (JSON by default), lets it serialize
/// each record into a private scratch buffer, decodes that buffer back
/// into a key/value mapping and prints:
///
/// ```text
/// [15:04:05.123] INFO: started {
///   "port": 8080
/// }
/// ```
///
/// Handlers derived with [`with_attrs`](Self::with_attrs) or
/// [`with_group`](Self::with_group) share the scratch buffer, its lock and
/// the output writer with the handler they were derived from.
pub struct PrettyHandler<E = JsonEncoder, W = Stdout> {
    encoder: E,
    scratch: Arc<Mutex<Vec<u8>>>,
    writer: Arc<W>,
    attr_block: bool,
}

impl PrettyHandler {
    /// Build a handler around a [`JsonEncoder`] that writes to stdout.
    ///
    /// The encoder drops the `time`, `level` and `msg` keys before the
    /// caller's `replace_attr` runs, since those are printed positionally.
    pub fn new(options: HandlerOptions) -> Self {
        let options = HandlerOptions {
            replace_attr: Some(suppress_defaults(options.replace_attr)),
            ..options
        };
        PrettyHandler::with_encoder(JsonEncoder::new(options))
    }
}

impl Default for PrettyHandler {
    fn default() -> Self {
        PrettyHandler::new(HandlerOptions::default())
    }
}

impl<E: Encoder> PrettyHandler<E> {
    /// Build a handler around an arbitrary encoder that writes to stdout.
    ///
    /// The encoder is expected to emit one JSON object per record and to
    /// leave out the positional keys itself (see
    /// [`suppress_defaults`](crate::encoder::suppress_defaults)).
    pub fn with_encoder(encoder: E) -> Self {
        PrettyHandler {
            encoder,
            scratch: Arc::new(Mutex::new(Vec::new())),
            writer: Arc::new(io::stdout as Stdout),
            attr_block: true,
        }
    }
}

impl<E, W> PrettyHandler<E, W>
where
    E: Encoder,
    W: for<'a> MakeWriter<'a>,
{
    /// Send rendered lines to `writer` instead of stdout.
    pub fn with_writer<W2>(self, writer: W2) -> PrettyHandler<E, W2>
    where
        W2: for<'a> MakeWriter<'a>,
    {
        PrettyHandler {
            encoder: self.encoder,
            scratch: self.scratch,
            writer: Arc::new(writer),
            attr_block: self.attr_block,
        }
    }

    /// Toggle the attribute block. When disabled, records are printed as
    /// timestamp, level and message only and the encoder is never called.
    pub fn attr_block(mut self, enabled: bool) -> Self {
        self.attr_block = enabled;
        self
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.encoder.enabled(level)
    }

    pub fn with_attrs(&self, attrs: Vec<Attr>) -> Self {
        self.derive(self.encoder.with_attrs(attrs))
    }

    pub fn with_group(&self, name: &str) -> Self {
        self.derive(self.encoder.with_group(name))
    }

    fn derive(&self, encoder: E) -> Self {
        PrettyHandler {
            encoder,
            scratch: Arc::clone(&self.scratch),
            writer: Arc::clone(&self.writer),
            attr_block: self.attr_block,
        }
    }

    /// Render `record` and write it as one line.
    ///
    /// **Returns**
    /// - `Ok(())` once the line has been handed to the writer. Write
    ///   errors are not reported, the same as for console printing.
    /// - `Err(HandlerError::Encode)` if the encoder failed; nothing is
    ///   printed.
    /// - `Err(HandlerError::Decode)` if the encoder output could not be
    ///   parsed back into attributes; nothing is printed.
    pub fn handle(&self, record: &Record) -> Result<(), HandlerError> {
        let attrs = if self.attr_block {
            Some(self.extract_attrs(record)?)
        } else {
            None
        };

        let line = render(record, attrs.as_ref())?;
        let mut writer = self.writer.make_writer();
        let _ = writer.write_all(line.as_bytes());
        Ok(())
    }

    /// Encode into the shared scratch buffer and decode it again while
    /// holding the lock. The buffer is empty again before the lock is
    /// released, on every path.
    fn extract_attrs(&self, record: &Record) -> Result<Map<String, Value>, HandlerError> {
        let mut scratch = Scratch::lock(&self.scratch);

        self.encoder
            .handle(record, &mut *scratch.buf)
            .map_err(|source| HandlerError::Encode {
                op: HANDLE_OP,
                source,
            })?;

        let attrs = serde_json::from_slice(&scratch.buf).map_err(|source| HandlerError::Decode {
            op: HANDLE_OP,
            source,
        })?;
        Ok(attrs)
    }

    #[cfg(test)]
    fn scratch_len(&self) -> usize {
        Scratch::lock(&self.scratch).buf.len()
    }
}

impl<E: Clone, W> Clone for PrettyHandler<E, W> {
    fn clone(&self) -> Self {
        PrettyHandler {
            encoder: self.encoder.clone(),
            scratch: Arc::clone(&self.scratch),
            writer: Arc::clone(&self.writer),
            attr_block: self.attr_block,
        }
    }
}

impl<E: fmt::Debug, W> fmt::Debug for PrettyHandler<E, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrettyHandler")
            .field("encoder", &self.encoder)
            .field("attr_block", &self.attr_block)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to the scratch buffer that clears it on drop.
struct Scratch<'a> {
    buf: MutexGuard<'a, Vec<u8>>,
}

impl<'a> Scratch<'a> {
    fn lock(shared: &'a Mutex<Vec<u8>>) -> Self {
        // Cleared on drop, including during unwinding, so a poisoned
        // buffer is still empty.
        Scratch {
            buf: shared.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        self.buf.clear();
    }
}

fn render(record: &Record, attrs: Option<&Map<String, Value>>) -> Result<String, HandlerError> {
    let level = format!("{}:", record.level);
    let level = match color::level_color(record.level) {
        Some(code) => colorize(code, &level),
        None => level,
    };

    let mut line = format!(
        "{} {} {}",
        colorize(color::TIME, &record.time.format(TIME_FORMAT).to_string()),
        level,
        colorize(color::MESSAGE, &record.message),
    );

    if let Some(attrs) = attrs {
        let block = serde_json::to_string_pretty(attrs).map_err(|source| HandlerError::Decode {
            op: HANDLE_OP,
            source,
        })?;
        line.push(' ');
        line.push_str(&colorize(color::ATTRS, &block));
    }

    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset};
    use std::error::Error;
    use std::panic::{self, AssertUnwindSafe};

    #[derive(Clone, Default)]
    struct Capture {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl Capture {
        fn output(&self) -> String {
            String::from_utf8_lossy(&self.buffer.lock().unwrap()).to_string()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
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

    #[derive(Clone, Copy)]
    enum Then {
        Succeed,
        Fail,
        Panic,
    }

    /// Writes a fixed payload, then succeeds, fails or panics.
    #[derive(Clone)]
    struct Scripted {
        payload: &'static [u8],
        then: Then,
    }

    impl Encoder for Scripted {
        fn enabled(&self, _level: Level) -> bool {
            true
        }

        fn handle(
            &self,
            _record: &Record,
            out: &mut dyn Write,
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            out.write_all(self.payload)?;
            match self.then {
                Then::Succeed => Ok(()),
                Then::Fail => Err("scripted failure".into()),
                Then::Panic => panic!("encoder panicked mid-record"),
            }
        }

        fn with_attrs(&self, _attrs: Vec<Attr>) -> Self {
            self.clone()
        }

        fn with_group(&self, _name: &str) -> Self {
            self.clone()
        }
    }

    fn at() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-01-01T15:04:05.123Z").unwrap()
    }

    fn capturing(options: HandlerOptions) -> (PrettyHandler<JsonEncoder, Capture>, Capture) {
        let capture = Capture::default();
        let handler = PrettyHandler::new(options).with_writer(capture.clone());
        (handler, capture)
    }

    #[test]
    fn renders_the_documented_line() {
        let (handler, capture) = capturing(HandlerOptions::default());
        let record = Record::new(at(), Level::INFO, "started").add_attrs([Attr::new("port", 8080)]);

        handler.handle(&record).unwrap();

        assert_eq!(
            capture.output(),
            "\x1b[37m[15:04:05.123]\x1b[0m \x1b[36mINFO:\x1b[0m \x1b[97mstarted\x1b[0m \
             \x1b[90m{\n  \"port\": 8080\n}\x1b[0m\n"
        );
    }

    #[test]
    fn without_attr_block_prints_positional_fields_only() {
        let (handler, capture) = capturing(HandlerOptions::default().level(Level::DEBUG));
        let handler = handler.attr_block(false);

        handler.handle(&Record::new(at(), Level::DEBUG, "probe")).unwrap();

        assert_eq!(
            capture.output(),
            "\x1b[37m[15:04:05.123]\x1b[0m \x1b[90mDEBUG:\x1b[0m \x1b[97mprobe\x1b[0m\n"
        );
    }

    #[test]
    fn no_attributes_render_an_empty_block() {
        let (handler, capture) = capturing(HandlerOptions::default());
        handler.handle(&Record::new(at(), Level::WARN, "careful")).unwrap();
        assert!(capture.output().ends_with("\x1b[90m{}\x1b[0m\n"));
        assert!(capture.output().contains("\x1b[93mWARN:\x1b[0m"));
    }

    #[test]
    fn custom_levels_are_not_colored() {
        let (handler, capture) = capturing(HandlerOptions::default());
        handler.handle(&Record::new(at(), Level::new(10), "odd")).unwrap();
        assert!(capture.output().contains("\x1b[0m ERROR+2: \x1b[97m"));
    }

    #[test]
    fn uses_the_record_offset_for_the_timestamp() {
        let (handler, capture) = capturing(HandlerOptions::default());
        let time = DateTime::parse_from_rfc3339("2024-01-01T15:04:05.007+02:00").unwrap();
        handler.handle(&Record::new(time, Level::ERROR, "x")).unwrap();
        assert!(capture.output().starts_with("\x1b[37m[15:04:05.007]\x1b[0m \x1b[91mERROR:"));
    }

    #[test]
    fn positional_keys_never_reach_the_block() {
        let (handler, capture) = capturing(HandlerOptions::default());
        let record = Record::new(at(), Level::INFO, "m").add_attrs([
            Attr::new("time", "spoofed"),
            Attr::new("level", "spoofed"),
            Attr::new("msg", "spoofed"),
            Attr::group("nested", [Attr::new("msg", "spoofed"), Attr::new("ok", true)]),
        ]);

        handler.handle(&record).unwrap();

        let output = capture.output();
        assert!(!output.contains("spoofed"));
        assert!(output.contains("\"ok\": true"));
    }

    #[test]
    fn scratch_is_empty_after_every_call() {
        let (handler, capture) = capturing(HandlerOptions::default());
        for i in 0..5 {
            let record = Record::new(at(), Level::INFO, "tick").add_attrs([Attr::new(format!("k{}", i), i)]);
            handler.handle(&record).unwrap();
            assert_eq!(handler.scratch_len(), 0);
        }

        let output = capture.output();
        let last = output.rsplit("tick").next().unwrap();
        assert!(last.contains("\"k4\": 4"));
        assert!(!last.contains("\"k3\""));
    }

    #[test]
    fn encode_failure_is_reported_and_leaves_scratch_empty() {
        let capture = Capture::default();
        let handler = PrettyHandler::with_encoder(Scripted {
            payload: b"{\"partial\":",
            then: Then::Fail,
        })
        .with_writer(capture.clone());

        let err = handler.handle(&Record::new(at(), Level::INFO, "m")).unwrap_err();

        assert!(matches!(err, HandlerError::Encode { op: "PrettyHandler::handle", .. }));
        assert!(err.to_string().contains("scripted failure"));
        assert_eq!(handler.scratch_len(), 0);
        assert!(capture.output().is_empty());
    }

    #[test]
    fn decode_failure_is_reported_and_leaves_scratch_empty() {
        let capture = Capture::default();
        let handler = PrettyHandler::with_encoder(Scripted {
            payload: b"not json",
            then: Then::Succeed,
        })
        .with_writer(capture.clone());

        let err = handler.handle(&Record::new(at(), Level::INFO, "m")).unwrap_err();

        assert!(matches!(err, HandlerError::Decode { .. }));
        assert_eq!(handler.scratch_len(), 0);
        assert!(capture.output().is_empty());
    }

    #[test]
    fn panicking_encoder_leaves_scratch_empty() {
        let capture = Capture::default();
        let handler = PrettyHandler::with_encoder(Scripted {
            payload: b"{\"leak\":1}",
            then: Then::Panic,
        })
        .with_writer(capture.clone());

        let record = Record::new(at(), Level::INFO, "m");
        let result = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&record)));

        assert!(result.is_err());
        assert!(handler.scratch.is_poisoned());
        assert_eq!(handler.scratch_len(), 0);
        assert!(capture.output().is_empty());
    }

    #[test]
    fn panicking_rewriter_does_not_leak_into_the_next_call() {
        let options = HandlerOptions::default().replace_attr(|_, attr| {
            if attr.key == "boom" {
                panic!("rewriter panicked");
            }
            Some(attr)
        });
        let (handler, capture) = capturing(options);
        let bad = Record::new(at(), Level::INFO, "bad")
            .add_attrs([Attr::new("leak", 1), Attr::new("boom", 1)]);

        let result = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&bad)));
        assert!(result.is_err());
        assert!(handler.scratch.is_poisoned());
        assert_eq!(handler.scratch_len(), 0);

        handler.handle(&Record::new(at(), Level::INFO, "good")).unwrap();

        assert_eq!(
            capture.output(),
            "\x1b[37m[15:04:05.123]\x1b[0m \x1b[36mINFO:\x1b[0m \x1b[97mgood\x1b[0m \x1b[90m{}\x1b[0m\n"
        );
    }

    #[test]
    fn failures_do_not_leak_into_the_next_call() {
        let (handler, capture) = capturing(HandlerOptions::default());
        let bad = Record::new(at(), Level::INFO, "bad")
            .add_attrs([Attr::new("leaked", "yes"), Attr::new("ratio", f64::INFINITY)]);
        assert!(matches!(handler.handle(&bad), Err(HandlerError::Encode { .. })));

        handler.handle(&Record::new(at(), Level::INFO, "good")).unwrap();

        let output = capture.output();
        assert!(output.contains("good"));
        assert!(!output.contains("leaked"));
    }

    #[test]
    fn derived_handlers_share_scratch_and_writer() {
        let (root, _capture) = capturing(HandlerOptions::default());
        let child = root.with_attrs(vec![Attr::new("a", 1)]).with_group("g");
        assert!(Arc::ptr_eq(&root.scratch, &child.scratch));
        assert!(Arc::ptr_eq(&root.writer, &child.writer));
    }

    #[test]
    fn enabled_delegates_to_the_encoder() {
        let (handler, _capture) = capturing(HandlerOptions::default().level(Level::WARN));
        assert!(!handler.enabled(Level::INFO));
        assert!(handler.enabled(Level::WARN));
        assert!(handler.with_group("g").enabled(Level::ERROR));
    }

    #[test]
    fn caller_rewriter_runs_after_suppression() {
        let options = HandlerOptions::default().replace_attr(|_, attr| {
            assert_ne!(attr.key, "msg");
            if attr.key == "token" {
                Some(Attr::new("token", "***"))
            } else {
                Some(attr)
            }
        });
        let (handler, capture) = capturing(options);
        let record = Record::new(at(), Level::INFO, "login").add_attrs([Attr::new("token", "abc")]);

        handler.handle(&record).unwrap();

        assert!(capture.output().contains("\"token\": \"***\""));
    }
}
