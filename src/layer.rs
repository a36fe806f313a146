use crate::encoder::Encoder;
use crate::handler::PrettyHandler;
use crate::json::JsonEncoder;
use crate::level::Level;
use crate::record::{Attr, Record, Source, Value};
use chrono::Local;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record as SpanValues};
use tracing::subscriber::Interest;
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that prints events through a
/// [`PrettyHandler`].
///
/// Every span carries its own handler, derived from its parent's (or the
/// root handler) with the span's fields attached, so events inside a span
/// show the span's fields in their attribute block. With `group_spans`
/// set, each span additionally opens a group named after the span.
///
/// Filtering is left entirely to the handler: events whose level the
/// handler does not enable are rejected in [`Layer::enabled`].
pub struct PrettyLayer<E = JsonEncoder, W = crate::handler::Stdout> {
    root: PrettyHandler<E, W>,
    group_spans: bool,
}

impl<E, W> PrettyLayer<E, W>
where
    E: Encoder + Clone + 'static,
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    pub fn new(root: PrettyHandler<E, W>) -> Self {
        PrettyLayer {
            root,
            group_spans: false,
        }
    }

    /// Nest the fields of each span under a group named after the span.
    pub fn group_spans(mut self, enabled: bool) -> Self {
        self.group_spans = enabled;
        self
    }

    fn handler_for<S>(&self, id: Option<&Id>, ctx: &Context<'_, S>) -> PrettyHandler<E, W>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        if let Some(span) = id.and_then(|id| ctx.span(id)) {
            if let Some(handler) = span.extensions().get::<PrettyHandler<E, W>>() {
                return handler.clone();
            }
        }
        self.root.clone()
    }
}

impl<S, E, W> Layer<S> for PrettyLayer<E, W>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    E: Encoder + Clone + 'static,
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    fn register_callsite(&self, metadata: &'static Metadata<'static>) -> Interest {
        // Event levels are checked on every call so a `LevelVar` can change.
        if metadata.is_span() {
            Interest::always()
        } else {
            Interest::sometimes()
        }
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        // Spans are always kept so their fields reach nested events.
        metadata.is_span() || self.root.enabled(Level::from(*metadata.level()))
    }

    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut fields = Vec::new();
        let mut message = None;
        attrs.record(&mut FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        });
        if let Some(message) = message {
            fields.push(Attr::new("message", message));
        }

        let parent = span.parent().map(|parent| parent.id());
        let mut handler = self.handler_for(parent.as_ref(), &ctx);
        if self.group_spans {
            handler = handler.with_group(span.name());
        }
        let handler = handler.with_attrs(fields);

        span.extensions_mut().insert(handler);
    }

    fn on_record(&self, id: &Id, values: &SpanValues<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut fields = Vec::new();
        let mut message = None;
        values.record(&mut FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        });
        if let Some(message) = message {
            fields.push(Attr::new("message", message));
        }
        if fields.is_empty() {
            return;
        }

        let mut extensions = span.extensions_mut();
        let handler = match extensions.remove::<PrettyHandler<E, W>>() {
            Some(current) => current.with_attrs(fields),
            None => self.root.with_attrs(fields),
        };
        extensions.insert(handler);
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();

        let mut attrs = Vec::new();
        let mut message = None;
        event.record(&mut FieldVisitor {
            fields: &mut attrs,
            message: &mut message,
        });

        let span = ctx.event_span(event).map(|span| span.id());
        let handler = self.handler_for(span.as_ref(), &ctx);

        let record = Record {
            time: Local::now().into(),
            level: Level::from(*meta.level()),
            message: message.unwrap_or_default(),
            attrs,
            source: Some(Source {
                function: meta.module_path().map(|s| s.to_string()),
                file: meta.file().map(|s| s.to_string()),
                line: meta.line(),
            }),
        };

        // Emitting through tracing here would re-enter this layer.
        if let Err(e) = handler.handle(&record) {
            eprintln!("error rendering log record: {}", e);
        }
    }
}

/// Collects `tracing` fields as [`Attr`]s, pulling the `message` field out
/// separately.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut Vec<Attr>,
    pub message: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn push(&mut self, field: &Field, value: Value) {
        self.fields.push(Attr {
            key: field.name().to_string(),
            value,
        });
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.push(field, Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.push(field, Value::String(format!("{:?}", value)));
        }
    }
}
