use crate::encoder::HandlerOptions;
use crate::env::{
    parse_flag, PRETTY_LOG_ATTRS_ENV, PRETTY_LOG_GROUP_SPANS_ENV, PRETTY_LOG_LEVEL_ENV,
    PRETTY_LOG_SOURCE_ENV,
};
use crate::handler::PrettyHandler;
use crate::layer::PrettyLayer;
use crate::level::Level;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the console layer.
///
/// **Fields**
/// - `options`: level, call-site capture and attribute rewriting, passed
///   to the [`PrettyHandler`].
/// - `group_spans`: nest span fields under the span's name.
/// - `attr_block`: print the attribute block after the message.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub options: HandlerOptions,
    pub group_spans: bool,
    pub attr_block: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            options: HandlerOptions::default(),
            group_spans: false,
            attr_block: true,
        }
    }
}

impl LayerConfig {
    /// Build a config from `PRETTY_LOG_*` variables, see [`crate::env`].
    ///
    /// An unparsable level is reported on stderr and replaced by `INFO`.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let level = match var(PRETTY_LOG_LEVEL_ENV) {
            Some(raw) => raw.parse::<Level>().unwrap_or_else(|e| {
                eprintln!("{}: {}, using INFO", PRETTY_LOG_LEVEL_ENV, e);
                Level::INFO
            }),
            None => Level::INFO,
        };
        let flag = |key: &str, default: bool| {
            var(key)
                .and_then(|value| parse_flag(&value))
                .unwrap_or(default)
        };

        Self {
            options: HandlerOptions::default()
                .level(level)
                .add_source(flag(PRETTY_LOG_SOURCE_ENV, false)),
            group_spans: flag(PRETTY_LOG_GROUP_SPANS_ENV, false),
            attr_block: flag(PRETTY_LOG_ATTRS_ENV, true),
        }
    }

    /// The stdout layer described by this config.
    pub fn layer(self) -> PrettyLayer {
        let handler = PrettyHandler::new(self.options).attr_block(self.attr_block);
        PrettyLayer::new(handler).group_spans(self.group_spans)
    }
}

/// Install a [`Registry`] with a [`PrettyLayer`] built from `config` as
/// the global default subscriber.
///
/// **Returns**
/// - `Err(..)` if a global subscriber was already installed.
pub fn init_tracing_with_config(config: LayerConfig) -> Result<(), SetGlobalDefaultError> {
    let subscriber = Registry::default().with(config.layer());
    tracing::subscriber::set_global_default(subscriber)
}

/// Initialize tracing with the configuration found in the environment.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::from_env`].
pub fn init_tracing() -> Result<(), SetGlobalDefaultError> {
    init_tracing_with_config(LayerConfig::from_env())
}
