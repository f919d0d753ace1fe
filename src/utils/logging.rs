use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log output format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text with timestamp, level, target and message
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown log format '{0}', expected 'text' or 'json'")]
pub struct UnknownLogFormat(pub String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(UnknownLogFormat(s.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Installs the global tracing subscriber.
///
/// Filtering follows `RUST_LOG` and falls back to `info`. `log` records are
/// bridged into tracing. Calling this more than once is harmless: later
/// calls leave the first subscriber in place and return `Ok(())`.
pub fn init_logging(format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_log::LogTracer;
    use tracing_subscriber::fmt;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (json_layer, text_layer) = match format {
        LogFormat::Json => (
            Some(fmt::layer().json().with_current_span(true).with_target(true)),
            None,
        ),
        LogFormat::Text => (
            None,
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            ),
        ),
    };

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init();

    if let Err(e) = result {
        tracing::debug!("tracing subscriber already initialized: {}", e);
    }

    // try_init may already have bridged `log`; a second bridge is refused.
    let _ = LogTracer::init();
    Ok(())
}
