//! Structured logging setup and the startup banner.

use crate::error::{ProcessorError, Result};
use clap::ValueEnum;
use tracing::{info, info_span, Level, Span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const SERVICE_NAME: &str = "async-processor";

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

/// Map a level name to a tracing level, case-insensitively. Unknown or empty
/// names fall back to `info`.
pub fn parse_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global subscriber writing to stdout through a non-blocking writer.
///
/// `RUST_LOG` takes precedence over `level`. Keep the returned guard alive
/// until exit so buffered lines are flushed.
pub fn init(level: &str, format: LogFormat) -> Result<WorkerGuard> {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let default_directive = parse_level(level).to_string().to_lowercase();
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_current_span(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(writer)
            .with_target(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| ProcessorError::system(format!("failed to initialise logging: {}", e)))?;

    Ok(guard)
}

/// Root span carrying the service name, so every line logged inside it
/// (including component spans created under it) is attributable to the service
pub fn service_span() -> Span {
    info_span!("service", service = SERVICE_NAME)
}

/// Log the service startup banner with the key configuration fields
pub fn log_startup_banner(version: &str, nats_url: &str, http_port: u16, instance_id: &str) {
    info!(
        service = SERVICE_NAME,
        version,
        nats_url,
        http_port,
        instance_id,
        "starting service"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_parse_level() {
        let cases = [
            ("debug", Level::DEBUG),
            ("InFo", Level::INFO),
            ("WARN", Level::WARN),
            ("error", Level::ERROR),
            ("trace", Level::TRACE),
            ("verbose", Level::INFO),
            ("", Level::INFO),
        ];

        for (name, expected) in cases {
            assert_eq!(parse_level(name), expected, "level name {:?}", name);
        }
    }

    #[test]
    fn test_startup_banner_fields() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            log_startup_banner("v1.2.3", "nats://test:4222", 8080, "instance-1");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        let fields = &line["fields"];

        assert_eq!(line["level"], "INFO");
        assert_eq!(fields["message"], "starting service");
        assert_eq!(fields["service"], SERVICE_NAME);
        assert_eq!(fields["version"], "v1.2.3");
        assert_eq!(fields["nats_url"], "nats://test:4222");
        assert_eq!(fields["http_port"], 8080);
        assert_eq!(fields["instance_id"], "instance-1");
    }

    #[test]
    fn test_service_span_is_attached_to_nested_lines() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let _service = service_span().entered();
            let _component = info_span!("component", name = "http").entered();
            info!("HTTP server started");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line: serde_json::Value = serde_json::from_str(output.trim()).unwrap();

        assert_eq!(line["fields"]["message"], "HTTP server started");
        assert_eq!(line["spans"][0]["name"], "service");
        assert_eq!(line["spans"][0]["service"], SERVICE_NAME);
        assert_eq!(line["spans"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_banner_suppressed_below_level() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(parse_level("error"))
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            log_startup_banner("v1", "nats://test:4222", 8080, "instance-1");
        });

        assert!(captured.0.lock().unwrap().is_empty());
    }
}
