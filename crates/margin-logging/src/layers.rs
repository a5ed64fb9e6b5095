//! Output layers
//!
//! Each function returns a boxed layer so the builder can collect whichever
//! outputs are enabled into one stack.

use std::fs::{self, File};
use std::io;

use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;

use crate::config::{ConsoleConfig, ConsoleFormat, JsonFields, LogFile, LogRotation};

/// A type-erased layer
pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Console layer in the configured format
pub fn console_layer<S>(console: &ConsoleConfig, json: &JsonFields) -> BoxedLayer<S>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    match console.format {
        ConsoleFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_ansi(console.ansi)
            .with_target(true)
            .boxed(),
        ConsoleFormat::Json => jsonl_layer(io::stdout, json),
    }
}

/// JSON-lines layer writing to `writer`
pub fn jsonl_layer<S, W>(writer: W, fields: &JsonFields) -> BoxedLayer<S>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(fields.spans)
        .flatten_event(fields.flatten)
        .with_file(fields.location)
        .with_line_number(fields.location)
        .with_thread_ids(fields.thread)
        .with_thread_names(fields.thread)
        .with_writer(writer)
        .boxed()
}

/// Non-blocking writer for the configured log file.
///
/// `Single` truncates one `<prefix>.log`; the other rotations append to
/// rolling files.
pub fn file_writer(config: &LogFile) -> io::Result<(NonBlocking, WorkerGuard)> {
    let rotation = match config.rotation {
        LogRotation::Single => {
            fs::create_dir_all(&config.directory)?;
            let file = File::create(config.directory.join(format!("{}.log", config.prefix)))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
    };
    let appender = RollingFileAppender::new(rotation, &config.directory, &config.prefix);
    Ok(tracing_appender::non_blocking(appender))
}
