use std::sync::OnceLock;

use crate::config::{TraceConfig, TraceFormat};
use tracing::Subscriber;
use tracing_appender::non_blocking::{
    NonBlocking, NonBlockingBuilder, WorkerGuard,
};
use tracing_appender::rolling::daily;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

// Guards must outlive the process or buffered lines are lost.
static TRACE_INIT: OnceLock<Vec<WorkerGuard>> = OnceLock::new();

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

fn new_fmt_layer<S>(
    filter: EnvFilter,
    format: TraceFormat,
    writer: NonBlocking,
) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        TraceFormat::Full => {
            fmt::layer().with_writer(writer).with_filter(filter).boxed()
        }
        TraceFormat::Compact => fmt::layer()
            .with_writer(writer)
            .compact()
            .with_filter(filter)
            .boxed(),
        TraceFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .pretty()
            .with_filter(filter)
            .boxed(),
        TraceFormat::Json => {
            fmt::layer().with_writer(writer).json().with_filter(filter).boxed()
        }
    }
}

/// Builds one layer per configured sink. The returned guards flush their
/// writer when dropped.
fn build_layers<S>(
    trace_config: &TraceConfig,
) -> (Vec<BoxedLayer<S>>, Vec<WorkerGuard>)
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let mut guards = Vec::new();
    let mut layers = Vec::new();

    if let Some(console_config) = trace_config.console.as_ref() {
        let (console, console_guard) = NonBlockingBuilder::default()
            .buffered_lines_limit(console_config.buffer_limit)
            .lossy(console_config.lossy)
            .finish(std::io::stdout());
        guards.push(console_guard);

        // RUST_LOG wins over the configured console filter
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&console_config.filter));

        layers.push(new_fmt_layer(filter, console_config.format, console));
    }

    if let Some(file_config) = trace_config.file.as_ref() {
        let (file_writer, file_guard) = NonBlockingBuilder::default()
            .buffered_lines_limit(file_config.buffer_limit)
            .lossy(file_config.lossy)
            .finish(daily(
                file_config.directory.as_str(),
                file_config.filename.as_str(),
            ));
        guards.push(file_guard);

        let filter = EnvFilter::new(&file_config.filter);
        layers.push(new_fmt_layer(filter, file_config.format, file_writer));
    }

    (layers, guards)
}

/// Installs the global subscriber. Only the first call has any effect;
/// later calls return `Ok(())` without touching the registry.
pub fn init(trace_config: &TraceConfig) -> crate::Result<()> {
    let mut setup_result = Ok(());
    TRACE_INIT.get_or_init(|| {
        let (layers, guards) = build_layers(trace_config);
        if let Err(e) = tracing_subscriber::registry().with(layers).try_init() {
            setup_result = Err(anyhow::Error::new(e)
                .context("failed to init tracing")
                .into());
        }
        guards
    });
    setup_result
}
