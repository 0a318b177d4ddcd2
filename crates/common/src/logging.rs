use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber for a binary.
///
/// `RUST_LOG` takes precedence over `level`. Log lines go to stderr through a
/// non-blocking writer; keep the returned guard alive for the lifetime of the
/// process or buffered lines are lost on exit.
pub fn init(level: tracing::Level) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true)
        .try_init();

    guard
}
