//! Logging initialisation.
//!
//! Level and sinks come from [`normgate_core::config::LogSettings`]:
//! stdout, a daily-rotating file under the configured path, or both.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use normgate_core::config::LogSettings;

/// Install the global subscriber. The returned guard must be held for the
/// process lifetime so buffered file output is flushed.
pub fn init(settings: &LogSettings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.to_lowercase()));

    let registry = tracing_subscriber::registry().with(filter);

    let mut guard = None;
    let file_layer = if settings.to_file {
        let path = std::path::Path::new(&settings.file_path);
        let directory = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let file_name = path
            .file_name()
            .map_or_else(|| "app.log".to_string(), |n| n.to_string_lossy().into_owned());
        let appender = tracing_appender::rolling::daily(directory, file_name);
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        guard = Some(worker_guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
    } else {
        None
    };

    let stdout_layer = if settings.to_stdout {
        Some(tracing_subscriber::fmt::layer())
    } else {
        None
    };

    registry.with(file_layer).with(stdout_layer).init();
    guard
}
