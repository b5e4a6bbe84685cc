use std::{path::Path, str::FromStr};

use tracing::metadata::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

fn level_filter(level: &str) -> LevelFilter {
    let default = LevelFilter::INFO;

    LevelFilter::from_str(level).unwrap_or_else(|_| {
        eprintln!("Invalid log level specified {level}, defaulting to {default}");
        default
    })
}

fn ours(metadata: &tracing::Metadata<'_>) -> bool {
    metadata.target().starts_with("outreach")
}

/// Installs the global subscriber: a compact console layer for the operator
/// and, when `log_dir` is given, a plain-text layer appending to
/// `{log_dir}/{file_name}`.
///
/// The returned guard flushes the file writer when dropped, so keep it alive
/// for the whole process.
pub fn init(level: &str, log_dir: Option<&Path>, file_name: &str) -> Option<WorkerGuard> {
    let level = level_filter(level);

    let (file_layer, guard) = log_dir.map_or((None, None), |dir| {
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(writer)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(
                "%Y-%m-%d %H:%M:%S".to_string(),
            ))
            .with_filter(level)
            .with_filter(FilterFn::new(ours));

        (Some(layer), Some(guard))
    });

    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(false)
                .with_line_number(false)
                .with_target(false)
                .compact()
                .with_ansi(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_filter(level)
                .with_filter(FilterFn::new(ours)),
        )
        .with(file_layer)
        .init();

    guard
}
