use std::time::{Duration, Instant};

use log::LevelFilter;

/// Controls how executed statements are logged.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub statements_level: LevelFilter,
    pub slow_statements_level: LevelFilter,
    pub slow_statements_duration: Duration,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            statements_level: LevelFilter::Debug,
            slow_statements_level: LevelFilter::Warn,
            slow_statements_duration: Duration::from_secs(1),
        }
    }
}

fn level_filter_to_tracing_level(filter: LevelFilter) -> Option<tracing::Level> {
    match filter {
        LevelFilter::Error => Some(tracing::Level::ERROR),
        LevelFilter::Warn => Some(tracing::Level::WARN),
        LevelFilter::Info => Some(tracing::Level::INFO),
        LevelFilter::Debug => Some(tracing::Level::DEBUG),
        LevelFilter::Trace => Some(tracing::Level::TRACE),
        LevelFilter::Off => None,
    }
}

// tracing's event! demands a const level; dispatch the dynamic one.
macro_rules! dynamic_event {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            tracing::Level::ERROR => tracing::event!(target: "comdb2::query", tracing::Level::ERROR, $($arg)+),
            tracing::Level::WARN => tracing::event!(target: "comdb2::query", tracing::Level::WARN, $($arg)+),
            tracing::Level::INFO => tracing::event!(target: "comdb2::query", tracing::Level::INFO, $($arg)+),
            tracing::Level::DEBUG => tracing::event!(target: "comdb2::query", tracing::Level::DEBUG, $($arg)+),
            tracing::Level::TRACE => tracing::event!(target: "comdb2::query", tracing::Level::TRACE, $($arg)+),
        }
    };
}

/// Tracks one executed statement from execution through the exhaustion of
/// its result stream, emitting a single event when finished (or dropped).
pub(crate) struct QueryLogger {
    sql: String,
    rows_returned: u64,
    start: Instant,
    settings: LogSettings,
    finished: bool,
}

impl QueryLogger {
    pub(crate) fn new(sql: &str, settings: LogSettings) -> Self {
        Self {
            sql: sql.to_owned(),
            rows_returned: 0,
            start: Instant::now(),
            settings,
            finished: false,
        }
    }

    pub(crate) fn increment_rows_returned(&mut self) {
        self.rows_returned += 1;
    }

    pub(crate) fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let elapsed = self.start.elapsed();
        let was_slow = elapsed >= self.settings.slow_statements_duration;

        let filter = if was_slow {
            self.settings.slow_statements_level
        } else {
            self.settings.statements_level
        };

        let Some(level) = level_filter_to_tracing_level(filter) else {
            return;
        };

        let summary = parse_query_summary(&self.sql);
        let message = if was_slow {
            format!("slow statement: {summary}")
        } else {
            summary
        };

        dynamic_event!(
            level,
            rows_returned = self.rows_returned,
            ?elapsed,
            sql = self.sql.as_str(),
            "{}",
            message
        );
    }
}

impl Drop for QueryLogger {
    fn drop(&mut self) {
        self.finish();
    }
}

/// The first few words of the statement, enough to identify it at a glance.
fn parse_query_summary(sql: &str) -> String {
    let mut summary: String = sql.split_whitespace().take(4).collect::<Vec<&str>>().join(" ");
    if summary.len() < sql.len() {
        summary.push('…');
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::parse_query_summary;

    #[test]
    fn summarizes_long_statements() {
        assert_eq!(
            parse_query_summary("select a, b, c from t where x = 1"),
            "select a, b, c…"
        );
        assert_eq!(parse_query_summary("commit"), "commit");
    }
}
