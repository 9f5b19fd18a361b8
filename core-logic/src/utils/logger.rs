use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    EnvFilter, Layer,
};

/// Tracing targets with their own console tag and colour.
pub mod targets {
    pub const PROFILE: &str = "profile";
    pub const CLAIM: &str = "claim";
    pub const REFERRAL: &str = "referral";
    pub const COUNTDOWN: &str = "countdown";
    pub const CYCLE: &str = "cycle";
}

pub fn setup_logger() -> Option<WorkerGuard> {
    std::fs::create_dir_all("logs").ok();

    // Hourly rotation, plain text
    let file_appender = tracing_appender::rolling::hourly("logs", "app");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Countdown ticks every second; keep them out of the file
    let file_filter = tracing_subscriber::filter::Targets::new()
        .with_target(targets::COUNTDOWN, tracing::Level::WARN)
        .with_target("hyper", tracing::Level::WARN)
        .with_target("reqwest", tracing::Level::WARN)
        .with_default(tracing::Level::INFO);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    // Return guard - MUST be kept alive by caller
    Some(guard)
}

// --- Formatters ---

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn extract_message(event: &Event<'_>) -> String {
    let mut visitor = MessageVisitor {
        message: String::new(),
    };
    event.record(&mut visitor);
    visitor.message
}

/// Console tag and colour for an event, target first, then level.
fn console_style(target: &str, level: &Level) -> (&'static str, Color) {
    let by_target = match target {
        targets::PROFILE => Some(("PROFILE", Color::Cyan)),
        targets::CLAIM => Some(("CLAIM", Color::Green)),
        targets::REFERRAL => Some(("REFERRAL", Color::Green)),
        targets::COUNTDOWN => Some(("COUNTDOWN", Color::Magenta)),
        targets::CYCLE => Some(("SUCCESS", Color::Green)),
        _ => None,
    };

    by_target.unwrap_or(match *level {
        Level::ERROR => ("ERROR", Color::Red),
        Level::WARN => ("WARN", Color::Yellow),
        Level::INFO => ("INFO", Color::Cyan),
        _ => ("DEBUG", Color::Blue),
    })
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let (tag, color) = console_style(metadata.target(), metadata.level());
        let msg = extract_message(event);

        let style = Style::new().fg(color);
        write!(
            writer,
            "{}",
            style.paint(format!("[{}] {}", tag, msg))
        )?;
        writeln!(writer)
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let metadata = event.metadata();

        write!(
            writer,
            "{} [{}] {}: ",
            timestamp,
            metadata.level(),
            metadata.target()
        )?;
        writeln!(writer, "{}", extract_message(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_style_wins_over_level() {
        assert_eq!(console_style(targets::PROFILE, &Level::INFO).0, "PROFILE");
        assert_eq!(console_style(targets::COUNTDOWN, &Level::INFO).0, "COUNTDOWN");
        assert_eq!(console_style("humanity_runner::engine", &Level::WARN).0, "WARN");
        assert_eq!(console_style("humanity_runner::engine", &Level::ERROR).0, "ERROR");
    }
}
