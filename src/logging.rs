use crate::utils::truncate_str;
use crate::{PreviewError, PreviewResult};
use std::fmt::Display;
use std::path::PathBuf;
use tracing::{debug, error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt as subscriber_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};
use unicode_width::UnicodeWidthStr;

pub const LOG_FILE_NAME: &str = "link-preview.log";

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub log_level: String,
    pub console_output: bool,
    pub file_output: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".into(),
            log_level: "info".into(),
            console_output: true,
            file_output: false,
        }
    }
}

fn create_separator(width: usize, ch: char) -> String {
    std::iter::repeat_n(ch, width).collect()
}

/// Greedy word wrap by display width; continuation lines are indented.
fn wrap_text(text: &str, width: usize) -> String {
    let mut wrapped = String::new();
    let mut line_width = 0;

    for word in text.split_whitespace() {
        let word_width = word.width();
        if line_width > 0 && line_width + word_width + 1 > width {
            wrapped.push_str("\n  ");
            wrapped.push_str(word);
            line_width = word_width + 2;
        } else {
            if line_width > 0 {
                wrapped.push(' ');
                line_width += 1;
            }
            wrapped.push_str(word);
            line_width += word_width;
        }
    }
    wrapped
}

/// Logs a resolved preview as a boxed card. Rejected results are skipped.
pub fn log_preview_card(result: &PreviewResult, url: &str) {
    const CARD_WIDTH: usize = 80;
    const CONTENT_WIDTH: usize = CARD_WIDTH - 2;

    let Some(preview) = &result.result else {
        return;
    };
    let site = preview.site_data.as_ref();
    fn field(value: Option<&String>) -> &str {
        value.map(String::as_str).unwrap_or("N/A")
    }

    let horizontal_line = "═".repeat(CARD_WIDTH - 2);

    info!(
        "\n╔{}╗\n\
         URL: {}\n\
         Title: {}\n\
         Desc: {}\n\
         Site: {}\n\
         Top image: {}\n\
         Search: {} ({} results, {} errors)\n\
         ╚{}╝",
        horizontal_line,
        wrap_text(url, CONTENT_WIDTH - 5),
        wrap_text(field(site.and_then(|s| s.title.as_ref())), CONTENT_WIDTH - 7),
        wrap_text(field(site.and_then(|s| s.description.as_ref())), CONTENT_WIDTH - 6),
        wrap_text(field(site.and_then(|s| s.site_name.as_ref())), CONTENT_WIDTH - 6),
        wrap_text(field(preview.top_image.as_ref()), CONTENT_WIDTH - 11),
        field(preview.image_search.as_ref()),
        preview.image_results.len(),
        result.errors.len(),
        horizontal_line,
    );
}

pub fn log_error_card<E: Display + std::error::Error>(url: &str, error: &E) {
    const CARD_WIDTH: usize = 70;
    const CONTENT_WIDTH: usize = CARD_WIDTH - 8;

    let top_bottom = create_separator(CARD_WIDTH - 2, '═');
    let middle = create_separator(CARD_WIDTH - 2, '─');

    let mut error_details = error.to_string();
    if let Some(source) = error.source() {
        error_details = format!("{error_details} (caused by: {source})");
    }

    error!(
        "\n╔═{}═╗\n\
         ║ URL: {:<width$} ║\n\
         ║{}║\n\
         ║ Error: {:<width$} ║\n\
         ╚═{}═╝",
        top_bottom,
        truncate_str(url, CONTENT_WIDTH),
        middle,
        truncate_str(&error_details, CONTENT_WIDTH),
        top_bottom,
        width = CONTENT_WIDTH
    );
}

pub fn setup_logging(config: LogConfig) -> Result<(), PreviewError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let mut layers = Vec::new();

    if config.console_output {
        let console_layer = subscriber_fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .with_span_events(subscriber_fmt::format::FmtSpan::CLOSE);
        layers.push(console_layer.boxed());
    }

    if config.file_output {
        std::fs::create_dir_all(&config.log_dir).map_err(|e| {
            PreviewError::ConfigError(format!(
                "cannot create log directory {}: {e}",
                config.log_dir.display()
            ))
        })?;

        let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, LOG_FILE_NAME);

        let file_layer = subscriber_fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            .with_writer(file_appender);

        layers.push(file_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| PreviewError::ConfigError(format!("global subscriber already set: {e}")))?;

    debug!("Logging system initialized with config: {:?}", config);
    Ok(())
}

/// Scoped log level, mainly for tests.
pub struct LogLevelGuard {
    _guard: tracing::dispatcher::DefaultGuard,
}

impl LogLevelGuard {
    pub fn set_level(level: &str) -> Self {
        let filter = EnvFilter::new(level);
        let subscriber = tracing_subscriber::registry()
            .with(subscriber_fmt::layer().with_test_writer())
            .with(filter);

        LogLevelGuard {
            _guard: tracing::subscriber::set_default(subscriber),
        }
    }
}
