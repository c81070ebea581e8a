use tracing::{error, info, warn};

pub mod assets;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod generator;
pub mod geometry;
pub mod init;
pub mod platform;
pub mod render;
pub mod sequence;
pub mod sheets;

/// Text of a tagged log line. The event level already names INFO, WARN and
/// ERROR, so only tags without a level of their own are kept.
fn log_line(tag: &str, message: &str) -> String {
    match tag {
        "INFO" | "WARN" | "ERROR" => message.to_string(),
        _ => format!("[{}] {}", tag, message),
    }
}

pub(crate) fn logv(tag: &str, message: &str) {
    let line = log_line(tag, message);
    match tag {
        "WARN" => warn!("{}", line),
        "ERROR" => error!("{}", line),
        _ => info!("{}", line),
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}

pub(crate) fn loge(message: impl AsRef<str>) {
    logv("ERROR", message.as_ref());
}

/// Shortens a caption for log lines, appending `...` when cut.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_tags_are_not_repeated_in_the_line() {
        assert_eq!(log_line("INFO", "Found 6 unused rows total"), "Found 6 unused rows total");
        assert_eq!(log_line("WARN", "no audio"), "no audio");
        assert_eq!(log_line("ERROR", "render failed"), "render failed");
        assert_eq!(log_line("OK", "FFmpeg found"), "[OK] FFmpeg found");
    }

    #[test]
    fn preview_cuts_on_characters() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("héllo wörld", 5), "héllo...");
    }
}
