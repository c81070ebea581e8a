use crate::config::RenderSettings;
use crate::geometry::GeometrySpec;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

const STDERR_TAIL_LINES: usize = 5;
const AUDIO_BITRATE: &str = "128k";
const AUDIO_CHANNELS: &str = "2";
const AUDIO_RATE: &str = "44100";

/// One still-image segment: crop, caption bar and caption text.
pub struct SegmentJob<'a> {
    pub image: &'a Path,
    pub caption_file: &'a Path,
    pub geometry: &'a GeometrySpec,
    pub font: Option<&'a Path>,
    pub settings: &'a RenderSettings,
    pub output: &'a Path,
}

/// Joins rendered segments in order and optionally lays an audio track under them.
pub struct ConcatJob<'a> {
    pub list_file: &'a Path,
    pub segments: &'a [PathBuf],
    pub audio: Option<&'a Path>,
    pub settings: &'a RenderSettings,
    pub output: &'a Path,
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn probe_dimensions(&self, image: &Path) -> Result<(u32, u32)>;
    async fn render_segment(&self, job: &SegmentJob<'_>) -> Result<()>;
    async fn concat_segments(&self, job: &ConcatJob<'_>) -> Result<()>;
}

/// The `ffmpeg`/`ffprobe` binaries on PATH.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ffmpeg;

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn probe_dimensions(&self, image: &Path) -> Result<(u32, u32)> {
        ffprobe_dimensions(image).await
    }

    async fn render_segment(&self, job: &SegmentJob<'_>) -> Result<()> {
        run_cmd(&segment_args(job)).await
    }

    async fn concat_segments(&self, job: &ConcatJob<'_>) -> Result<()> {
        run_cmd(&concat_args(job)).await
    }
}

async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    debug!("running {:?}", args);
    let output = Command::new(&args[0])
        .args(&args[1..])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("Failed to start {}", args[0]))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(anyhow::anyhow!(
        "{} exited with {}: {}",
        args[0],
        output.status,
        stderr_tail(&stderr, STDERR_TAIL_LINES)
    ))
}

/// Last `max_lines` non-empty lines of a process's stderr, joined with ` | `.
pub fn stderr_tail(stderr: &str, max_lines: usize) -> String {
    let mut tail: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .rev()
        .take(max_lines)
        .collect();
    if tail.is_empty() {
        return "no diagnostic output".to_string();
    }
    tail.reverse();
    tail.join(" | ")
}

pub async fn ffprobe_dimensions(path: &Path) -> Result<(u32, u32)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe execution failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed for {}", path.display()));
    }

    parse_dimensions(&String::from_utf8_lossy(&output.stdout))
}

fn parse_dimensions(text: &str) -> Result<(u32, u32)> {
    let mut parts = text.trim().split('x');
    let w = parts.next().and_then(|v| v.trim().parse::<u32>().ok()).unwrap_or(0);
    let h = parts.next().and_then(|v| v.trim().parse::<u32>().ok()).unwrap_or(0);

    if w == 0 || h == 0 {
        return Err(anyhow::anyhow!("Invalid dimensions: {:?}", text.trim()));
    }

    Ok((w, h))
}

/// Escapes a path for use as an unquoted filtergraph option value.
pub fn escape_filter_path(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    let mut escaped = String::with_capacity(normalized.len() + 12);
    for ch in normalized.chars() {
        match ch {
            ':' => escaped.push_str("\\:"),
            '\'' => escaped.push_str("\\'"),
            ',' => escaped.push_str("\\,"),
            ';' => escaped.push_str("\\;"),
            '[' => escaped.push_str("\\["),
            ']' => escaped.push_str("\\]"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Path as a quoted filter option value. The quotes carry the option-level
/// escapes of [`escape_filter_path`] through the filtergraph parser intact.
pub fn quote_filter_path(path: &Path) -> String {
    format!("'{}'", escape_filter_path(path).replace('\'', "'\\''"))
}

pub fn segment_filter(job: &SegmentJob<'_>) -> String {
    let crop = job.geometry.crop;
    let bar = job.geometry.bar;
    let font = job
        .font
        .map(|f| format!(":fontfile={}", quote_filter_path(f)))
        .unwrap_or_default();

    format!(
        "[0:v]crop={cw}:{ch}:{cx}:{cy}[cropped];\
         [cropped]drawbox=x=0:y={by}:w={cw}:h={bh}:color=black@{opacity}:t=fill[with_bar];\
         [with_bar]drawtext=textfile={textfile}{font}:fontsize={fs}:fontcolor=white\
         :x=(w-text_w)/2:y={by}+({bh}-text_h)/2:text_align=C,\
         scale=trunc(iw/2)*2:trunc(ih/2)*2[v]",
        cw = crop.width,
        ch = crop.height,
        cx = crop.x,
        cy = crop.y,
        by = bar.y,
        bh = bar.height,
        opacity = job.settings.bar_opacity,
        textfile = quote_filter_path(job.caption_file),
        font = font,
        fs = job.settings.font_size,
    )
}

pub fn segment_args(job: &SegmentJob<'_>) -> Vec<String> {
    vec![
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-loop".to_string(),
        "1".to_string(),
        "-i".to_string(),
        job.image.display().to_string(),
        "-filter_complex".to_string(),
        segment_filter(job),
        "-map".to_string(),
        "[v]".to_string(),
        "-t".to_string(),
        format!("{:.3}", job.settings.segment_duration),
        "-r".to_string(),
        job.settings.fps.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        job.settings.preset.clone(),
        "-crf".to_string(),
        job.settings.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        job.output.display().to_string(),
    ]
}

pub fn concat_args(job: &ConcatJob<'_>) -> Vec<String> {
    let mut args = vec![
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        job.list_file.display().to_string(),
    ];

    if let Some(audio) = job.audio {
        args.extend(["-i".to_string(), audio.display().to_string()]);
    }

    args.extend([
        "-map".to_string(),
        "0:v:0".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
    ]);

    if job.audio.is_some() {
        args.extend([
            "-map".to_string(),
            "1:a:0".to_string(),
            "-af".to_string(),
            format!("volume={}dB", job.settings.audio_volume_db),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            AUDIO_BITRATE.to_string(),
            "-ac".to_string(),
            AUDIO_CHANNELS.to_string(),
            "-ar".to_string(),
            AUDIO_RATE.to_string(),
            "-t".to_string(),
            format!("{:.3}", job.settings.total_duration()),
        ]);
    }

    args.extend([
        "-movflags".to_string(),
        "+faststart".to_string(),
        job.output.display().to_string(),
    ]);
    args
}

/// Body of an ffmpeg concat-demuxer list file.
pub fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'\n", p.display().to_string().replace('\'', "'\\''")))
        .collect()
}
