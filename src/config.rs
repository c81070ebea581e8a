use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Width:height of every rendered segment.
pub const TARGET_ASPECT: (u32, u32) = (9, 16);

/// Segments per video; one per order label.
pub const SEGMENTS_PER_VIDEO: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sheet_id: String,
    #[serde(default = "default_worksheet")]
    pub worksheet: String,
    #[serde(default = "default_credentials")]
    pub credentials: PathBuf,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub render: RenderSettings,
}

fn default_worksheet() -> String {
    "SnapchatThreePart".to_string()
}

fn default_credentials() -> PathBuf {
    PathBuf::from("assets/credentials.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub input_images: PathBuf,
    pub output_videos: PathBuf,
    pub temp_videos: PathBuf,
    pub audio: PathBuf,
    pub assets: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            input_images: PathBuf::from("input-images"),
            output_videos: PathBuf::from("output-video"),
            temp_videos: PathBuf::from("temp-videos"),
            audio: PathBuf::from("tiktok-audio"),
            assets: PathBuf::from("assets"),
        }
    }
}

impl Paths {
    pub fn all(&self) -> [&Path; 5] {
        [
            &self.input_images,
            &self.output_videos,
            &self.temp_videos,
            &self.audio,
            &self.assets,
        ]
    }
}

/// Fixed render parameters shared by the geometry calculation and ffmpeg.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub segment_duration: f64,
    pub fps: u32,
    pub font_size: u32,
    pub text_padding: u32,
    pub bar_opacity: f64,
    pub min_bar_percent: u32,
    pub max_bar_percent: u32,
    pub audio_volume_db: i32,
    pub crf: u32,
    pub preset: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            segment_duration: 3.0,
            fps: 30,
            font_size: 20,
            text_padding: 10,
            bar_opacity: 0.7,
            min_bar_percent: 45,
            max_bar_percent: 70,
            audio_volume_db: -10,
            crf: 23,
            preset: "medium".to_string(),
        }
    }
}

impl RenderSettings {
    pub fn total_duration(&self) -> f64 {
        self.segment_duration * SEGMENTS_PER_VIDEO as f64
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.segment_duration > 0.0) {
            anyhow::bail!("config.json: render.segment_duration must be positive");
        }
        if self.fps == 0 {
            anyhow::bail!("config.json: render.fps must be positive");
        }
        if self.font_size == 0 {
            anyhow::bail!("config.json: render.font_size must be positive");
        }
        if !(0.0..=1.0).contains(&self.bar_opacity) {
            anyhow::bail!("config.json: render.bar_opacity must be within 0..=1");
        }
        if self.max_bar_percent > 100 {
            anyhow::bail!("config.json: render.max_bar_percent must be at most 100");
        }
        if self.min_bar_percent > self.max_bar_percent {
            anyhow::bail!(
                "config.json: render.min_bar_percent ({}) exceeds max_bar_percent ({})",
                self.min_bar_percent,
                self.max_bar_percent
            );
        }
        Ok(())
    }
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).await.with_context(|| {
            format!(
                "Failed to read config: {} (create it with at least {{\"sheet_id\": \"<spreadsheet id>\"}})",
                path.as_ref().display()
            )
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content).context("config.json: invalid JSON")?;

        if config.sheet_id.trim().is_empty() {
            anyhow::bail!("config.json: sheet_id missing");
        }
        config.render.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg = Config::from_json(r#"{"sheet_id": "abc"}"#).unwrap();
        assert_eq!(cfg.worksheet, "SnapchatThreePart");
        assert_eq!(cfg.credentials, PathBuf::from("assets/credentials.json"));
        assert_eq!(cfg.paths.temp_videos, PathBuf::from("temp-videos"));
        assert_eq!(cfg.render.font_size, 20);
        assert_eq!(cfg.render.total_duration(), 9.0);
    }

    #[test]
    fn partial_render_section_keeps_other_defaults() {
        let cfg = Config::from_json(r#"{"sheet_id": "abc", "render": {"font_size": 32}}"#).unwrap();
        assert_eq!(cfg.render.font_size, 32);
        assert_eq!(cfg.render.min_bar_percent, 45);
        assert_eq!(cfg.render.max_bar_percent, 70);
    }

    #[test]
    fn empty_sheet_id_is_rejected() {
        let err = Config::from_json(r#"{"sheet_id": "  "}"#).unwrap_err();
        assert!(err.to_string().contains("sheet_id"));
    }

    #[test]
    fn inverted_bar_band_is_rejected() {
        let json = r#"{"sheet_id": "abc", "render": {"min_bar_percent": 80, "max_bar_percent": 20}}"#;
        assert!(Config::from_json(json).is_err());
    }
}
