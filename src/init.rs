use crate::config::Paths;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;
use walkdir::WalkDir;

pub async fn ensure_directories(paths: &Paths) -> Result<()> {
    for dir in paths.all() {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

pub async fn check_tool(program: &str) -> bool {
    match tokio::process::Command::new(program)
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// Fails with install instructions unless both ffmpeg and ffprobe run.
pub async fn check_ffmpeg() -> Result<()> {
    for program in ["ffmpeg", "ffprobe"] {
        if !check_tool(program).await {
            anyhow::bail!(
                "{program} is not installed or not on PATH. Install FFmpeg:\n  \
                 Mac: brew install ffmpeg\n  \
                 Linux: sudo apt-get install ffmpeg\n  \
                 Windows: download from ffmpeg.org"
            );
        }
    }
    logok("FFmpeg found");
    Ok(())
}

/// Removes files an interrupted run left in the temp directory.
pub async fn clear_directory_contents(dir_path: &Path) -> Result<usize> {
    if !fs::metadata(dir_path).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in WalkDir::new(dir_path).min_depth(1).contents_first(true) {
        let entry = entry?;
        let path = entry.path();
        let result = if entry.file_type().is_dir() {
            fs::remove_dir(path).await
        } else {
            fs::remove_file(path).await
        };
        match result {
            Ok(()) => removed += 1,
            Err(err) => logw(format!("Could not remove {}: {}", path.display(), err)),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_every_working_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let paths = Paths {
            input_images: root.join("in"),
            output_videos: root.join("out"),
            temp_videos: root.join("tmp"),
            audio: root.join("audio"),
            assets: root.join("assets"),
        };

        ensure_directories(&paths).await.unwrap();
        for dir in paths.all() {
            assert!(dir.is_dir(), "{}", dir.display());
        }
    }

    #[tokio::test]
    async fn clears_stale_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("segment_1_1.mp4"), b"x").unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("nested/concat.txt"), b"x").unwrap();

        assert_eq!(clear_directory_contents(tmp.path()).await.unwrap(), 3);
        assert!(tmp.path().is_dir());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn clearing_missing_directory_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(clear_directory_contents(&tmp.path().join("gone")).await.unwrap(), 0);
    }
}
