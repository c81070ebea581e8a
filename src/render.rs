use crate::assets::AssetCatalog;
use crate::config::{Paths, RenderSettings};
use crate::error::RenderError;
use crate::ffmpeg::{ConcatJob, SegmentJob, Transcoder, concat_list};
use crate::geometry::GeometrySpec;
use crate::sequence::Sequence;
use crate::{logi, logok, logw, preview};
use rand::Rng;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Used when ffprobe cannot read an image.
const FALLBACK_DIMENSIONS: (u32, u32) = (1920, 1080);

pub fn output_path(output_dir: &Path, sequence_number: usize) -> PathBuf {
    output_dir.join(format!("sequence-{:03}-video.mp4", sequence_number))
}

/// Segment files of one sequence; removed when dropped, whatever the outcome.
struct SegmentFiles {
    paths: Vec<PathBuf>,
}

impl Drop for SegmentFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            if path.exists() {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

pub struct SequenceRenderer<'a, T: Transcoder> {
    settings: &'a RenderSettings,
    catalog: &'a AssetCatalog,
    transcoder: &'a T,
    font: Option<PathBuf>,
    temp_dir: PathBuf,
    output_dir: PathBuf,
}

impl<'a, T: Transcoder> SequenceRenderer<'a, T> {
    pub fn new(
        settings: &'a RenderSettings,
        paths: &Paths,
        catalog: &'a AssetCatalog,
        transcoder: &'a T,
        font: Option<PathBuf>,
    ) -> Self {
        Self {
            settings,
            catalog,
            transcoder,
            font,
            temp_dir: paths.temp_videos.clone(),
            output_dir: paths.output_videos.clone(),
        }
    }

    /// Renders the three segments of `sequence` and joins them into
    /// `sequence-NNN-video.mp4`, returning the final path.
    ///
    /// Segment files never outlive this call.
    pub async fn render<R: Rng + ?Sized>(
        &self,
        sequence: &Sequence,
        sequence_number: usize,
        audio: Option<&Path>,
        rng: &mut R,
    ) -> Result<PathBuf, RenderError> {
        let mut segments = SegmentFiles { paths: Vec::new() };

        for (i, row) in sequence.rows().iter().enumerate() {
            let index = i + 1;
            logi(format!(
                "Creating segment {}/3 (Order {}): {} - \"{}\"",
                index,
                row.order_label(),
                row.type_label(),
                preview(&row.overlay_text, 80)
            ));

            let category = row.category.clone()?;
            let image = self
                .catalog
                .image_for(category)
                .ok_or(RenderError::MissingAsset(category))?;

            let output = self
                .temp_dir
                .join(format!("segment_{}_{}.mp4", sequence_number, index));
            segments.paths.push(output.clone());

            self.render_segment(image, &row.overlay_text, &output, index, rng)
                .await?;
            logok(format!("Segment {} created", index));
        }

        let final_path = output_path(&self.output_dir, sequence_number);
        let listed = segments
            .paths
            .iter()
            .map(std::path::absolute)
            .collect::<Result<Vec<_>, _>>()?;
        let list = self.write_temp("concat_", &concat_list(&listed))?;
        if let Some(audio) = audio {
            logi(format!("Adding audio: {}", audio.display()));
        }

        let job = ConcatJob {
            list_file: list.path(),
            segments: &segments.paths,
            audio,
            settings: self.settings,
            output: &final_path,
        };
        if let Err(err) = self.transcoder.concat_segments(&job).await {
            let _ = std::fs::remove_file(&final_path);
            return Err(RenderError::Concat(format!("{err:#}")));
        }

        logok(format!(
            "Final video created: {} ({:.1}s)",
            final_path.display(),
            self.settings.total_duration()
        ));
        Ok(final_path)
    }

    async fn render_segment<R: Rng + ?Sized>(
        &self,
        image: &Path,
        caption: &str,
        output: &Path,
        index: usize,
        rng: &mut R,
    ) -> Result<(), RenderError> {
        let (w, h) = match self.transcoder.probe_dimensions(image).await {
            Ok(dims) => dims,
            Err(err) => {
                logw(format!(
                    "Could not probe {} ({:#}); assuming {}x{}",
                    image.display(),
                    err,
                    FALLBACK_DIMENSIONS.0,
                    FALLBACK_DIMENSIONS.1
                ));
                FALLBACK_DIMENSIONS
            }
        };

        let geometry = GeometrySpec::compute(self.settings, w, h, caption, rng);
        logi(format!(
            "Image {}x{} cropped to {}x{}, bar at {}px ({:.1}%), {} line(s)",
            w,
            h,
            geometry.crop.width,
            geometry.crop.height,
            geometry.bar.y,
            geometry.bar_percent(),
            geometry.caption.line_count()
        ));

        let caption_file = self.write_temp("overlay_text_", &geometry.caption.text())?;
        let job = SegmentJob {
            image,
            caption_file: caption_file.path(),
            geometry: &geometry,
            font: self.font.as_deref(),
            settings: self.settings,
            output,
        };

        self.transcoder
            .render_segment(&job)
            .await
            .map_err(|err| RenderError::Segment {
                index,
                detail: format!("{err:#}"),
            })
    }

    fn write_temp(&self, prefix: &str, contents: &str) -> Result<NamedTempFile, RenderError> {
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".txt")
            .tempfile_in(&self.temp_dir)?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}
