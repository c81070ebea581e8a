use crate::assets::{self, AssetCatalog};
use crate::config::Config;
use crate::ffmpeg::{Ffmpeg, Transcoder};
use crate::init;
use crate::platform;
use crate::render::SequenceRenderer;
use crate::sequence::{Sequence, select_next_sequence_skipping};
use crate::sheets::{GoogleSheet, RowStore};
use crate::{loge, logi, logok, logw, preview};
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Upper bound on selection attempts in one run.
pub const MAX_SEQUENCE_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Videos that rendered but whose rows could not be marked used.
    pub commit_failures: usize,
    pub iterations: usize,
    pub outputs: Vec<PathBuf>,
}

impl BatchSummary {
    pub fn exit_code(&self) -> i32 {
        if self.succeeded > 0 { 0 } else { 1 }
    }
}

/// Marks the three rows of a rendered sequence as used in a single write, so a
/// failure leaves all three unused.
pub async fn commit_sequence<S: RowStore + ?Sized>(store: &S, sequence: &Sequence) -> Result<()> {
    let row_numbers = sequence.row_numbers();
    store
        .mark_rows_used(&row_numbers)
        .await
        .with_context(|| format!("Failed to mark rows {:?} as used", row_numbers))?;
    for row in sequence.rows() {
        logi(format!(
            "Marked row {} as used (Order {}: {})",
            row.row_number,
            row.order_label(),
            row.type_label()
        ));
    }
    Ok(())
}

fn log_sequence(sequence: &Sequence) {
    logok("Found complete video sequence:");
    for (i, row) in sequence.rows().iter().enumerate() {
        logi(format!(
            "  {}. Order {}: {} - \"{}\"",
            i + 1,
            row.order_label(),
            row.type_label(),
            preview(&row.overlay_text, 50)
        ));
    }
}

/// Selects, renders and commits sequences until none is left or
/// [`MAX_SEQUENCE_ATTEMPTS`] is reached.
///
/// A failed render or a failed commit never stops the batch. Either way its
/// rows are remembered and any window holding them is skipped for the rest of
/// the run.
pub async fn run_batch<S, T, R>(
    store: &S,
    renderer: &SequenceRenderer<'_, T>,
    audio_files: &[PathBuf],
    rng: &mut R,
) -> Result<BatchSummary>
where
    S: RowStore + ?Sized,
    T: Transcoder,
    R: Rng + ?Sized,
{
    let mut summary = BatchSummary::default();
    let mut attempted: HashSet<usize> = HashSet::new();
    let mut sequence_number = 1;
    let mut exhausted = false;

    while summary.iterations < MAX_SEQUENCE_ATTEMPTS {
        summary.iterations += 1;
        logi(format!("=== Processing video sequence #{} ===", sequence_number));

        let rows = match store.list_rows().await {
            Ok(rows) => rows,
            Err(err) => {
                loge(format!("Error reading rows: {:#}", err));
                exhausted = true;
                break;
            }
        };
        let unused = rows.iter().filter(|r| !r.used).count();
        logi(format!("Found {} unused rows total", unused));

        let Some(sequence) = select_next_sequence_skipping(&rows, &attempted) else {
            logi("No more complete sequences available. Stopping.");
            exhausted = true;
            break;
        };
        log_sequence(&sequence);
        attempted.extend(sequence.row_numbers());

        let audio = assets::pick_audio(audio_files, rng);
        match renderer.render(&sequence, sequence_number, audio, rng).await {
            Ok(path) => {
                summary.succeeded += 1;
                match commit_sequence(store, &sequence).await {
                    Ok(()) => logok(format!("SUCCESS for sequence #{}: {}", sequence_number, path.display())),
                    Err(err) => {
                        summary.commit_failures += 1;
                        logw(format!(
                            "Video created but failed to update the sheet ({:#}); rows {:?} stay unused",
                            err,
                            sequence.row_numbers()
                        ));
                    }
                }
                summary.outputs.push(path);
            }
            Err(err) => {
                summary.failed += 1;
                loge(format!("Failed to create sequence #{}: {}", sequence_number, err));
            }
        }

        sequence_number += 1;
    }

    if !exhausted {
        logw(format!("Reached safety limit of {} sequences", MAX_SEQUENCE_ATTEMPTS));
    }

    Ok(summary)
}

fn log_summary(summary: &BatchSummary, output_dir: &Path) {
    logi("PROCESSING SUMMARY");
    logi(format!("Successful videos: {}", summary.succeeded));
    logi(format!("Failed videos: {}", summary.failed));
    if summary.commit_failures > 0 {
        logw(format!("Videos not recorded in the sheet: {}", summary.commit_failures));
    }
    logi(format!(
        "Total sequences processed: {}",
        summary.succeeded + summary.failed
    ));
    if summary.succeeded > 0 {
        logok(format!(
            "{} video(s) created in {}",
            summary.succeeded,
            output_dir.display()
        ));
    }
}

/// Full batch: load config, verify tools, assets and sheet, then run the loop.
/// Returns the process exit code.
pub async fn run_generation() -> Result<i32> {
    let cfg = Config::load("config.json").await?;

    init::check_ffmpeg().await?;
    init::ensure_directories(&cfg.paths).await?;

    let stale = init::clear_directory_contents(&cfg.paths.temp_videos).await?;
    if stale > 0 {
        logi(format!("Removed {} stale file(s) from {}", stale, cfg.paths.temp_videos.display()));
    }

    let sheet = GoogleSheet::connect(&cfg).await.with_context(|| {
        format!(
            "Google Sheets setup failed. Share the sheet with the service account in {} \
             and check that the header row is: used?, mentions toffee?, type, order, overlay text",
            cfg.credentials.display()
        )
    })?;

    let catalog = AssetCatalog::scan(&cfg.paths.input_images).await.with_context(|| {
        format!(
            "Please ensure {} holds exactly one image per type",
            cfg.paths.input_images.display()
        )
    })?;
    for (category, path) in catalog.iter() {
        logok(format!("Image for type '{}': {}", category, path.display()));
    }

    let audio_files = assets::list_audio_files(&cfg.paths.audio).await?;
    if audio_files.is_empty() {
        logw(format!(
            "No audio files found in {} - videos will be created without audio",
            cfg.paths.audio.display()
        ));
    } else {
        logok(format!("Found {} audio file(s)", audio_files.len()));
    }

    let font = platform::caption_font(&cfg.paths.assets);
    match &font {
        Some(path) => logi(format!("Caption font: {}", path.display())),
        None => logw("No caption font found; ffmpeg default font will be used"),
    }

    let settings = &cfg.render;
    logi(format!(
        "Segments: 3 x {:.1}s = {:.1}s at {} fps, 9:16 crop, worksheet '{}'",
        settings.segment_duration,
        settings.total_duration(),
        settings.fps,
        sheet.worksheet()
    ));

    let transcoder = Ffmpeg;
    let renderer = SequenceRenderer::new(settings, &cfg.paths, &catalog, &transcoder, font);
    let mut rng = StdRng::from_entropy();

    let summary = run_batch(&sheet, &renderer, &audio_files, &mut rng).await?;
    log_summary(&summary, &cfg.paths.output_videos);

    Ok(summary.exit_code())
}
