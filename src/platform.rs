use std::path::{Path, PathBuf};

const CUSTOM_FONT: &str = "HelveticaNeueRoman.otf";

#[cfg(target_os = "windows")]
const SYSTEM_FONTS: &[&str] = &[
    "C:/Windows/Fonts/arial.ttf",
    "C:/Windows/Fonts/Arial.ttf",
    "C:/Windows/Fonts/calibri.ttf",
];

#[cfg(target_os = "macos")]
const SYSTEM_FONTS: &[&str] = &[
    "/System/Library/Fonts/Helvetica.ttc",
    "/System/Library/Fonts/Avenir.ttc",
    "/Library/Fonts/Arial.ttf",
];

#[cfg(all(unix, not(target_os = "macos")))]
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/ubuntu/Ubuntu-B.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
];

#[cfg(not(any(unix, target_os = "windows")))]
const SYSTEM_FONTS: &[&str] = &[];

/// Caption font: the bundled font in `assets_dir` if present, else the first
/// installed system font. `None` leaves ffmpeg on its default font.
pub fn caption_font(assets_dir: &Path) -> Option<PathBuf> {
    let custom = assets_dir.join(CUSTOM_FONT);
    if custom.is_file() {
        return Some(custom);
    }

    SYSTEM_FONTS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}
