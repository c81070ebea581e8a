//! Crop, caption wrapping and overlay-bar placement for one segment.
//!
//! Everything here is a pure function of image size, caption text and the
//! render settings, except [`place_bar`] which draws from the supplied RNG.

use crate::config::{RenderSettings, TARGET_ASPECT};
use rand::Rng;

/// Horizontal margin subtracted from the crop width before wrapping.
const WRAP_MARGIN: u32 = 10;
/// Approximate glyph width as a fraction of the font size.
const CHAR_WIDTH_FACTOR: f64 = 0.6;
/// Lines never wrap narrower than this many characters.
const MIN_CHARS_PER_LINE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Largest centered 9:16 rectangle inside a `img_w` x `img_h` image.
///
/// Derived sides are truncated, never rounded up, so the rectangle always fits.
/// A side that would truncate to zero is kept at one pixel.
pub fn crop_to_aspect(img_w: u32, img_h: u32) -> CropRect {
    let (aw, ah) = (TARGET_ASPECT.0 as u64, TARGET_ASPECT.1 as u64);
    let (w, h) = (img_w as u64, img_h as u64);

    if w * ah > h * aw {
        let width = ((h * aw / ah) as u32).clamp(1, img_w.max(1));
        CropRect {
            width,
            height: img_h,
            x: (img_w - width) / 2,
            y: 0,
        }
    } else {
        let height = ((w * ah / aw) as u32).clamp(1, img_h.max(1));
        CropRect {
            width: img_w,
            height,
            x: 0,
            y: (img_h.saturating_sub(height)) / 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedCaption {
    pub lines: Vec<String>,
}

impl WrappedCaption {
    /// An empty caption still occupies one line of bar height.
    pub fn line_count(&self) -> usize {
        self.lines.len().max(1)
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

pub fn max_chars_per_line(crop_width: u32, font_size: u32) -> usize {
    let available = crop_width.saturating_sub(WRAP_MARGIN) as f64;
    let char_width = font_size as f64 * CHAR_WIDTH_FACTOR;
    let fit = if char_width > 0.0 {
        (available / char_width) as usize
    } else {
        0
    };
    fit.max(MIN_CHARS_PER_LINE)
}

/// Tab stop width used when expanding tabs in captions.
const TAB_SIZE: usize = 8;

/// Expands tabs to the next tab stop and turns every other whitespace
/// character into a single space.
fn flatten_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut column = 0usize;
    for ch in text.chars() {
        match ch {
            '\t' => {
                let pad = TAB_SIZE - column % TAB_SIZE;
                out.extend(std::iter::repeat_n(' ', pad));
                column += pad;
            }
            '\n' | '\r' => {
                out.push(' ');
                column = 0;
            }
            c if c.is_whitespace() => {
                out.push(' ');
                column += 1;
            }
            c => {
                out.push(c);
                column += 1;
            }
        }
    }
    out
}

/// Alternating runs of words and spaces, in text order.
fn chunks(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut blank = None;
    for (i, ch) in text.char_indices() {
        let is_blank = ch == ' ';
        if blank.is_some_and(|b| b != is_blank) {
            out.push(&text[start..i]);
            start = i;
        }
        blank = Some(is_blank);
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn is_blank(chunk: &str) -> bool {
    chunk.starts_with(' ')
}

/// Greedy word wrap sized to the crop width.
///
/// Runs of spaces inside a line are kept and count toward its width; a run at
/// a line break is dropped. Words are never split, so a single word longer
/// than the limit sits alone on its own line.
pub fn wrap_caption(text: &str, crop_width: u32, font_size: u32) -> WrappedCaption {
    let limit = max_chars_per_line(crop_width, font_size);
    let flat = flatten_whitespace(text);
    let mut pending = chunks(&flat);
    pending.reverse();
    let mut lines = Vec::new();

    while !pending.is_empty() {
        if !lines.is_empty() && pending.last().is_some_and(|c| is_blank(c)) {
            pending.pop();
        }

        let mut line: Vec<&str> = Vec::new();
        let mut line_len = 0usize;
        while let Some(chunk) = pending.last() {
            let len = chunk.chars().count();
            if line_len + len > limit {
                break;
            }
            line_len += len;
            line.extend(pending.pop());
        }
        if line.is_empty() {
            line.extend(pending.pop());
        }
        if line.last().is_some_and(|c| is_blank(c)) {
            line.pop();
        }
        if !line.is_empty() {
            lines.push(line.concat());
        }
    }

    WrappedCaption { lines }
}

pub fn bar_height(line_count: usize, font_size: u32, text_padding: u32) -> u32 {
    line_count as u32 * font_size + 2 * text_padding
}

/// Random top edge for the caption bar within the configured band.
///
/// The band's lower edge is pulled up so the bar never runs past the bottom of
/// the crop; if that empties the band the position collapses to that edge.
/// A bar taller than the crop is pinned to the top.
pub fn place_bar<R: Rng + ?Sized>(
    crop_height: u32,
    bar_height: u32,
    min_percent: u32,
    max_percent: u32,
    rng: &mut R,
) -> u32 {
    let h = crop_height as i64;
    let mut min_y = h * min_percent as i64 / 100;
    let mut max_y = h * max_percent as i64 / 100;

    max_y = max_y.min(h - bar_height as i64);
    min_y = min_y.max(0);
    if min_y > max_y {
        min_y = max_y;
    }
    if max_y < 0 {
        return 0;
    }

    rng.gen_range(min_y..=max_y) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarRect {
    pub y: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometrySpec {
    pub crop: CropRect,
    pub caption: WrappedCaption,
    pub bar: BarRect,
}

impl GeometrySpec {
    pub fn compute<R: Rng + ?Sized>(
        settings: &RenderSettings,
        img_w: u32,
        img_h: u32,
        caption: &str,
        rng: &mut R,
    ) -> Self {
        let crop = crop_to_aspect(img_w, img_h);
        let caption = wrap_caption(caption, crop.width, settings.font_size);
        let height = bar_height(caption.line_count(), settings.font_size, settings.text_padding);
        let y = place_bar(
            crop.height,
            height,
            settings.min_bar_percent,
            settings.max_bar_percent,
            rng,
        );

        Self {
            crop,
            caption,
            bar: BarRect { y, height },
        }
    }

    /// Bar top as a percentage of crop height, for logging.
    pub fn bar_percent(&self) -> f64 {
        if self.crop.height == 0 {
            return 0.0;
        }
        self.bar.y as f64 / self.crop.height as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn landscape_crops_width_and_centers() {
        let crop = crop_to_aspect(1920, 1080);
        assert_eq!(
            crop,
            CropRect {
                width: 607,
                height: 1080,
                x: 656,
                y: 0
            }
        );
    }

    #[test]
    fn tall_image_crops_height_and_centers() {
        let crop = crop_to_aspect(900, 2000);
        assert_eq!(
            crop,
            CropRect {
                width: 900,
                height: 1600,
                x: 0,
                y: 200
            }
        );
    }

    #[test]
    fn exact_aspect_is_untouched() {
        let crop = crop_to_aspect(1080, 1920);
        assert_eq!((crop.width, crop.height, crop.x, crop.y), (1080, 1920, 0, 0));
    }

    #[test]
    fn crop_always_fits_and_keeps_aspect() {
        let sizes = [
            (1, 1),
            (1, 1000),
            (1000, 1),
            (3, 7),
            (640, 480),
            (1081, 1919),
            (4000, 3000),
            (1079, 1920),
            (17, 31),
        ];
        for (w, h) in sizes {
            let c = crop_to_aspect(w, h);
            assert!(c.width > 0 && c.width <= w, "{w}x{h}: {c:?}");
            assert!(c.height > 0 && c.height <= h, "{w}x{h}: {c:?}");
            assert!(c.x + c.width <= w && c.y + c.height <= h, "{w}x{h}: {c:?}");
            if c.width > 16 && c.height > 16 {
                let ratio = c.width as f64 / c.height as f64;
                let tolerance = 1.0 / c.height.min(c.width) as f64 + 1e-9;
                assert!((ratio - 0.5625).abs() <= tolerance, "{w}x{h}: {ratio}");
            }
        }
    }

    #[test]
    fn max_chars_never_drops_below_floor() {
        assert_eq!(max_chars_per_line(100, 20), 30);
        assert_eq!(max_chars_per_line(5, 20), 30);
        // (1080 - 10) / 12 = 89.16
        assert_eq!(max_chars_per_line(1080, 20), 89);
    }

    #[test]
    fn wrap_is_greedy_on_word_boundaries() {
        let text = "the quick brown fox jumps over the lazy dog and keeps running far away";
        let wrapped = wrap_caption(text, 300, 20);
        assert_eq!(
            wrapped.lines,
            vec![
                "the quick brown fox jumps over".to_string(),
                "the lazy dog and keeps running".to_string(),
                "far away".to_string(),
            ]
        );
        assert_eq!(wrapped.line_count(), 3);
    }

    #[test]
    fn wrap_keeps_long_words_and_hyphens_whole() {
        let long = "a".repeat(45);
        let text = format!("short {long} well-known-hyphenated-compound-word-here end");
        let wrapped = wrap_caption(&text, 100, 20);
        let limit = max_chars_per_line(100, 20);
        for line in &wrapped.lines {
            let n = line.chars().count();
            assert!(n <= limit || !line.contains(' '), "{line:?}");
        }
        assert!(wrapped.lines.contains(&long));
        assert!(
            wrapped
                .lines
                .iter()
                .any(|l| l.contains("well-known-hyphenated-compound-word-here"))
        );
    }

    #[test]
    fn interior_space_runs_count_toward_width() {
        // 15 + 2 + 14 = 31 characters against a 30 character limit
        let text = format!("{}  {}", "a".repeat(15), "b".repeat(14));
        let wrapped = wrap_caption(&text, 300, 20);
        assert_eq!(wrapped.lines, vec!["a".repeat(15), "b".repeat(14)]);

        let wrapped = wrap_caption("hello  world\tagain", 300, 20);
        assert_eq!(wrapped.lines, vec!["hello  world    again".to_string()]);
    }

    #[test]
    fn space_runs_at_breaks_are_dropped() {
        let text = format!("{}     {}", "a".repeat(28), "b".repeat(10));
        let wrapped = wrap_caption(&text, 300, 20);
        assert_eq!(wrapped.lines, vec!["a".repeat(28), "b".repeat(10)]);
    }

    #[test]
    fn empty_caption_counts_as_one_line() {
        let wrapped = wrap_caption("   ", 600, 20);
        assert!(wrapped.lines.is_empty());
        assert_eq!(wrapped.line_count(), 1);
        assert_eq!(bar_height(wrapped.line_count(), 20, 10), 40);
    }

    #[test]
    fn bar_stays_inside_crop() {
        let mut rng = StdRng::seed_from_u64(7);
        for h in [1u32, 40, 41, 100, 607, 1080, 1920] {
            for bar in [1u32, 20, 40, 60, 100, 500] {
                if bar > h {
                    continue;
                }
                for _ in 0..50 {
                    let y = place_bar(h, bar, 45, 70, &mut rng);
                    assert!(y + bar <= h, "h={h} bar={bar} y={y}");
                }
            }
        }
    }

    #[test]
    fn bar_lands_in_band_when_room() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let y = place_bar(1000, 40, 45, 70, &mut rng);
            assert!((450..=700).contains(&y), "{y}");
        }
    }

    #[test]
    fn bar_collapses_to_bottom_edge_when_band_is_too_low() {
        let mut rng = StdRng::seed_from_u64(3);
        // min_y = 45, max_y clamps to 100 - 80 = 20 -> collapsed range [20, 20]
        assert_eq!(place_bar(100, 80, 45, 70, &mut rng), 20);
    }

    #[test]
    fn oversized_bar_pins_to_top() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(place_bar(30, 80, 45, 70, &mut rng), 0);
    }

    #[test]
    fn compute_is_reproducible_with_seeded_rng() {
        let settings = RenderSettings::default();
        let a = GeometrySpec::compute(&settings, 1920, 1080, "hello there", &mut StdRng::seed_from_u64(9));
        let b = GeometrySpec::compute(&settings, 1920, 1080, "hello there", &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
        assert_eq!(a.bar.height, 40);
        assert!(a.bar.y + a.bar.height <= a.crop.height);
    }
}
