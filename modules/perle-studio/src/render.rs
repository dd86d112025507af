//! Still card rendering: one perla centered on a solid background.

use std::path::Path;

use fontdue::{Font, FontSettings};
use image::{ImageFormat, Rgb, RgbImage};
use tracing::debug;
use typed_builder::TypedBuilder;

use perle_common::file_config::VideoConfig;

use crate::error::{ProductionError, Result, Stage};

/// Font size decrement while searching for a size that fits.
const SHRINK_STEP: f32 = 4.0;
/// Footer text size relative to the body.
const FOOTER_SCALE: f32 = 0.55;

#[derive(Debug, Clone, TypedBuilder)]
pub struct CardStyle {
    #[builder(default = 1080)]
    pub width: u32,
    #[builder(default = 1920)]
    pub height: u32,
    #[builder(default = 72.0)]
    pub font_size: f32,
    #[builder(default = 40.0)]
    pub min_font_size: f32,
    #[builder(default = 1.3)]
    pub line_spacing: f32,
    #[builder(default = 90)]
    pub margin: u32,
    #[builder(default = Rgb([0x1b, 0x1b, 0x2f]))]
    pub background: Rgb<u8>,
    #[builder(default = Rgb([0xf5, 0xf5, 0xf5]))]
    pub foreground: Rgb<u8>,
    #[builder(default = Rgb([0xe7, 0xb7, 0x5f]))]
    pub accent: Rgb<u8>,
}

impl CardStyle {
    pub fn from_config(cfg: &VideoConfig) -> Result<Self> {
        let color = |raw: &str, field: &str| {
            parse_hex_color(raw).ok_or_else(|| {
                ProductionError::config(Stage::Render, format!("video.{field} is not a #rrggbb color: {raw}"))
            })
        };
        Ok(Self::builder()
            .width(cfg.width)
            .height(cfg.height)
            .font_size(cfg.font_size)
            .min_font_size(cfg.min_font_size.min(cfg.font_size))
            .line_spacing(cfg.line_spacing)
            .margin(cfg.margin)
            .background(color(&cfg.background, "background")?)
            .foreground(color(&cfg.foreground, "foreground")?)
            .accent(color(&cfg.accent, "accent")?)
            .build())
    }

    fn max_line_width(&self) -> f32 {
        self.width.saturating_sub(2 * self.margin) as f32
    }
}

pub fn parse_hex_color(raw: &str) -> Option<Rgb<u8>> {
    let hex = raw.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

/// Greedy word wrap. Words are packed onto a line while the line stays within
/// `max_width` as reported by `measure`. A word wider than `max_width` on its
/// own still gets a line to itself; words are never split.
pub fn wrap_words<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(word);
            continue;
        }
        let candidate = format!("{line} {word}");
        if measure(&candidate) <= max_width {
            line = candidate;
        } else {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Draws text cards to PNG files.
pub trait StillRenderer: Send + Sync {
    fn render(&self, text: &str, footer: Option<&str>, out: &Path) -> Result<()>;
}

/// Stands in when no usable font is configured; every render is a
/// configuration error.
pub struct DisabledRenderer {
    reason: String,
}

impl DisabledRenderer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl StillRenderer for DisabledRenderer {
    fn render(&self, _text: &str, _footer: Option<&str>, _out: &Path) -> Result<()> {
        Err(ProductionError::config(Stage::Render, self.reason.clone()))
    }
}

pub struct CardRenderer {
    font: Font,
    style: CardStyle,
}

impl CardRenderer {
    pub fn from_font_bytes(bytes: &[u8], style: CardStyle) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| ProductionError::config(Stage::Render, format!("font parse failed: {e}")))?;
        Ok(Self { font, style })
    }

    pub fn from_font_file(path: &Path, style: CardStyle) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            ProductionError::config(Stage::Render, format!("cannot read font {}: {e}", path.display()))
        })?;
        Self::from_font_bytes(&bytes, style)
    }

    fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars()
            .map(|c| self.font.metrics(c, size).advance_width)
            .sum()
    }

    fn ascent(&self, size: f32) -> f32 {
        self.font
            .horizontal_line_metrics(size)
            .map(|m| m.ascent)
            .unwrap_or(size * 0.8)
    }

    /// Largest size (from `font_size` down to `min_font_size`) whose wrapped
    /// block fits the space above the footer.
    fn fit(&self, text: &str, available_height: f32) -> (f32, Vec<String>) {
        let max_width = self.style.max_line_width();
        let mut size = self.style.font_size;
        loop {
            let lines = wrap_words(text, max_width, |s| self.text_width(s, size));
            let block = lines.len() as f32 * size * self.style.line_spacing;
            if block <= available_height || size - SHRINK_STEP < self.style.min_font_size {
                return (size, lines);
            }
            size -= SHRINK_STEP;
        }
    }

    fn draw_line(&self, img: &mut RgbImage, line: &str, size: f32, baseline: f32, color: Rgb<u8>) {
        let width = self.text_width(line, size);
        let mut pen_x = (self.style.width as f32 - width) / 2.0;

        for c in line.chars() {
            let (metrics, bitmap) = self.font.rasterize(c, size);
            let left = pen_x.round() as i32 + metrics.xmin;
            let top = baseline.round() as i32 - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = bitmap[gy * metrics.width + gx];
                    if coverage == 0 {
                        continue;
                    }
                    let x = left + gx as i32;
                    let y = top + gy as i32;
                    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
                        continue;
                    }
                    let px = img.get_pixel_mut(x as u32, y as u32);
                    *px = blend(*px, color, coverage);
                }
            }
            pen_x += metrics.advance_width;
        }
    }
}

fn blend(under: Rgb<u8>, over: Rgb<u8>, coverage: u8) -> Rgb<u8> {
    let a = coverage as u16;
    let mix = |u: u8, o: u8| ((o as u16 * a + u as u16 * (255 - a)) / 255) as u8;
    Rgb([
        mix(under[0], over[0]),
        mix(under[1], over[1]),
        mix(under[2], over[2]),
    ])
}

impl StillRenderer for CardRenderer {
    fn render(&self, text: &str, footer: Option<&str>, out: &Path) -> Result<()> {
        let style = &self.style;
        let mut img = RgbImage::from_pixel(style.width, style.height, style.background);

        let footer_size = style.font_size * FOOTER_SCALE;
        let footer_band = if footer.is_some() { footer_size * 3.0 } else { 0.0 };
        let available = style.height.saturating_sub(2 * style.margin) as f32 - footer_band;

        let (size, lines) = self.fit(text, available);
        let line_height = size * style.line_spacing;
        let block = lines.len() as f32 * line_height;
        let top = style.margin as f32 + ((available - block) / 2.0).max(0.0);
        let ascent = self.ascent(size);

        debug!(lines = lines.len(), font_size = size, "Rendering card");
        for (i, line) in lines.iter().enumerate() {
            let baseline = top + i as f32 * line_height + ascent;
            self.draw_line(&mut img, line, size, baseline, style.foreground);
        }

        if let Some(footer) = footer {
            let baseline = style.height as f32 - style.margin as f32 - footer_size;
            self.draw_line(&mut img, footer, footer_size, baseline, style.accent);
        }

        img.save_with_format(out, ImageFormat::Png).map_err(|e| {
            ProductionError::failed(Stage::Render, format!("cannot write {}: {e}", out.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is 10 units wide.
    fn fixed(s: &str) -> f32 {
        s.chars().count() as f32 * 10.0
    }

    #[test]
    fn packs_words_greedily() {
        let lines = wrap_words("uno due tre quattro", 80.0, fixed);
        assert_eq!(lines, vec!["uno due", "tre", "quattro"]);
    }

    #[test]
    fn overwide_word_gets_its_own_line() {
        let lines = wrap_words("a supercalifragilistichespiralidoso b", 100.0, fixed);
        assert_eq!(lines, vec!["a", "supercalifragilistichespiralidoso", "b"]);
    }

    #[test]
    fn single_overwide_word_is_not_truncated() {
        let word = "precipitevolissimevolmente";
        let lines = wrap_words(word, 50.0, fixed);
        assert_eq!(lines, vec![word]);
    }

    #[test]
    fn every_line_fits_unless_single_word() {
        let text = "Il prof ha detto che la lavagna è un tablet analogico e nessuno ha riso";
        for line in wrap_words(text, 120.0, fixed) {
            assert!(fixed(&line) <= 120.0 || !line.contains(' '));
        }
    }

    #[test]
    fn empty_text_has_no_lines() {
        assert!(wrap_words("   ", 100.0, fixed).is_empty());
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#ff8000"), Some(Rgb([255, 128, 0])));
        assert_eq!(parse_hex_color("ff8000"), None);
        assert_eq!(parse_hex_color("#ff80"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
    }

    #[test]
    fn blend_extremes() {
        let bg = Rgb([0, 0, 0]);
        let fg = Rgb([200, 100, 50]);
        assert_eq!(blend(bg, fg, 255), fg);
        assert_eq!(blend(bg, fg, 0), bg);
    }

    #[test]
    fn style_from_default_config() {
        let style = CardStyle::from_config(&VideoConfig::default()).unwrap();
        assert_eq!((style.width, style.height), (1080, 1920));
        assert_eq!(style.max_line_width(), 900.0);
    }

    #[test]
    fn disabled_renderer_reports_reason() {
        let err = DisabledRenderer::new("FONT_PATH is not set")
            .render("testo", None, Path::new("/tmp/x.png"))
            .unwrap_err();
        assert_eq!(err.to_string(), "render not configured: FONT_PATH is not set");
    }

    #[test]
    fn bad_color_is_a_config_error() {
        let cfg = VideoConfig {
            background: "navy".into(),
            ..VideoConfig::default()
        };
        assert!(matches!(
            CardStyle::from_config(&cfg),
            Err(ProductionError::Config { stage: Stage::Render, .. })
        ));
    }
}
