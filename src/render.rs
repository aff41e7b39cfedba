// src/render.rs
//! Word-cloud rendering engines.
//!
//! `PngRenderer` rasterises with a TrueType font; `SvgRenderer` needs no
//! font file and is used when none is available.

use ab_glyph::{point, Font, FontVec, GlyphId, PxScale, ScaleFont};
use image::codecs::png::PngEncoder;
use image::{imageops, ExtendedColorType, GrayImage, ImageEncoder, Rgb, RgbImage};
use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::WordCloudConfig;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Common locations of a sans-serif TrueType font.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

// matplotlib viridis sampled at 0.0, 0.1, ..., 1.0
const VIRIDIS: [[u8; 3]; 11] = [
    [68, 1, 84],
    [72, 36, 117],
    [65, 68, 135],
    [53, 95, 141],
    [42, 120, 142],
    [33, 145, 140],
    [34, 168, 132],
    [68, 191, 112],
    [122, 209, 81],
    [189, 223, 38],
    [253, 231, 37],
];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to read font {path}: {source}")]
    FontIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid font data: {0}")]
    Font(String),

    #[error("Nothing to render: corpus has no countable words")]
    EmptyCorpus,

    #[error("Nothing to render: no word fits on the canvas")]
    EmptyLayout,

    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Svg,
}

impl ImageKind {
    /// MIME type of the encoded image bytes.
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Png => f.write_str("png"),
            Self::Svg => f.write_str("svg"),
        }
    }
}

/// One word positioned on the canvas. `(x, y)` is the top-left corner of
/// its box; for vertical words the box is already rotated.
#[derive(Debug, Clone)]
pub struct PlacedWord {
    pub text: String,
    pub font_size: f32,
    pub x: u32,
    pub y: u32,
    pub vertical: bool,
    pub color: Rgb<u8>,
}

#[derive(Debug, Clone)]
pub struct CloudLayout {
    pub width: u32,
    pub height: u32,
    pub contour_width: u32,
    pub words: Vec<PlacedWord>,
}

pub trait CloudRenderer: Send + Sync {
    fn kind(&self) -> ImageKind;

    /// Horizontal extent `(width, height)` of `word` at `font_size` px.
    fn measure(&self, word: &str, font_size: f32) -> (u32, u32);

    fn render(&self, layout: &CloudLayout) -> Result<Vec<u8>, RenderError>;
}

/* ---------------------------------- PNG ----------------------------------- */

pub struct PngRenderer {
    font: FontVec,
}

impl PngRenderer {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, RenderError> {
        let font = FontVec::try_from_vec(bytes).map_err(|e| RenderError::Font(e.to_string()))?;
        Ok(Self { font })
    }

    pub fn from_path(path: &Path) -> Result<Self, RenderError> {
        let bytes = std::fs::read(path).map_err(|source| RenderError::FontIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes)
    }

    /// Walks the glyphs of `word`, yielding each id with its pen position.
    fn glyph_run(&self, word: &str, scale: PxScale) -> (Vec<(GlyphId, f32)>, f32) {
        let scaled = self.font.as_scaled(scale);
        let mut caret = 0.0f32;
        let mut prev: Option<GlyphId> = None;
        let mut run = Vec::with_capacity(word.len());
        for c in word.chars() {
            let id = scaled.glyph_id(c);
            if let Some(p) = prev {
                caret += scaled.kern(p, id);
            }
            run.push((id, caret));
            caret += scaled.h_advance(id);
            prev = Some(id);
        }
        (run, caret)
    }

    /// Coverage mask of `word` laid out horizontally.
    fn rasterize(&self, word: &str, font_size: f32) -> GrayImage {
        let scale = PxScale::from(font_size);
        let (w, h) = self.measure(word, font_size);
        let mut mask = GrayImage::new(w.max(1), h.max(1));
        let ascent = self.font.as_scaled(scale).ascent();

        let (run, _) = self.glyph_run(word, scale);
        for (id, x) in run {
            let glyph = id.with_scale_and_position(scale, point(x, ascent));
            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i64 + gx as i64;
                let py = bounds.min.y as i64 + gy as i64;
                if px < 0 || py < 0 || px >= mask.width() as i64 || py >= mask.height() as i64 {
                    return;
                }
                let cell = mask.get_pixel_mut(px as u32, py as u32);
                cell.0[0] = cell.0[0].max((coverage.clamp(0.0, 1.0) * 255.0) as u8);
            });
        }
        mask
    }
}

impl CloudRenderer for PngRenderer {
    fn kind(&self) -> ImageKind {
        ImageKind::Png
    }

    fn measure(&self, word: &str, font_size: f32) -> (u32, u32) {
        let scale = PxScale::from(font_size);
        let scaled = self.font.as_scaled(scale);
        let (_, width) = self.glyph_run(word, scale);
        let height = scaled.ascent() - scaled.descent();
        (width.ceil().max(1.0) as u32, height.ceil().max(1.0) as u32)
    }

    fn render(&self, layout: &CloudLayout) -> Result<Vec<u8>, RenderError> {
        if layout.words.is_empty() {
            return Err(RenderError::EmptyLayout);
        }

        let mut img = RgbImage::from_pixel(layout.width, layout.height, WHITE);
        for word in &layout.words {
            let mut mask = self.rasterize(&word.text, word.font_size);
            if word.vertical {
                // 90° counter-clockwise
                mask = imageops::rotate270(&mask);
            }
            blend_mask(&mut img, &mask, word.x, word.y, word.color);
        }
        draw_frame(&mut img, layout.contour_width, BLACK);

        let mut buf = Vec::new();
        PngEncoder::new(&mut buf).write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(buf)
    }
}

fn blend_mask(img: &mut RgbImage, mask: &GrayImage, x0: u32, y0: u32, color: Rgb<u8>) {
    for (mx, my, cov) in mask.enumerate_pixels() {
        let alpha = cov.0[0];
        if alpha == 0 {
            continue;
        }
        let (x, y) = (x0 + mx, y0 + my);
        if x >= img.width() || y >= img.height() {
            continue;
        }
        let under = *img.get_pixel(x, y);
        img.put_pixel(x, y, interpolate_color(under, color, alpha as f64 / 255.0));
    }
}

/// Solid border of `thickness` px along the canvas edges.
pub fn draw_frame(img: &mut RgbImage, thickness: u32, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    let t = thickness.min(w / 2).min(h / 2);
    for y in 0..h {
        for x in 0..w {
            if x < t || y < t || x >= w - t || y >= h - t {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/* ---------------------------------- SVG ----------------------------------- */

/// Font-free renderer; text metrics are approximated from typical
/// sans-serif proportions.
pub struct SvgRenderer;

const SVG_ADVANCE: f32 = 0.6;
const SVG_ASCENT: f32 = 0.93;
const SVG_DESCENT: f32 = 0.24;
const SVG_FONT_FAMILY: &str = "DejaVu Sans, Arial, Helvetica, sans-serif";

impl CloudRenderer for SvgRenderer {
    fn kind(&self) -> ImageKind {
        ImageKind::Svg
    }

    fn measure(&self, word: &str, font_size: f32) -> (u32, u32) {
        let width = word.chars().count() as f32 * font_size * SVG_ADVANCE;
        let height = font_size * (SVG_ASCENT + SVG_DESCENT);
        (width.ceil().max(1.0) as u32, height.ceil().max(1.0) as u32)
    }

    fn render(&self, layout: &CloudLayout) -> Result<Vec<u8>, RenderError> {
        if layout.words.is_empty() {
            return Err(RenderError::EmptyLayout);
        }

        let mut svg = String::new();
        // write! into a String cannot fail
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = layout.width,
            h = layout.height
        );
        let _ = write!(
            svg,
            r#"<rect width="100%" height="100%" style="fill:{}"/>"#,
            css_rgb(WHITE)
        );
        let _ = write!(svg, r#"<g font-family="{}">"#, SVG_FONT_FAMILY);

        for word in &layout.words {
            let ascent = word.font_size * SVG_ASCENT;
            let transform = if word.vertical {
                let (w, _) = self.measure(&word.text, word.font_size);
                format!(
                    "translate({:.1},{:.1}) rotate(-90)",
                    word.x as f32 + ascent,
                    (word.y + w) as f32
                )
            } else {
                format!("translate({:.1},{:.1})", word.x as f32, word.y as f32 + ascent)
            };
            let _ = write!(
                svg,
                r#"<text transform="{}" font-size="{:.0}" style="fill:{}">{}</text>"#,
                transform,
                word.font_size,
                css_rgb(word.color),
                escape_xml(&word.text)
            );
        }
        svg.push_str("</g>");

        if layout.contour_width > 0 {
            let half = layout.contour_width as f32 / 2.0;
            let _ = write!(
                svg,
                r#"<rect x="{half}" y="{half}" width="{}" height="{}" fill="none" stroke="{}" stroke-width="{}"/>"#,
                layout.width as f32 - layout.contour_width as f32,
                layout.height as f32 - layout.contour_width as f32,
                css_rgb(BLACK),
                layout.contour_width
            );
        }
        svg.push_str("</svg>");
        Ok(svg.into_bytes())
    }
}

fn css_rgb(c: Rgb<u8>) -> String {
    format!("rgb({},{},{})", c.0[0], c.0[1], c.0[2])
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/* --------------------------------- Colours -------------------------------- */

pub fn interpolate_color(c1: Rgb<u8>, c2: Rgb<u8>, t: f64) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    Rgb([mix(c1.0[0], c2.0[0]), mix(c1.0[1], c2.0[1]), mix(c1.0[2], c2.0[2])])
}

/// Viridis colormap at `t` in [0, 1].
pub fn viridis(t: f64) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let pos = t * (VIRIDIS.len() - 1) as f64;
    let i = (pos.floor() as usize).min(VIRIDIS.len() - 2);
    interpolate_color(Rgb(VIRIDIS[i]), Rgb(VIRIDIS[i + 1]), pos - i as f64)
}

/* ------------------------------- Selection -------------------------------- */

pub fn discover_font() -> Option<PathBuf> {
    FONT_CANDIDATES.iter().map(PathBuf::from).find(|p| p.is_file())
}

/// PNG with the configured font, else with a system font, else SVG.
/// A configured font that fails to load is an error.
pub fn select_renderer(cfg: &WordCloudConfig) -> Result<Arc<dyn CloudRenderer>, RenderError> {
    if let Some(path) = &cfg.font_path {
        let r = PngRenderer::from_path(path)?;
        info!("Word cloud renderer - kind=png, font={}", path.display());
        return Ok(Arc::new(r));
    }

    match discover_font() {
        Some(path) => match PngRenderer::from_path(&path) {
            Ok(r) => {
                info!("Word cloud renderer - kind=png, font={}", path.display());
                Ok(Arc::new(r))
            }
            Err(e) => {
                warn!("Unusable system font, falling back to SVG - error={}", e);
                Ok(Arc::new(SvgRenderer))
            }
        },
        None => {
            warn!(
                "No TrueType font found, word clouds will be SVG (mediaType={}) - set wordcloud.font_path for PNG",
                ImageKind::Svg.media_type()
            );
            Ok(Arc::new(SvgRenderer))
        }
    }
}
