use anyhow::{anyhow, Context, Result};
use fontdue::{Font, FontSettings};
use std::path::Path;

/// Fallbacks probed when no font is passed explicitly.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/System/Library/Fonts/Monaco.ttf",
    "C:\\Windows\\Fonts\\consola.ttf",
];

pub fn load_font_from_url(url: &str) -> Result<Vec<u8>> {
    log::info!("Downloading font from {url}");
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("font request to {url} failed"))?;
    Ok(response.bytes().context("failed to read font bytes")?.to_vec())
}

/// CPU-side text compositor for axis labels, title and time readouts.
/// Rasterizes with fontdue and alpha-blends onto the RGBA readback.
pub struct TextOverlay {
    font: Font,
    font_size: f32,
}

impl TextOverlay {
    pub fn new(
        font_size: f32,
        font_path: Option<&Path>,
        font_bytes: Option<&[u8]>,
    ) -> Result<Self> {
        let bytes: Vec<u8> = if let Some(bytes) = font_bytes {
            bytes.to_vec()
        } else if let Some(path) = font_path {
            std::fs::read(path)
                .with_context(|| format!("failed to read font {}", path.display()))?
        } else {
            find_system_font()
                .context("no usable font found; pass --font or --font-url")?
        };

        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| anyhow!("failed to parse font: {e}"))?;
        Ok(Self { font, font_size })
    }

    /// Composite text onto an RGBA pixel buffer at the given position.
    pub fn composite(
        &self,
        pixels: &mut [u8],
        width: u32,
        height: u32,
        text: &str,
        x: u32,
        y: u32,
        color: [u8; 4],
    ) {
        let mut cursor_x = x as i32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.font_size);
            let glyph_y = y as i32 + self.font_size as i32 - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let alpha = bitmap[gy * metrics.width + gx];
                    if alpha == 0 {
                        continue;
                    }

                    let px = cursor_x + gx as i32;
                    let py = glyph_y + gy as i32;

                    if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                        continue;
                    }

                    let idx = ((py as u32 * width + px as u32) * 4) as usize;
                    if idx + 3 >= pixels.len() {
                        continue;
                    }

                    let a = alpha as f32 / 255.0 * (color[3] as f32 / 255.0);
                    let inv_a = 1.0 - a;
                    pixels[idx] = (color[0] as f32 * a + pixels[idx] as f32 * inv_a) as u8;
                    pixels[idx + 1] = (color[1] as f32 * a + pixels[idx + 1] as f32 * inv_a) as u8;
                    pixels[idx + 2] = (color[2] as f32 * a + pixels[idx + 2] as f32 * inv_a) as u8;
                    pixels[idx + 3] = 255;
                }
            }

            cursor_x += metrics.advance_width as i32;
        }
    }

    /// Measure the width of rendered text in pixels.
    pub fn measure_width(&self, text: &str) -> u32 {
        let mut width = 0.0f32;
        for ch in text.chars() {
            let (metrics, _) = self.font.rasterize(ch, self.font_size);
            width += metrics.advance_width;
        }
        width.ceil() as u32
    }

    pub fn line_height(&self) -> u32 {
        self.font_size.ceil() as u32
    }
}

fn find_system_font() -> Option<Vec<u8>> {
    SYSTEM_FONTS.iter().find_map(|path| {
        let bytes = std::fs::read(path).ok()?;
        log::debug!("Using system font {path}");
        Some(bytes)
    })
}
