use anyhow::{bail, Context, Result};

/// Linear RGB color, components in 0.0..=1.0.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Self = Self { r: 1.0, g: 1.0, b: 1.0 };

    pub fn from_hex(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 {
            bail!("expected a 6-digit hex color, got {s:?}");
        }
        let channel = |range: std::ops::Range<usize>| -> Result<f32> {
            let byte = u8::from_str_radix(&hex[range], 16)
                .with_context(|| format!("invalid hex color {s:?}"))?;
            Ok(byte as f32 / 255.0)
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    pub fn lerp(a: Self, b: Self, t: f32) -> Self {
        Self {
            r: a.r + (b.r - a.r) * t,
            g: a.g + (b.g - a.g) * t,
            b: a.b + (b.b - a.b) * t,
        }
    }

    pub fn scale(self, k: f32) -> Self {
        Self {
            r: self.r * k,
            g: self.g * k,
            b: self.b * k,
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn with_alpha(self, a: f32) -> [f32; 4] {
        [self.r, self.g, self.b, a]
    }
}

/// One or two opaque interpolation endpoints supplied by the caller's
/// category-to-color lookup.
#[derive(Clone, Debug)]
pub struct ColorScheme {
    primary: Color,
    secondary: Option<Color>,
}

impl ColorScheme {
    pub fn new(colors: &[Color]) -> Result<Self> {
        match colors {
            [primary] => Ok(Self {
                primary: *primary,
                secondary: None,
            }),
            [primary, secondary] => Ok(Self {
                primary: *primary,
                secondary: Some(*secondary),
            }),
            _ => bail!("expected 1 or 2 colors, got {}", colors.len()),
        }
    }

    /// Color for a vertex at `freq_ratio` across the frequency axis with
    /// normalized amplitude `level`. A single color is used flat; a pair is
    /// interpolated along the frequency axis and darkened so quiet cells
    /// read darker than loud ones.
    pub fn vertex_color(&self, freq_ratio: f32, level: f32) -> Color {
        match self.secondary {
            None => self.primary,
            Some(secondary) => Color::lerp(self.primary, secondary, freq_ratio)
                .scale(0.3 + 0.7 * level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_with_and_without_hash() {
        let teal = Color::from_hex("#81A596").unwrap();
        assert!((teal.r - 0x81 as f32 / 255.0).abs() < 1e-6);
        assert!((teal.g - 0xA5 as f32 / 255.0).abs() < 1e-6);
        assert!((teal.b - 0x96 as f32 / 255.0).abs() < 1e-6);
        assert_eq!(Color::from_hex("ffffff").unwrap(), Color::WHITE);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(Color::from_hex("#fff").is_err());
        assert!(Color::from_hex("#gggggg").is_err());
    }

    #[test]
    fn lerp_hits_endpoints() {
        let a = Color { r: 0.0, g: 0.5, b: 1.0 };
        let b = Color { r: 1.0, g: 0.0, b: 0.0 };
        assert_eq!(Color::lerp(a, b, 0.0), a);
        assert_eq!(Color::lerp(a, b, 1.0), b);
    }

    #[test]
    fn scheme_requires_one_or_two_colors() {
        assert!(ColorScheme::new(&[]).is_err());
        assert!(ColorScheme::new(&[Color::WHITE]).is_ok());
        assert!(ColorScheme::new(&[Color::WHITE; 2]).is_ok());
        assert!(ColorScheme::new(&[Color::WHITE; 3]).is_err());
    }

    #[test]
    fn single_color_ignores_amplitude() {
        let scheme = ColorScheme::new(&[Color::WHITE]).unwrap();
        assert_eq!(scheme.vertex_color(0.3, 0.0), Color::WHITE);
        assert_eq!(scheme.vertex_color(0.9, 1.0), Color::WHITE);
    }

    #[test]
    fn dual_colors_darken_quiet_cells() {
        let a = Color { r: 1.0, g: 0.0, b: 0.0 };
        let b = Color { r: 0.0, g: 0.0, b: 1.0 };
        let scheme = ColorScheme::new(&[a, b]).unwrap();
        // Full amplitude at the endpoints reproduces the inputs exactly.
        assert_eq!(scheme.vertex_color(0.0, 1.0), a);
        assert_eq!(scheme.vertex_color(1.0, 1.0), b);
        // Silence reads at the 0.3 floor, never black.
        let quiet = scheme.vertex_color(0.0, 0.0);
        assert!((quiet.r - 0.3).abs() < 1e-6);
    }
}
