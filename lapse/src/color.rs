//! Chart colours: the palette and year gradients

use serde::Serialize;

pub const RED: &str = "#e91e63";
pub const BLUE: &str = "#03a9f4";
pub const PURPLE: &str = "#673ab7";
pub const GRAY: &str = "#90a4ae";
pub const LIGHT_GRAY: &str = "#eceff1";
pub const DARK_GRAY: &str = "#455a64";

/// 8-bit sRGB colour, alpha dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse any CSS colour (`#rgb`, `#rrggbb`, `rgb()`, `hsl()`, names)
    pub fn parse(text: &str) -> Option<Self> {
        let color = csscolorparser::parse(text.trim()).ok()?;
        let [r, g, b, _] = color.to_rgba8();
        Some(Self { r, g, b })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

fn mix(a: u8, b: u8, t: f64) -> u8 {
    let value = a as f64 + (b as f64 - a as f64) * t;
    value.round().clamp(0.0, 255.0) as u8
}

/// Interpolate each channel from `a` (t = 0) to `b` (t = 1).
///
/// `t` is clamped to [0, 1] and NaN counts as 0, so every channel moves
/// monotonically toward `b` as `t` grows.
pub fn blend_color(a: Rgb, b: Rgb, t: f64) -> Rgb {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    Rgb {
        r: mix(a.r, b.r, t),
        g: mix(a.g, b.g, t),
        b: mix(a.b, b.b, t),
    }
}

/// `blend_color` over CSS strings. An unparsable end is treated as black.
pub fn blend_hex(a: &str, b: &str, t: f64) -> String {
    let a = Rgb::parse(a).unwrap_or(Rgb::BLACK);
    let b = Rgb::parse(b).unwrap_or(Rgb::BLACK);
    blend_color(a, b, t).to_hex()
}

/// Colour of the `index`th year in a series of `count`, red through blue.
pub fn year_color(index: usize, count: usize) -> String {
    if count <= 1 {
        return RED.to_string();
    }
    let t = index.min(count - 1) as f64 / (count - 1) as f64;
    blend_hex(RED, BLUE, t)
}
