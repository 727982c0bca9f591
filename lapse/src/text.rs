//! Text measurement, line wrapping and label formatting

use once_cell::sync::Lazy;
use regex::Regex;

/// Anything that can tell how wide a string renders at a font size (px).
pub trait TextMeasure {
    fn measure_text(&self, text: &str, font_size: f64) -> f64;
}

impl<F> TextMeasure for F
where
    F: Fn(&str, f64) -> f64,
{
    fn measure_text(&self, text: &str, font_size: f64) -> f64 {
        self(text, font_size)
    }
}

/// Every character is `em` font sizes wide. Deterministic; meant for tests
/// and monospace output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedWidthMeasure {
    pub em: f64,
}

impl Default for FixedWidthMeasure {
    fn default() -> Self {
        Self { em: 0.6 }
    }
}

impl TextMeasure for FixedWidthMeasure {
    fn measure_text(&self, text: &str, font_size: f64) -> f64 {
        text.chars().count() as f64 * self.em * font_size
    }
}

/// Advance widths in em for printable ASCII (0x20..=0x7e), proportional
/// sans-serif metrics.
#[rustfmt::skip]
const ASCII_ADVANCES: [f64; 95] = [
    // space ! " # $ % & ' ( ) * + , - . /
    0.25, 0.28, 0.36, 0.60, 0.56, 0.78, 0.66, 0.20, 0.32, 0.32, 0.44, 0.58, 0.25, 0.36, 0.25, 0.40,
    // 0-9
    0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56,
    // : ; < = > ? @
    0.25, 0.25, 0.58, 0.58, 0.58, 0.48, 0.90,
    // A-Z
    0.64, 0.62, 0.66, 0.68, 0.58, 0.54, 0.70, 0.70, 0.26, 0.48, 0.62, 0.52, 0.82,
    0.70, 0.74, 0.60, 0.74, 0.62, 0.56, 0.58, 0.68, 0.62, 0.90, 0.60, 0.58, 0.58,
    // [ \ ] ^ _ `
    0.32, 0.40, 0.32, 0.50, 0.50, 0.30,
    // a-z
    0.54, 0.58, 0.50, 0.58, 0.54, 0.32, 0.58, 0.56, 0.24, 0.24, 0.50, 0.26, 0.84,
    0.56, 0.58, 0.58, 0.58, 0.36, 0.46, 0.34, 0.56, 0.50, 0.76, 0.50, 0.50, 0.48,
    // { | } ~
    0.34, 0.24, 0.34, 0.58,
];

/// Width used for characters outside the table
const FALLBACK_ADVANCE: f64 = 0.6;

/// Table-driven measurer approximating a proportional UI font
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GlyphTableMeasure;

impl TextMeasure for GlyphTableMeasure {
    fn measure_text(&self, text: &str, font_size: f64) -> f64 {
        let em: f64 = text
            .chars()
            .map(|c| match c {
                ' '..='~' => ASCII_ADVANCES[c as usize - 0x20],
                _ => FALLBACK_ADVANCE,
            })
            .sum();
        em * font_size
    }
}

/// Greedily pack `items` into lines no wider than `budget`.
///
/// A line is closed when the next item would overflow it and the line
/// already holds something, so an item wider than the budget sits alone on
/// its own line. Order is preserved and nothing is dropped. Empty input
/// gives no lines.
pub fn wrap_by_width<'a, T, L, M>(
    items: &'a [T],
    label: L,
    budget: f64,
    font_size: f64,
    measure: &M,
) -> Vec<Vec<&'a T>>
where
    L: Fn(&T) -> &str,
    M: TextMeasure + ?Sized,
{
    let mut lines: Vec<Vec<&'a T>> = Vec::new();
    let mut total = 0.0;

    for item in items {
        let width = measure.measure_text(label(item), font_size);
        let width = if width.is_finite() { width.max(0.0) } else { 0.0 };

        let overflows = total + width > budget && total > 0.0;
        match lines.last_mut() {
            Some(line) if !overflows => line.push(item),
            _ => {
                lines.push(vec![item]);
                total = 0.0;
            }
        }
        total += width;
    }
    lines
}

static NON_WORD_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9.\-]").unwrap());

/// `gene_7157` -> `Gene 7157`
pub fn to_human_case(text: &str) -> String {
    NON_WORD_CHARS
        .replace_all(text, " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

const OMISSION: &str = "...";

/// Cut `text` to at most `max_chars` characters, ending in "..." when cut.
pub fn truncate_label(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(OMISSION.len());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(OMISSION);
    truncated
}

/// Join the non-blank parts with `separator`
pub fn join_nonblank<S: AsRef<str>>(parts: &[S], separator: &str) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

const COMPACT_SUFFIXES: [&str; 5] = ["", "k", "m", "b", "t"];

/// Short number for axis labels: `1234 -> "1.2k"`, `0.00042 -> "4.2e-4"`.
pub fn compact_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value < 1.0 {
        return exponential(value);
    }

    let mut tier = ((value.log10() / 3.0).floor() as usize).min(COMPACT_SUFFIXES.len() - 1);
    let mut scaled = round_significant(value / 1000f64.powi(tier as i32));
    if scaled >= 1000.0 && tier + 1 < COMPACT_SUFFIXES.len() {
        tier += 1;
        scaled = round_significant(scaled / 1000.0);
    }
    format!("{}{}", scaled, COMPACT_SUFFIXES[tier])
}

/// Two significant digits below 100, whole numbers above
fn round_significant(value: f64) -> f64 {
    if value >= 10.0 {
        value.round()
    } else {
        (value * 10.0).round() / 10.0
    }
}

/// One-decimal exponent form with an explicit sign: `1.2e+3`, `4.2e-4`
fn exponential(value: f64) -> String {
    let formatted = format!("{:.1e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => formatted,
    }
}

/// Whether `value` sits on a log-axis tick: `power × 10^k` for some power.
pub fn is_log_tick(value: f64, powers: &[f64]) -> bool {
    if !(value > 0.0) {
        return false;
    }
    powers.iter().filter(|p| **p > 0.0).any(|power| {
        let exponent = (value / power).log10();
        (exponent - exponent.round()).abs() < 1e-9
    })
}
