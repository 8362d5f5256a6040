//! Stage 4: accessibility contrast auto-correction.
//!
//! A blind, local, per-declaration correction: for each inline `style`
//! attribute that declares both a text color and a background, rewrite the
//! text color to black or white when the two are too close in brightness.
//! Declarations without a conflicting pair are never altered, and no attempt
//! is made to honor color intent stated elsewhere in the instructions.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::color::{brightness, parse_color};

/// Brightness ratio (brighter / darker) below which a pair counts as
/// low-contrast. The ratio is IEEE division: a pure-black participant yields
/// +inf, so black backgrounds never trigger a rewrite.
const RATIO_THRESHOLD: f64 = 1.5;

static STYLE_ATTR_DQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)style\s*=\s*"([^"]*)""#).expect("static pattern"));

static STYLE_ATTR_SQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)style\s*=\s*'([^']*)'").expect("static pattern"));

/// Rewrite low-contrast text colors in every inline `style` attribute.
#[must_use]
pub fn correct_contrast(text: &str) -> String {
    let out = STYLE_ATTR_DQ.replace_all(text, |caps: &Captures| match corrected(&caps[1]) {
        Some(style) => format!("style=\"{style}\""),
        None => caps[0].to_owned(),
    });
    let out = STYLE_ATTR_SQ.replace_all(&out, |caps: &Captures| match corrected(&caps[1]) {
        Some(style) => format!("style='{style}'"),
        None => caps[0].to_owned(),
    });
    out.into_owned()
}

/// Corrected declaration list, or `None` when no rewrite is needed.
fn corrected(style: &str) -> Option<String> {
    let mut decls: Vec<(String, String)> = Vec::new();
    for segment in style.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        match segment.split_once(':') {
            Some((name, value)) => {
                decls.push((name.trim().to_owned(), value.trim().to_owned()));
            }
            // Malformed segment: carried through untouched.
            None => decls.push((segment.to_owned(), String::new())),
        }
    }

    let text_idx = decls
        .iter()
        .position(|(name, _)| name.eq_ignore_ascii_case("color"))?;
    let bg = decls.iter().find_map(|(name, value)| {
        let is_bg = name.eq_ignore_ascii_case("background-color")
            || name.eq_ignore_ascii_case("background");
        if is_bg { parse_color(value) } else { None }
    })?;
    let fg = parse_color(&decls[text_idx].1)?;

    let fg_brightness = brightness(fg);
    let bg_brightness = brightness(bg);
    let ratio = fg_brightness.max(bg_brightness) / fg_brightness.min(bg_brightness);
    if ratio >= RATIO_THRESHOLD {
        return None;
    }

    decls[text_idx].1 = if bg_brightness >= 128.0 {
        "#000000".to_owned()
    } else {
        "#ffffff".to_owned()
    };

    let rebuilt = decls
        .iter()
        .map(|(name, value)| {
            if value.is_empty() {
                name.clone()
            } else {
                format!("{name}: {value}")
            }
        })
        .collect::<Vec<_>>()
        .join("; ");
    Some(rebuilt)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
