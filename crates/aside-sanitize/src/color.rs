//! CSS color parsing and perceived brightness.

/// Parse a CSS color value into (r, g, b).
///
/// Supports `#rgb`, `#rrggbb`, `rgb(r, g, b)` and `rgba(r, g, b, a)` (alpha
/// ignored). Anything else — named colors, hsl, var() — returns `None` and
/// is left alone by the contrast stage.
#[must_use]
pub fn parse_color(value: &str) -> Option<(u8, u8, u8)> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = value.to_ascii_lowercase();
    let body = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let mut parts = body.split(',').map(str::trim);
    let r = parse_channel(parts.next()?)?;
    let g = parse_channel(parts.next()?)?;
    let b = parse_channel(parts.next()?)?;
    Some((r, g, b))
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    match hex.len() {
        3 => {
            let mut chars = hex.chars();
            let r = hex_digit(chars.next()?)?;
            let g = hex_digit(chars.next()?)?;
            let b = hex_digit(chars.next()?)?;
            Some((r * 17, g * 17, b * 17))
        }
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some((r, g, b))
        }
        _ => None,
    }
}

fn hex_digit(c: char) -> Option<u8> {
    c.to_digit(16).map(|d| u8::try_from(d).unwrap_or(0))
}

fn parse_channel(part: &str) -> Option<u8> {
    part.parse::<u16>().ok().map(|v| v.min(255)).map(|v| {
        #[allow(clippy::cast_possible_truncation)]
        let v = v as u8;
        v
    })
}

/// Approximate perceived brightness on a 0.0–255.0 scale.
///
/// Standard luma weights: `0.299 r + 0.587 g + 0.114 b`.
#[must_use]
pub fn brightness((r, g, b): (u8, u8, u8)) -> f64 {
    0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
