//! Stage 2: structural hardening.
//!
//! Removes or rewrites every construct that can escape the bounded render
//! container, execute code, or load external resources. Each rule is
//! independent and idempotent; together they are the self-sufficient floor
//! the optional host pass only enhances.

use std::sync::LazyLock;

use regex::Regex;

static PAIRED_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<iframe\b[^>]*>.*?</iframe\s*>|<object\b[^>]*>.*?</object\s*>|<embed\b[^>]*>.*?</embed\s*>",
    )
    .expect("static pattern")
});

static LONE_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:script|style|iframe|object|embed)\b[^>]*>").expect("static pattern")
});

static STYLESHEET_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<link\b[^>]*rel\s*=\s*["']?stylesheet["']?[^>]*/?>"#)
        .expect("static pattern")
});

static EVENT_HANDLERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\son[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).expect("static pattern")
});

static SCRIPT_URI_DQ: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(href|src)\s*=\s*"\s*(?:javascript|vbscript):[^"]*""#)
        .expect("static pattern")
});

static SCRIPT_URI_SQ: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(href|src)\s*=\s*'\s*(?:javascript|vbscript):[^']*'")
        .expect("static pattern")
});

static SCRIPT_URI_BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(href|src)\s*=\s*(?:javascript|vbscript):[^\s>]*").expect("static pattern")
});

static POSITION_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)position\s*:\s*(?:fixed|absolute)").expect("static pattern")
});

static Z_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)z-index\s*:\s*[^;"'>}]*;?"#).expect("static pattern")
});

static VIEWPORT_UNITS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)(?:vw|vh|vmin|vmax)\b").expect("static pattern")
});

/// Apply all hardening rules, iterating to a fixpoint.
///
/// A single pass is not enough: removing one construct can splice the
/// surrounding text into a new one (`<scr</script>ipt>` style payloads).
/// Iterating until nothing changes makes the stage both splice-proof and
/// idempotent. Removals strictly shrink the text, so the loop terminates;
/// the pass cap is a hard stop for pathological inputs.
#[must_use]
pub fn harden(text: &str) -> String {
    let mut current = text.to_owned();
    for _ in 0..8 {
        let next = harden_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// One pass over every hardening rule.
fn harden_once(text: &str) -> String {
    let text = PAIRED_TAGS.replace_all(text, "");
    let text = LONE_TAGS.replace_all(&text, "");
    let text = STYLESHEET_LINK.replace_all(&text, "");
    let text = EVENT_HANDLERS.replace_all(&text, "");
    let text = SCRIPT_URI_DQ.replace_all(&text, "$1=\"#\"");
    let text = SCRIPT_URI_SQ.replace_all(&text, "$1='#'");
    let text = SCRIPT_URI_BARE.replace_all(&text, "$1=\"#\"");
    let text = POSITION_ESCAPE.replace_all(&text, "position: relative");
    let text = Z_INDEX.replace_all(&text, "");
    let text = VIEWPORT_UNITS.replace_all(&text, "$1%");
    text.into_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
