//! Stage 1: strip an accidental whole-response fenced-code wrapper.
//!
//! Models sometimes wrap the entire response in a (possibly language-tagged)
//! triple-backtick block. Only a wrapper enclosing the whole response is
//! stripped; fences inside the body are content and stay.

/// Strip wrapping code fences until none remain.
///
/// Looping keeps the operation idempotent when wrappers are nested.
#[must_use]
pub fn strip_fence_wrapper(text: &str) -> String {
    let mut current = text.trim().to_owned();
    loop {
        match strip_once(&current) {
            Some(inner) => current = inner,
            None => return current,
        }
    }
}

/// One unwrap step, or `None` when the text is not fence-wrapped.
fn strip_once(text: &str) -> Option<String> {
    let rest = text.strip_prefix("```")?;
    let body = text.strip_suffix("```")?;
    // Opening fence line may carry a language tag; the wrapper only counts
    // when the closing fence is on its own final line.
    let newline = rest.find('\n')?;
    let tag = &rest[..newline];
    if tag.contains('`') {
        return None;
    }
    let inner_start = 3 + newline + 1;
    if inner_start > body.len() {
        return None;
    }
    Some(body[inner_start..].trim().to_owned())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_language_tagged_wrapper() {
        assert_eq!(strip_fence_wrapper("```html\n<b>x</b>\n```"), "<b>x</b>");
    }

    #[test]
    fn strips_bare_wrapper() {
        assert_eq!(strip_fence_wrapper("```\nhello\n```"), "hello");
    }

    #[test]
    fn leaves_unwrapped_text() {
        assert_eq!(strip_fence_wrapper("no fences here"), "no fences here");
    }

    #[test]
    fn leaves_interior_fences() {
        let text = "see this:\n```rust\nlet x = 1;\n```\ndone";
        assert_eq!(strip_fence_wrapper(text), text);
    }

    #[test]
    fn strips_nested_wrappers_fully() {
        let nested = "```\n```html\n<i>deep</i>\n```\n```";
        assert_eq!(strip_fence_wrapper(nested), "<i>deep</i>");
    }

    #[test]
    fn idempotent() {
        for case in ["```html\nx\n```", "plain", "```\na\n```"] {
            let once = strip_fence_wrapper(case);
            assert_eq!(strip_fence_wrapper(&once), once);
        }
    }

    #[test]
    fn degenerate_short_input() {
        assert_eq!(strip_fence_wrapper("```"), "```");
        assert_eq!(strip_fence_wrapper("``````"), "``````");
        assert_eq!(strip_fence_wrapper(""), "");
    }
}
