//! Stripping of script-capable constructs from CSS text.

use std::sync::OnceLock;

use regex::Regex;

const MAX_ROUNDS: usize = 8;

struct CssPatterns {
    comment: Regex,
    open_comment: Regex,
    import: Regex,
    expression: Regex,
    script_url: Regex,
    binding: Regex,
    behavior: Regex,
}

fn patterns() -> &'static CssPatterns {
    static PATTERNS: OnceLock<CssPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("valid css pattern");
        CssPatterns {
            comment: re(r"(?s)/\*.*?\*/"),
            open_comment: re(r"(?s)/\*.*$"),
            import: re(r"(?i)@import\b[^;]*;?"),
            expression: re(r"(?i)expression\s*\([^)]*\)?"),
            script_url: re(r#"(?i)url\(\s*['"]?\s*(?:javascript|vbscript)\s*:[^)]*\)?"#),
            binding: re(r"(?i)-moz-binding\s*:[^;}]*;?"),
            // `scroll-behavior` is harmless, only the bare property is stripped
            behavior: re(r"(?i)(^|[;{\s])behavior\s*:[^;}]*;?"),
        }
    })
}

fn strip_once(css: &str) -> String {
    let p = patterns();
    let out = p.comment.replace_all(css, "");
    let out = p.open_comment.replace_all(&out, "");
    let out = p.import.replace_all(&out, "");
    let out = p.expression.replace_all(&out, "");
    let out = p.script_url.replace_all(&out, "url()");
    let out = p.binding.replace_all(&out, "");
    let out = p.behavior.replace_all(&out, "$1");
    // CSS escapes can spell out any of the above; `<` can close a style element
    out.replace(['\\', '<'], "")
}

/// Remove comments, `@import`, `expression()`, script URLs, `-moz-binding`,
/// `behavior`, backslash escapes and `<` from CSS text. The result is stable
/// under reapplication.
#[must_use]
pub fn sanitize_css(css: &str) -> String {
    let mut current = css.to_string();
    for _ in 0..MAX_ROUNDS {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
    tracing::warn!("CSS did not settle after {MAX_ROUNDS} rounds, dropping it");
    String::new()
}

/// Whether a settings key holds raw CSS.
#[must_use]
pub fn is_css_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.contains("css") || key == "style"
}
