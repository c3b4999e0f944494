//! URL scheme checks.
//!
//! A value is judged on its normalised form: percent-decoding and character
//! references are undone repeatedly, whitespace and control characters are
//! removed, and the result is lowercased before the scheme is read.

use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};
use url::Url;

/// Schemes a URL may carry. Scheme-less (relative) values are accepted.
pub const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto", "tel", "sms"];

/// Schemes that execute or embed content.
const SCRIPT_SCHEMES: &[&str] = &["javascript", "vbscript", "data", "file"];

const MAX_DECODE_ROUNDS: usize = 8;

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)&#x([0-9a-f]{1,6});?|&#([0-9]{1,7});?|&([a-z]{2,8});")
            .expect("valid entity pattern")
    })
}

/// Decode numeric character references and the named ones that matter for
/// scheme detection.
fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    entity_regex()
        .replace_all(input, |cap: &Captures<'_>| {
            let decoded = if let Some(hex) = cap.get(1) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = cap.get(2) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else {
                cap.get(3).and_then(|name| named_entity(name.as_str()))
            };
            decoded.map_or_else(|| cap[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name.to_ascii_lowercase().as_str() {
        "colon" => ':',
        "tab" => '\t',
        "newline" => '\n',
        "sol" => '/',
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "lpar" => '(',
        "rpar" => ')',
        _ => return None,
    })
}

/// Normalised form of a URL used for scheme detection.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let mut current: String = raw.to_string();
    for _ in 0..MAX_DECODE_ROUNDS {
        let decoded = percent_decode_str(&current).decode_utf8_lossy().into_owned();
        let decoded = decode_entities(&decoded);
        let next: String = decoded
            .chars()
            .filter(|c| !c.is_whitespace() && !c.is_control())
            .collect::<String>()
            .to_lowercase();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Scheme of a normalised URL, if it has one.
fn scheme_of(normalized: &str) -> Option<&str> {
    let colon = normalized.find(':')?;
    let candidate = &normalized[..colon];
    let mut chars = candidate.chars();
    let first = chars.next()?;
    if first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        Some(candidate)
    } else {
        None
    }
}

/// Whether `raw` is safe to keep in a URL-valued setting or attribute.
#[must_use]
pub fn is_safe_url(raw: &str) -> bool {
    // markup delimiters never belong in a URL we pass on
    if raw.contains(['<', '>', '"', '`']) {
        return false;
    }
    let normalized = normalize_url(raw);
    if normalized.is_empty() {
        return true;
    }
    match scheme_of(&normalized) {
        Some(scheme) if SCRIPT_SCHEMES.contains(&scheme) => false,
        Some(scheme @ ("http" | "https")) => {
            Url::parse(&normalized).is_ok_and(|u| u.scheme() == scheme && u.host().is_some())
        }
        Some(scheme) => ALLOWED_SCHEMES.contains(&scheme),
        None if normalized.starts_with("//") => {
            Url::parse(&format!("https:{normalized}")).is_ok_and(|u| u.host().is_some())
        }
        None => true,
    }
}

/// Whether a free-text value is really a script URL in disguise.
#[must_use]
pub fn is_script_url(raw: &str) -> bool {
    let normalized = normalize_url(raw);
    normalized.starts_with("javascript:") || normalized.starts_with("vbscript:")
}

/// Whether a settings key holds a URL.
#[must_use]
pub fn is_url_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    matches!(
        key.as_str(),
        "url" | "href" | "src" | "link" | "external_url" | "action"
    ) || key.ends_with("_url")
        || key.ends_with("_link")
        || key.ends_with("_src")
}

/// Markup attributes whose value is a URL.
pub(crate) const URL_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "action",
    "formaction",
    "poster",
    "xlink:href",
    "background",
    "data",
    "cite",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_urls_are_safe() {
        assert!(is_safe_url("https://example.com/a.png"));
        assert!(is_safe_url("http://example.com"));
        assert!(is_safe_url("mailto:hi@example.com"));
        assert!(is_safe_url("tel:+15551234"));
        assert!(is_safe_url("/relative/path"));
        assert!(is_safe_url("#anchor"));
        assert!(is_safe_url(""));
        assert!(is_safe_url("//cdn.example.com/x.js"));
    }

    #[test]
    fn test_script_schemes_rejected() {
        assert!(!is_safe_url("javascript:alert(1)"));
        assert!(!is_safe_url("JaVaScRiPt:alert(1)"));
        assert!(!is_safe_url(" java\tscript:alert(1)"));
        assert!(!is_safe_url("vbscript:msgbox"));
        assert!(!is_safe_url("data:text/html;base64,PHNjcmlwdD4="));
        assert!(!is_safe_url("file:///etc/passwd"));
    }

    #[test]
    fn test_encoded_schemes_rejected() {
        assert!(!is_safe_url("%6A%61%76%61%73%63%72%69%70%74:alert(1)"));
        assert!(!is_safe_url("javascript%3Aalert(1)"));
        assert!(!is_safe_url("%256A%2561vascript:alert(1)"));
        assert!(!is_safe_url("&#106;avascript:alert(1)"));
        assert!(!is_safe_url("&#x6A;avascript&colon;alert(1)"));
    }

    #[test]
    fn test_unknown_and_broken_schemes_rejected() {
        assert!(!is_safe_url("chrome://settings"));
        assert!(!is_safe_url("https://"));
        assert!(!is_safe_url("https://x.example/<script>"));
    }

    #[test]
    fn test_url_keys() {
        assert!(is_url_key("url"));
        assert!(is_url_key("background_video_link"));
        assert!(is_url_key("external_url"));
        assert!(is_url_key("image_src"));
        assert!(!is_url_key("title"));
    }

    #[test]
    fn test_script_url_detection() {
        assert!(is_script_url(" javascript:void(0)"));
        assert!(!is_script_url("Read about javascript: it is fun"));
    }
}
