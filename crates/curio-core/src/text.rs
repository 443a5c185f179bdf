//! Text utilities shared by the tidy layer: duration parsing, plaintext
//! to HTML conversion with linkification, and HTML stripping.

use chrono::Duration;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{Error, Result};

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^P(?:(?P<days>\d+)D)?(?:T(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>\d+)S)?)?$",
    )
    .expect("duration regex is valid")
});

static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<url>https?://[^\s<]+)|(?P<www>\bwww\.[^\s<]+)|(?P<email>[\w.+-]+@[\w-]+(?:\.[\w-]+)+)",
    )
    .expect("link regex is valid")
});

static SCRIPT_STYLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:script|style)\b[^>]*>.*?</(?:script|style)>")
        .expect("script/style regex is valid")
});

static BLOCK_BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</p>|</div>|</h[1-6]>|</li>|</tr>|</blockquote>")
        .expect("block break regex is valid")
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex is valid"));

static WS_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// Parse an ISO-8601 duration covering the day/time designators the
/// sources actually emit (`P3DT3H5M2S`, `PT10S`). Fractional components
/// are rejected.
pub fn parse_duration(duration: &str) -> Result<Duration> {
    let invalid =
        || Error::InvalidInput(format!("{duration:?} is not a valid ISO-8601 duration"));

    let caps = DURATION_RE.captures(duration).ok_or_else(invalid)?;

    // The time designator must introduce at least one component.
    if duration.contains('T')
        && caps.name("hours").is_none()
        && caps.name("minutes").is_none()
        && caps.name("seconds").is_none()
    {
        return Err(invalid());
    }

    let field = |name: &str| -> Result<i64> {
        match caps.name(name) {
            Some(m) => m.as_str().parse::<i64>().map_err(|_| invalid()),
            None => Ok(0),
        }
    };

    let days = field("days")?;
    let hours = field("hours")?;
    let minutes = field("minutes")?;
    let seconds = field("seconds")?;

    let total = days
        .checked_mul(86_400)
        .and_then(|d| hours.checked_mul(3_600).and_then(|h| d.checked_add(h)))
        .and_then(|t| minutes.checked_mul(60).and_then(|m| t.checked_add(m)))
        .and_then(|t| t.checked_add(seconds))
        .ok_or_else(invalid)?;

    Ok(Duration::seconds(total))
}

/// Convert plaintext into minimal HTML: escape markup characters, turn
/// newlines into `<br>`, and wrap URLs and e-mail addresses in anchors.
pub fn plaintext_to_html(text: &str) -> String {
    let escaped = escape_html(text);
    let with_breaks = escaped.replace("\r\n", "\n").replace('\n', "<br>");

    LINK_RE
        .replace_all(&with_breaks, |caps: &Captures<'_>| {
            if let Some(m) = caps.name("url") {
                let (link, rest) = split_trailing_punct(m.as_str());
                format!("<a href=\"{link}\">{link}</a>{rest}")
            } else if let Some(m) = caps.name("www") {
                let (link, rest) = split_trailing_punct(m.as_str());
                format!("<a href=\"http://{link}\">{link}</a>{rest}")
            } else if let Some(m) = caps.name("email") {
                let addr = m.as_str();
                format!("<a href=\"mailto:{addr}\">{addr}</a>")
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Strip an HTML document down to readable plaintext: script/style bodies
/// removed, block boundaries kept as newlines, entities decoded,
/// whitespace runs collapsed.
pub fn html_to_plaintext(html: &str) -> String {
    let no_blocks = SCRIPT_STYLE_RE.replace_all(html, "");
    let with_breaks = BLOCK_BREAK_RE.replace_all(&no_blocks, "\n");
    let stripped = TAG_RE.replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);
    normalize_whitespace(&decoded)
}

/// Whitespace-delimited word count.
pub fn word_count(text: &str) -> i32 {
    text.split_whitespace().count() as i32
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Split trailing sentence punctuation off a matched link so "see
/// https://x.org." links the URL without the final period.
fn split_trailing_punct(s: &str) -> (&str, &str) {
    let trimmed = s.trim_end_matches(['.', ',', ';', ':', '!', '?']);
    (trimmed, &s[trimmed.len()..])
}

fn decode_entities(text: &str) -> String {
    // &amp; must decode last so "&amp;lt;" yields the literal "&lt;".
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn normalize_whitespace(text: &str) -> String {
    WS_RUN_RE
        .replace_all(text, |caps: &Captures<'_>| {
            if caps[0].contains('\n') {
                "\n".to_string()
            } else {
                " ".to_string()
            }
        })
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seconds_only() {
        assert_eq!(parse_duration("PT10S").unwrap(), Duration::seconds(10));
    }

    #[test]
    fn parses_full_duration() {
        assert_eq!(
            parse_duration("P3DT3H5M2S").unwrap(),
            Duration::seconds(270_302)
        );
    }

    #[test]
    fn parses_days_only() {
        assert_eq!(parse_duration("P2D").unwrap(), Duration::seconds(172_800));
    }

    #[test]
    fn parses_bare_period_as_zero() {
        assert_eq!(parse_duration("P").unwrap(), Duration::zero());
    }

    #[test]
    fn rejects_arbitrary_strings() {
        assert!(parse_duration("arbitrary string").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10S").is_err());
    }

    #[test]
    fn rejects_fractional_components() {
        assert!(parse_duration("PT3.827M").is_err());
    }

    #[test]
    fn rejects_empty_time_designator() {
        assert!(parse_duration("PT").is_err());
        assert!(parse_duration("P1DT").is_err());
    }

    #[test]
    fn plaintext_newlines_become_breaks() {
        assert_eq!(plaintext_to_html("a\nb"), "a<br>b");
        assert_eq!(plaintext_to_html("a\r\nb"), "a<br>b");
    }

    #[test]
    fn plaintext_escapes_markup() {
        assert_eq!(plaintext_to_html("a < b & c"), "a &lt; b &amp; c");
    }

    #[test]
    fn plaintext_linkifies_urls() {
        assert_eq!(
            plaintext_to_html("see https://example.org/x for more"),
            "see <a href=\"https://example.org/x\">https://example.org/x</a> for more"
        );
    }

    #[test]
    fn plaintext_linkifies_www_with_scheme() {
        assert_eq!(
            plaintext_to_html("visit www.example.org today"),
            "visit <a href=\"http://www.example.org\">www.example.org</a> today"
        );
    }

    #[test]
    fn plaintext_linkifies_emails() {
        assert_eq!(
            plaintext_to_html("mail me@example.org please"),
            "mail <a href=\"mailto:me@example.org\">me@example.org</a> please"
        );
    }

    #[test]
    fn link_excludes_trailing_period() {
        assert_eq!(
            plaintext_to_html("see https://example.org."),
            "see <a href=\"https://example.org\">https://example.org</a>."
        );
    }

    #[test]
    fn html_strip_basic() {
        assert_eq!(html_to_plaintext("<p>Hello <b>world</b></p>"), "Hello world");
    }

    #[test]
    fn html_strip_keeps_block_boundaries() {
        assert_eq!(html_to_plaintext("<p>one</p><p>two</p>"), "one\ntwo");
        assert_eq!(html_to_plaintext("a<br>b"), "a\nb");
    }

    #[test]
    fn html_strip_drops_script_bodies() {
        assert_eq!(
            html_to_plaintext("<script>var x = 1;</script>text"),
            "text"
        );
    }

    #[test]
    fn html_strip_decodes_entities() {
        assert_eq!(html_to_plaintext("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(html_to_plaintext("&amp;lt;"), "&lt;");
    }

    #[test]
    fn word_count_splits_on_whitespace() {
        assert_eq!(word_count("one two  three\nfour"), 4);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
    }

    #[test]
    fn truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("øøøø", 2), "øø");
    }
}
