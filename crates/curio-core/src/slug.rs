//! Slug normalization.
//!
//! Slugs are the canonical identifier form shared by classifiers and
//! aliases: lowercase ASCII alphanumerics separated by single hyphens.
//! [`to_slug`] is idempotent, so alias text can be normalized on every
//! write without drift.

use crate::defaults::SLUG_MAX_LENGTH;

/// Normalize arbitrary display text into slug form.
///
/// Latin-extended characters are transliterated to ASCII (ø → o, æ → ae,
/// ß → ss), everything else non-alphanumeric becomes a separator, and
/// separator runs collapse to a single hyphen. The result is truncated to
/// [`SLUG_MAX_LENGTH`] without splitting a token.
///
/// # Examples
///
/// ```
/// use curio_core::slug::to_slug;
///
/// assert_eq!(to_slug("Law&Øther"), "law-other");
/// assert_eq!(to_slug("law-other"), "law-other");
/// ```
pub fn to_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;

    for raw in text.chars() {
        for c in raw.to_lowercase() {
            if c.is_ascii_alphanumeric() {
                if pending_sep && !slug.is_empty() {
                    slug.push('-');
                }
                pending_sep = false;
                slug.push(c);
            } else if let Some(mapped) = transliterate(c) {
                if pending_sep && !slug.is_empty() {
                    slug.push('-');
                }
                pending_sep = false;
                slug.push_str(mapped);
            } else {
                pending_sep = true;
            }
        }
    }

    truncate_slug(&slug, SLUG_MAX_LENGTH)
}

/// True when `text` is already in slug form (non-empty lowercase ASCII
/// alphanumerics and hyphens, no leading/trailing/double hyphen).
pub fn is_slug(text: &str) -> bool {
    !text.is_empty() && to_slug(text) == text
}

/// ASCII expansion for a lowercased Latin-extended character, or None when
/// the character acts as a separator.
fn transliterate(c: char) -> Option<&'static str> {
    let mapped = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ď' | 'đ' | 'ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'ĥ' | 'ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'ĵ' => "j",
        'ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'œ' => "oe",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' | 'ſ' => "s",
        'ß' => "ss",
        'ţ' | 'ť' | 'ŧ' => "t",
        'þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(mapped)
}

/// Truncate a slug to `max_len` bytes, cutting at the last hyphen inside
/// the bound so no token is split. Slugs are pure ASCII at this point.
fn truncate_slug(slug: &str, max_len: usize) -> String {
    if slug.len() <= max_len {
        return slug.to_string();
    }
    let cut = &slug[..max_len];
    match cut.rfind('-') {
        Some(idx) if idx > 0 => cut[..idx].to_string(),
        _ => cut.trim_end_matches('-').to_string(),
    }
}
