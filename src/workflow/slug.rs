//! Signer identifiers derived from display names.

use phf::phf_map;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Latin letters that do not decompose to a base letter plus marks.
static FOLDED: phf::Map<char, &'static str> = phf_map! {
    'ß' => "ss", 'æ' => "ae", 'œ' => "oe", 'ø' => "o",
    'ł' => "l", 'đ' => "d", 'ð' => "d", 'ħ' => "h",
    'ı' => "i", 'þ' => "th",
};

/// Turn a display name into a URL-safe signer id.
///
/// Lower-cases, decomposes (NFD) and drops combining marks, folds the few
/// letters that have no decomposition, collapses every run of other
/// characters into a single `-` and trims hyphens at both ends. Blank
/// input gives an empty id.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.nfd().filter(|c| !is_combining_mark(*c)).flat_map(char::to_lowercase) {
        let mut buf = [0u8; 4];
        let piece = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            &*c.encode_utf8(&mut buf)
        } else if let Some(folded) = FOLDED.get(&c) {
            *folded
        } else {
            pending_dash = true;
            continue;
        };
        if pending_dash && !slug.is_empty() {
            slug.push('-');
        }
        pending_dash = false;
        slug.push_str(piece);
    }
    slug
}
