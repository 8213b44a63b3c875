//! URL-safe identifiers derived from human-readable fields.
//!
//! Slugs end up in listing URLs and marketplace feeds, so they are restricted
//! to lowercase ASCII letters, digits, underscores and single hyphens:
//!
//! ```text
//! "Škoda Octavia"      → "skoda-octavia"
//! "Лада Веста"         → "lada-vesta"
//! "Mercedes-Benz  GLE" → "mercedes-benz-gle"
//! "--BMW / X5--"       → "bmw-x5"
//! ```

use deunicode::deunicode;

/// Longest slug any catalog entity can store.
pub const MAX_SLUG_LEN: usize = 255;

/// Turn arbitrary text into a slug.
///
/// - Transliterates to ASCII (`Škoda` → `Skoda`, `Лада` → `Lada`)
/// - Lowercases
/// - Replaces each run of non-word characters with a single dash
/// - Strips leading and trailing dashes
/// - Truncates to [`MAX_SLUG_LEN`] characters (breaks at last dash before limit)
pub fn slugify(text: &str) -> String {
    let ascii = deunicode(text).to_ascii_lowercase();

    let mut collapsed = String::with_capacity(ascii.len());
    let mut prev_dash = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            collapsed.push(c);
            prev_dash = false;
        } else if !prev_dash {
            collapsed.push('-');
            prev_dash = true;
        }
    }

    let trimmed = collapsed.trim_matches('-');
    if trimmed.len() <= MAX_SLUG_LEN {
        trimmed.to_string()
    } else {
        let truncated = &trimmed[..MAX_SLUG_LEN];
        match truncated.rfind('-') {
            Some(pos) => truncated[..pos].to_string(),
            None => truncated.to_string(),
        }
    }
}

/// Whether `candidate` is already in slug form, i.e. `slugify` would keep it.
pub fn is_slug(candidate: &str) -> bool {
    !candidate.is_empty() && slugify(candidate) == candidate
}

/// Join already-slugified parts with dashes, skipping empty ones, and
/// re-slugify the result so stray separators collapse.
pub fn join(parts: &[&str]) -> String {
    slugify(&parts.join("-"))
}
