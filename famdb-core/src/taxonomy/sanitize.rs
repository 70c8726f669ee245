//! Name sanitization, kept bit-for-bit compatible with Dfam's algorithm so
//! that sanitized names computed here match names stored by other FamDB
//! implementations.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s,_]+").unwrap());
static STRIP_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[()<>']+").unwrap());

/// Collapses whitespace/comma/underscore runs to a single underscore, then
/// strips parentheses, angle brackets, and apostrophes.
pub fn sanitize_name(name: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(name, "_");
    STRIP_CHARS.replace_all(&collapsed, "").into_owned()
}
