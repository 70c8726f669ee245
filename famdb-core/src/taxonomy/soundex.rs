//! American Soundex, used for "sounds like" name matching in
//! [`crate::taxonomy::resolve`]-style lookups.

/// Maps a letter to its soundex code. `None` means "drop" (H, W); letters not
/// in the table (non-alphabetic) are not coded at all.
fn code_for(ch: char) -> Option<Option<u8>> {
    match ch.to_ascii_uppercase() {
        'A' | 'E' | 'I' | 'O' | 'U' | 'Y' => Some(Some(0)),
        'B' | 'F' | 'P' | 'V' => Some(Some(1)),
        'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some(Some(2)),
        'D' | 'T' => Some(Some(3)),
        'L' => Some(Some(4)),
        'M' | 'N' => Some(Some(5)),
        'R' => Some(Some(6)),
        'H' | 'W' => Some(None),
        _ => None,
    }
}

/// Computes the American Soundex code for `word`: first letter kept, then up
/// to three digits derived from the remaining consonant groups, dropping `H`
/// and `W` and collapsing adjacent identical codes, zero-padded/truncated to
/// length 4.
pub fn soundex(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    let codes: Vec<Option<u8>> = word.chars().filter_map(code_for).collect();
    if codes.is_empty() {
        return String::new();
    }

    let mut deduped: Vec<Option<u8>> = Vec::with_capacity(codes.len());
    let mut prev: Option<Option<u8>> = None;
    for code in codes {
        if code.is_none() {
            // H/W are dropped outright, and also reset adjacency so that a
            // letter separated only by H/W from an identical predecessor is
            // still deduplicated, matching American Soundex rules.
            continue;
        }
        if prev == Some(code) {
            continue;
        }
        deduped.push(code);
        prev = Some(code);
    }

    let first_char = word.chars().next().unwrap();
    let mut out = String::new();
    out.push(first_char);

    // The first coded letter corresponds to the kept first letter and is
    // never re-emitted as a digit; remaining codes skip vowels (code 0).
    for code in deduped.into_iter().skip(1) {
        if let Some(c) = code {
            if c > 0 {
                out.push((b'0' + c) as char);
            }
        }
    }

    while out.chars().count() < 4 {
        out.push('0');
    }
    out.chars().take(4).collect()
}

/// Returns true if `first` and `second` "sound like" each other.
pub fn sounds_like(first: &str, second: &str) -> bool {
    soundex(first) == soundex(second)
}
