#[inline]
pub fn is_control(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
}

#[inline]
pub fn is_whitespace(c: char) -> bool {
    // U+FEFF (BOM) is whitespace-equivalent at the edges of a payload.
    c.is_whitespace() || c == '\u{FEFF}'
}

/// Whether the byte at `idx` is preceded by an odd run of backslashes.
#[inline]
pub fn is_escaped(bytes: &[u8], idx: usize) -> bool {
    let mut run = 0usize;
    let mut i = idx;
    while i > 0 && bytes[i - 1] == b'\\' {
        run += 1;
        i -= 1;
    }
    run % 2 == 1
}

/// Strip control characters and trim outer whitespace.
pub fn normalize(text: &str, strip_control: bool) -> String {
    let trimmed = text.trim_matches(is_whitespace);
    if !strip_control {
        return trimmed.to_string();
    }
    let cleaned: String = trimmed.chars().filter(|&c| !is_control(c)).collect();
    // stripping may expose more outer whitespace
    let t = cleaned.trim_matches(is_whitespace);
    if t.len() == cleaned.len() { cleaned } else { t.to_string() }
}
