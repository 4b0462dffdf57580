//! Hand-rolled filename scrubbing for exposure/temperature fallback, in the
//! same spirit as the codec's hand-rolled card parsing: the set of patterns
//! actually seen in calibration filenames is small and fixed, so a tiny
//! scanner is clearer than pulling in a regex engine for three shapes.

/// Finds `<num>s` with a word boundary before the number, case-insensitively.
/// `light_030s.fits` -> `30`; `flat-1.5s-bin2.fits` -> `1.5`.
pub fn exposure_from_suffix_s(filename: &str) -> Option<f64> {
    let bytes = filename.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let at_boundary = i == 0 || !is_word_byte(bytes[i - 1]);
        if at_boundary && bytes[i].is_ascii_digit() {
            let start = i;
            let mut j = i;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b'.' {
                let mut k = j + 1;
                while k < bytes.len() && bytes[k].is_ascii_digit() {
                    k += 1;
                }
                if k > j + 1 {
                    j = k;
                }
            }
            if j < bytes.len() && (bytes[j] == b's' || bytes[j] == b'S') {
                let after = j + 1;
                let boundary_after = after >= bytes.len() || !is_word_byte(bytes[after]);
                if boundary_after {
                    if let Ok(value) = filename[start..j].parse::<f64>() {
                        return Some(value);
                    }
                }
            }
            i = j.max(i + 1);
        } else {
            i += 1;
        }
    }
    None
}

/// `EXPOSURE[_-=:\s]?<num>`, case-insensitive.
pub fn exposure_from_keyword_token(filename: &str) -> Option<f64> {
    number_after_token(filename, "EXPOSURE", &['_', '-', '=', ':', ' '], true, false)
}

/// `temp[_-=\s]<num>`, case-insensitive, allowing a leading negative sign.
pub fn temperature_from_keyword_token(filename: &str) -> Option<f64> {
    number_after_token(filename, "TEMP", &['_', '-', '=', ' '], true, true)
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Finds `token` (case-insensitive) optionally followed by one separator
/// byte, then parses the number that follows. `separator_optional` allows
/// the number to immediately follow the token with no separator at all.
fn number_after_token(
    haystack: &str,
    token: &str,
    separators: &[char],
    separator_optional: bool,
    allow_sign: bool,
) -> Option<f64> {
    let upper = haystack.to_ascii_uppercase();
    let token_upper = token.to_ascii_uppercase();
    let mut search_from = 0usize;
    while let Some(rel) = upper[search_from..].find(&token_upper) {
        let start = search_from + rel + token_upper.len();
        let rest = &haystack[start..];
        let mut rest_chars = rest.chars().peekable();

        let mut consumed_separator = false;
        if let Some(&c) = rest_chars.peek() {
            if allow_sign && c == '-' {
                // '-' doubles as both separator and the number's sign here;
                // leave it in place so parse_leading_number reads it as sign.
                consumed_separator = true;
            } else if separators.contains(&c) {
                rest_chars.next();
                consumed_separator = true;
            }
        }
        if consumed_separator || separator_optional {
            let remaining: String = rest_chars.collect();
            if let Some(value) = parse_leading_number(&remaining, allow_sign) {
                return Some(value);
            }
        }
        search_from = start;
    }
    None
}

fn parse_leading_number(s: &str, allow_sign: bool) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut i = 0;
    if allow_sign && i < bytes.len() && (bytes[i] == b'-' || bytes[i] == b'+') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        let mut j = i + 1;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > i + 1 {
            i = j;
        }
    }
    s[..i].parse().ok()
}
